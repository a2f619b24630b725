// error.rs - Error taxonomy for parameter validation and command synthesis

use thiserror::Error;

/// Result type for task compilation
pub type Result<T> = std::result::Result<T, TaskError>;

/// Every misconfiguration detectable before the external tool is launched.
///
/// None of these are transient: they point at a caller or configuration bug and
/// are surfaced as-is, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// A field marked mandatory was left unset
    #[error("missing mandatory field '{field}'")]
    MissingMandatoryField { field: String },

    /// Two or more fields of a declared exclusive group are set together
    #[error("fields {} are mutually exclusive", .fields.join(", "))]
    MutuallyExclusiveViolation { fields: Vec<String> },

    /// A field is set but a field it requires is not
    #[error("field '{field}' requires '{requires}' to be set")]
    UnmetDependency { field: String, requires: String },

    /// A value lies outside its declared allowed-value set
    #[error("invalid value '{value}' for '{field}' (allowed: {})", .allowed.join(", "))]
    InvalidChoice {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    /// Two sequences that must describe the same levels/stages differ in length
    #[error("'{field}' has {found} elements but '{reference}' has {expected}")]
    SequenceLengthMismatch {
        field: String,
        found: usize,
        reference: String,
        expected: usize,
    },

    /// An output template placeholder has no bound value
    #[error("cannot resolve placeholder '{{{placeholder}}}' in output template '{template}'")]
    UnresolvableTemplate { template: String, placeholder: String },

    /// A binding names a field the task does not declare
    #[error("task '{task}' has no field '{field}'")]
    UnknownField { task: String, field: String },

    /// A bound value does not have the declared kind
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A value has the right kind but is out of range
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A schema definition was rejected while being built
    #[error("invalid schema: {reason}")]
    Schema { reason: String },

    /// No task is registered under this name
    #[error("unknown task '{name}'")]
    UnknownTask { name: String },
}

impl TaskError {
    pub fn missing(field: &str) -> Self {
        TaskError::MissingMandatoryField {
            field: field.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        TaskError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn length_mismatch(field: &str, found: usize, reference: &str, expected: usize) -> Self {
        TaskError::SequenceLengthMismatch {
            field: field.to_string(),
            found,
            reference: reference.to_string(),
            expected,
        }
    }

    /// Short machine-friendly name of the violated constraint
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::MissingMandatoryField { .. } => "MissingMandatoryField",
            TaskError::MutuallyExclusiveViolation { .. } => "MutuallyExclusiveViolation",
            TaskError::UnmetDependency { .. } => "UnmetDependency",
            TaskError::InvalidChoice { .. } => "InvalidChoice",
            TaskError::SequenceLengthMismatch { .. } => "SequenceLengthMismatch",
            TaskError::UnresolvableTemplate { .. } => "UnresolvableTemplate",
            TaskError::UnknownField { .. } => "UnknownField",
            TaskError::TypeMismatch { .. } => "TypeMismatch",
            TaskError::InvalidValue { .. } => "InvalidValue",
            TaskError::Schema { .. } => "Schema",
            TaskError::UnknownTask { .. } => "UnknownTask",
        }
    }
}
