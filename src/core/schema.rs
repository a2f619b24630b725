// schema.rs - Field declarations, constraint graph and the parameter validator

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::error::{Result, TaskError};
use super::params::{Bindings, ParameterSet};
use super::value::Value;

/// Declared kind of a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    File,
    /// Text or number, rendered verbatim (e.g. an image or a scalar weight)
    Scalar,
    /// Boolean switch or an explicit file name
    Flag,
    List(Box<FieldKind>),
}

impl FieldKind {
    pub fn list(inner: FieldKind) -> Self {
        FieldKind::List(Box::new(inner))
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Int, Value::Int(_)) => true,
            (FieldKind::Float, Value::Int(_) | Value::Float(_)) => true,
            (FieldKind::Text | FieldKind::File, Value::Text(_)) => true,
            (FieldKind::Scalar, Value::Int(_) | Value::Float(_) | Value::Text(_)) => true,
            (FieldKind::Flag, Value::Bool(_) | Value::Text(_)) => true,
            (FieldKind::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),
            _ => false,
        }
    }

    /// Single values bound to a list field are promoted to a one-element list
    fn normalize(&self, value: &Value) -> Value {
        match (self, value) {
            (FieldKind::List(inner), v) if v.is_scalar() && inner.accepts(v) => {
                Value::List(vec![v.clone()])
            }
            (_, v) => v.clone(),
        }
    }

    pub fn is_file(&self) -> bool {
        match self {
            FieldKind::File => true,
            FieldKind::List(inner) => inner.is_file(),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FieldKind::Bool => "bool".to_string(),
            FieldKind::Int => "int".to_string(),
            FieldKind::Float => "float".to_string(),
            FieldKind::Text => "text".to_string(),
            FieldKind::File => "file".to_string(),
            FieldKind::Scalar => "scalar".to_string(),
            FieldKind::Flag => "bool|file".to_string(),
            FieldKind::List(inner) => format!("list<{}>", inner.describe()),
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub help: String,
    pub mandatory: bool,
    pub default: Option<Value>,
    pub allowed: Option<Vec<Value>>,
    pub requires: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind, help: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            help: help.to_string(),
            mandatory: false,
            default: None,
            allowed: None,
            requires: Vec::new(),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn allowed<V: Into<Value>>(mut self, values: Vec<V>) -> Self {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn requires(mut self, fields: &[&str]) -> Self {
        self.requires.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    fn check_allowed(&self, value: &Value) -> Result<()> {
        let Some(allowed) = &self.allowed else {
            return Ok(());
        };
        let candidates: Vec<&Value> = match value {
            Value::List(items) => items.iter().collect(),
            scalar => vec![scalar],
        };
        for candidate in candidates {
            if !allowed.iter().any(|a| a.loosely_equals(candidate)) {
                return Err(TaskError::InvalidChoice {
                    field: self.name.clone(),
                    value: candidate.render(),
                    allowed: allowed.iter().map(Value::render).collect(),
                });
            }
        }
        Ok(())
    }
}

/// Collects field declarations and constraint edges for one task
pub struct SchemaBuilder {
    task: String,
    fields: Vec<FieldSpec>,
    xor: Vec<Vec<String>>,
}

impl SchemaBuilder {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            fields: Vec::new(),
            xor: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a group of fields of which at most one may be bound
    pub fn xor(mut self, group: &[&str]) -> Self {
        self.xor.push(group.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Check the constraint graph once and freeze the schema
    pub fn build(self) -> Result<Schema> {
        let schema_err = |reason: String| TaskError::Schema {
            reason: format!("{}: {}", self.task, reason),
        };

        let mut index = BTreeMap::new();
        for (i, field) in self.fields.iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                return Err(schema_err(format!("duplicate field '{}'", field.name)));
            }
        }

        for field in &self.fields {
            for dep in &field.requires {
                if dep == &field.name {
                    return Err(schema_err(format!("field '{}' requires itself", dep)));
                }
                if !index.contains_key(dep) {
                    return Err(schema_err(format!(
                        "field '{}' requires unknown field '{}'",
                        field.name, dep
                    )));
                }
            }
            if field.mandatory && field.default.is_some() {
                return Err(schema_err(format!(
                    "mandatory field '{}' cannot carry a default",
                    field.name
                )));
            }
            if let Some(default) = &field.default {
                if !field.kind.accepts(default) {
                    return Err(schema_err(format!(
                        "default of '{}' is not a {}",
                        field.name,
                        field.kind.describe()
                    )));
                }
                field
                    .check_allowed(default)
                    .map_err(|e| schema_err(format!("default rejected: {}", e)))?;
            }
        }

        for group in &self.xor {
            if group.len() < 2 {
                return Err(schema_err("xor group needs at least two fields".to_string()));
            }
            for name in group {
                if !index.contains_key(name) {
                    return Err(schema_err(format!("xor group names unknown field '{}'", name)));
                }
            }
        }

        Ok(Schema {
            task: self.task,
            fields: self.fields,
            index,
            xor: self.xor,
        })
    }
}

/// Frozen parameter schema of one task
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    task: String,
    fields: Vec<FieldSpec>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
    xor: Vec<Vec<String>>,
}

impl Schema {
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn xor_groups(&self) -> &[Vec<String>] {
        &self.xor
    }

    /// Groups a field takes part in, minus the field itself
    pub fn excludes(&self, name: &str) -> Vec<&str> {
        self.xor
            .iter()
            .filter(|g| g.iter().any(|f| f == name))
            .flat_map(|g| g.iter().filter(|f| *f != name).map(String::as_str))
            .collect()
    }

    /// Validate caller bindings and fill in defaults.
    ///
    /// Check order: mandatory, unknown, type, allowed values, xor, requires.
    pub fn validate(&self, params: &ParameterSet) -> Result<Bindings> {
        for field in &self.fields {
            if field.mandatory && !params.is_set(&field.name) {
                return Err(TaskError::missing(&field.name));
            }
        }

        let mut values = BTreeMap::new();
        let mut explicit = BTreeSet::new();
        for (name, value) in params.iter() {
            let field = self.field(name).ok_or_else(|| TaskError::UnknownField {
                task: self.task.clone(),
                field: name.to_string(),
            })?;
            let value = field.kind.normalize(value);
            if !field.kind.accepts(&value) {
                return Err(TaskError::TypeMismatch {
                    field: name.to_string(),
                    expected: field.kind.describe(),
                    found: value.type_name().to_string(),
                });
            }
            values.insert(name.to_string(), value);
            explicit.insert(name.to_string());
        }

        for (name, value) in &values {
            if let Some(field) = self.field(name) {
                field.check_allowed(value)?;
            }
        }

        for group in &self.xor {
            let bound: Vec<String> = group
                .iter()
                .filter(|f| explicit.contains(*f))
                .cloned()
                .collect();
            if bound.len() > 1 {
                return Err(TaskError::MutuallyExclusiveViolation { fields: bound });
            }
        }

        for field in &self.fields {
            if !explicit.contains(&field.name) {
                continue;
            }
            for dep in &field.requires {
                let satisfied = explicit.contains(dep)
                    || self.field(dep).is_some_and(|d| d.default.is_some());
                if !satisfied {
                    return Err(TaskError::UnmetDependency {
                        field: field.name.clone(),
                        requires: dep.clone(),
                    });
                }
            }
        }

        for field in &self.fields {
            if let (false, Some(default)) = (values.contains_key(&field.name), &field.default) {
                values.insert(field.name.clone(), default.clone());
            }
        }

        let files = self
            .fields
            .iter()
            .filter(|f| f.kind.is_file())
            .map(|f| f.name.clone())
            .collect();

        Ok(Bindings::new(&self.task, values, explicit, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_schema() -> Schema {
        SchemaBuilder::new("demo")
            .field(
                FieldSpec::new("dimension", FieldKind::Int, "image dimension")
                    .mandatory()
                    .allowed(vec![2, 3]),
            )
            .field(FieldSpec::new("input_image", FieldKind::File, "input").mandatory())
            .field(
                FieldSpec::new("mode", FieldKind::Text, "mode")
                    .allowed(vec!["Otsu", "Kmeans"])
                    .requires(&["num_thresholds"]),
            )
            .field(FieldSpec::new("num_thresholds", FieldKind::Int, "count"))
            .field(FieldSpec::new("th_low", FieldKind::Float, "low"))
            .field(FieldSpec::new("shrink", FieldKind::Int, "shrink").default(4))
            .field(FieldSpec::new("weight", FieldKind::Float, "weight").requires(&["shrink"]))
            .field(FieldSpec::new("images", FieldKind::list(FieldKind::File), "images"))
            .xor(&["mode", "th_low"])
            .build()
            .unwrap()
    }

    fn valid() -> ParameterSet {
        ParameterSet::new().with("dimension", 3).with("input_image", "in.nii")
    }

    #[test]
    fn test_defaults_filled() {
        let bound = demo_schema().validate(&valid()).unwrap();
        assert_eq!(bound.get_int("shrink"), Some(4));
        assert!(!bound.is_explicit("shrink"));
        assert!(bound.is_file("input_image"));
        assert!(!bound.is_set("mode"));
    }

    #[test]
    fn test_missing_mandatory() {
        let params = ParameterSet::new().with("dimension", 3);
        let err = demo_schema().validate(&params).unwrap_err();
        assert_eq!(err, TaskError::missing("input_image"));
    }

    #[test]
    fn test_missing_mandatory_wins_over_other_violations() {
        let params = ParameterSet::new().with("dimension", 7).with("bogus", 1);
        let err = demo_schema().validate(&params).unwrap_err();
        assert!(matches!(err, TaskError::MissingMandatoryField { .. }));
    }

    #[test]
    fn test_invalid_choice() {
        let err = demo_schema().validate(&valid().with("dimension", 4)).unwrap_err();
        assert!(matches!(err, TaskError::InvalidChoice { ref field, .. } if field == "dimension"));

        let err = demo_schema()
            .validate(&valid().with("mode", "Triangle").with("num_thresholds", 2))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidChoice { ref value, .. } if value == "Triangle"));
    }

    #[test]
    fn test_exclusive_and_requires() {
        let err = demo_schema()
            .validate(&valid().with("mode", "Otsu").with("num_thresholds", 3).with("th_low", 0.5))
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::MutuallyExclusiveViolation {
                fields: vec!["mode".to_string(), "th_low".to_string()]
            }
        );

        let err = demo_schema().validate(&valid().with("mode", "Otsu")).unwrap_err();
        assert_eq!(
            err,
            TaskError::UnmetDependency {
                field: "mode".to_string(),
                requires: "num_thresholds".to_string()
            }
        );

        // A dependency carrying a default is satisfied
        assert!(demo_schema().validate(&valid().with("weight", 0.5)).is_ok());
    }

    #[test]
    fn test_types_and_promotion() {
        let err = demo_schema().validate(&valid().with("th_low", "low")).unwrap_err();
        assert!(matches!(err, TaskError::TypeMismatch { .. }));

        let bound = demo_schema().validate(&valid().with("th_low", 1)).unwrap();
        assert_eq!(bound.get_float("th_low"), Some(1.0));

        let bound = demo_schema().validate(&valid().with("images", "a.nii")).unwrap();
        assert_eq!(bound.get_str_list("images"), Some(vec!["a.nii".to_string()]));

        let err = demo_schema().validate(&valid().with("bogus", 1)).unwrap_err();
        assert!(matches!(err, TaskError::UnknownField { .. }));
    }

    #[test]
    fn test_schema_definition_errors() {
        let unknown_dep = SchemaBuilder::new("bad")
            .field(FieldSpec::new("a", FieldKind::Int, "").requires(&["b"]))
            .build();
        assert!(matches!(unknown_dep, Err(TaskError::Schema { .. })));

        let bad_default = SchemaBuilder::new("bad")
            .field(FieldSpec::new("a", FieldKind::Int, "").default(5).allowed(vec![1, 2]))
            .build();
        assert!(bad_default.is_err());

        let lonely_xor = SchemaBuilder::new("bad")
            .field(FieldSpec::new("a", FieldKind::Int, ""))
            .xor(&["a"])
            .build();
        assert!(lonely_xor.is_err());

        let mandatory_default = SchemaBuilder::new("bad")
            .field(FieldSpec::new("a", FieldKind::Int, "").mandatory().default(1))
            .build();
        assert!(mandatory_default.is_err());
    }

    #[test]
    fn test_excludes() {
        let schema = demo_schema();
        assert_eq!(schema.excludes("mode"), vec!["th_low"]);
        assert!(schema.excludes("dimension").is_empty());
    }
}
