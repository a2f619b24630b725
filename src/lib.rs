// lib.rs - antswrap library root

//! # antswrap - Typed command-line synthesis for ANTs neuroimaging executables
//!
//! Each wrapped executable is described by a declarative schema. Parameters are validated
//! against it, then turned into an exact argument vector and the set of output paths the
//! tool will produce, without running anything.
//!
//! ## Features
//!
//! - **Validation first**: mandatory, type, allowed-value, exclusion and dependency checks
//!   all run before a single token is produced
//! - **Exact argv**: bracketed ANTs parameter groups, `x`-joined level lists, `0/1` booleans
//! - **Output derivation**: templates with compound extensions (`.nii.gz`) and the
//!   transform naming of antsRegistration
//! - **Multi-stage registration**: ordered stage composition with per-stage level checks
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use antswrap::prelude::*;
//!
//! let registry = TaskRegistry::new()?;
//! let task = registry.require_task("multiply_images")?;
//!
//! let params = ParameterSet::new()
//!     .with("dimension", 3)
//!     .with("first_input", "moving2.nii")
//!     .with("second_input", 0.25)
//!     .with("output_product_image", "out.nii.gz");
//!
//! let plan = task.compile(&params, std::path::Path::new("/data/work"))?;
//! assert_eq!(plan.argv, ["MultiplyImages", "3", "moving2.nii", "0.25", "out.nii.gz"]);
//! # Ok::<(), antswrap::core::TaskError>(())
//! ```

// Re-export all main modules
pub mod cli;
pub mod core;
pub mod data;
pub mod output;
pub mod tasks;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::cli::{validate_args, Args, ValidationResult};
    pub use crate::core::{CommandLine, ParameterSet, Schema, TaskError, Value};
    pub use crate::data::{apply_assignments, load_parameters, parse_assignment};
    pub use crate::output::{write_plan, OutputFormat};
    pub use crate::tasks::{OutputMap, OutputValue, Task, TaskPlan, TaskRegistry};
    pub use crate::VERSION;
}

// Re-export main types at the root level for convenience
pub use cli::{Args, ValidationResult};
pub use core::{ParameterSet, TaskError, Value};
pub use tasks::{Task, TaskPlan, TaskRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "antswrap v{} - Typed command lines for ANTs executables",
        VERSION
    )
}
