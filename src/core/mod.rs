// mod.rs - Core logic module: values, schemas, formatting, file names and stages

pub mod error;
pub mod filename;
pub mod format;
pub mod params;
pub mod schema;
pub mod stage;
pub mod value;

// Re-export main types for convenience
pub use error::{Result, TaskError};
pub use filename::{base_name, resolve_output, split_filename, OutputTemplate};
pub use format::{bracket, join_comma, join_x, ArgBuilder, CommandLine};
pub use params::{Bindings, ParameterSet};
pub use schema::{FieldKind, FieldSpec, Schema, SchemaBuilder};
pub use stage::{
    compose_stages, transform_file_name, Convergence, Metric, MetricKind, SigmaUnits, Stage,
    Transform, TransformKind,
};
pub use value::{format_float, Value};
