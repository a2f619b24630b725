// common.rs - Fields and helpers shared by several task wrappers

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::{
    resolve_output, Bindings, FieldKind, FieldSpec, OutputTemplate, Result, TaskError,
};

use super::traits::{OutputMap, OutputValue};

/// Environment variable ITK reads its thread pool size from
pub const THREADS_ENV: &str = "ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS";

/// Interpolators whose parameters travel in brackets
pub const INTERPOLATIONS: &[&str] = &[
    "Linear",
    "NearestNeighbor",
    "CosineWindowedSinc",
    "WelchWindowedSinc",
    "HammingWindowedSinc",
    "LanczosWindowedSinc",
    "MultiLabel",
    "Gaussian",
    "BSpline",
    "GenericLabel",
];

pub fn num_threads_field() -> FieldSpec {
    FieldSpec::new("num_threads", FieldKind::Int, "Number of ITK threads to use").default(1)
}

/// Export the thread count when the task declares one
pub fn thread_env(bound: &Bindings) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let Some(n) = bound.get_int("num_threads") {
        env.insert(THREADS_ENV.to_string(), n.to_string());
    }
    env
}

pub fn check_positive(bound: &Bindings, field: &str) -> Result<()> {
    match bound.get_int(field) {
        Some(n) if n < 1 => Err(TaskError::invalid_value(
            field,
            format!("must be at least 1, got {}", n),
        )),
        _ => Ok(()),
    }
}

/// Explicit output name, or the template rendered from the bindings
pub fn output_name(bound: &Bindings, field: &str, template: &str) -> Result<String> {
    match bound.get_str(field) {
        Some(name) => Ok(name.to_string()),
        None => OutputTemplate::new(template).render(bound),
    }
}

/// Insert a single-file output resolved against the working directory
pub fn insert_file(outputs: &mut OutputMap, key: &str, work_dir: &Path, name: &str) {
    outputs.insert(key.to_string(), OutputValue::File(resolve_output(work_dir, name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParameterSet, SchemaBuilder};

    #[test]
    fn test_thread_env_and_output_name() {
        let schema = SchemaBuilder::new("demo")
            .field(FieldSpec::new("input_image", FieldKind::File, ""))
            .field(FieldSpec::new("output_image", FieldKind::Text, ""))
            .field(num_threads_field())
            .build()
            .unwrap();

        let bound = schema
            .validate(&ParameterSet::new().with("input_image", "t1.nii.gz").with("num_threads", 8))
            .unwrap();
        assert_eq!(thread_env(&bound)[THREADS_ENV], "8");
        assert_eq!(
            output_name(&bound, "output_image", "{input_image}_out").unwrap(),
            "t1_out.nii.gz"
        );

        let bound = schema
            .validate(&ParameterSet::new().with("output_image", "mine.nii"))
            .unwrap();
        assert_eq!(output_name(&bound, "output_image", "{input_image}_out").unwrap(), "mine.nii");
        assert_eq!(thread_env(&bound)[THREADS_ENV], "1");
    }

    #[test]
    fn test_check_positive() {
        let schema = SchemaBuilder::new("demo").field(num_threads_field()).build().unwrap();
        let bound = schema.validate(&ParameterSet::new().with("num_threads", 0)).unwrap();
        assert!(matches!(
            check_positive(&bound, "num_threads"),
            Err(TaskError::InvalidValue { .. })
        ));
    }
}
