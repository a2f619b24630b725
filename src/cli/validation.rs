// validation.rs - Input validation utilities

use std::path::{Path, PathBuf};

use crate::cli::args::Args;
use crate::core::{ParameterSet, Value};
use crate::data::{apply_assignments, load_parameters};
use crate::output::OutputFormat;
use crate::tasks::TaskRegistry;

#[derive(Debug)]
pub struct ValidationResult {
    pub task: String,
    pub format: OutputFormat,
    pub work_dir: PathBuf,
    pub params: ParameterSet,
}

/// Validate all command line arguments and assemble the parameter set
pub fn validate_args(args: &Args, registry: &TaskRegistry) -> Result<ValidationResult, String> {
    // Validate task name
    let task_name = args
        .task
        .clone()
        .ok_or_else(|| "--task is required (use --list-tasks to see available tasks)".to_string())?;
    let task = registry.get_task(&task_name).ok_or_else(|| {
        format!(
            "Unknown task '{}'. Available: {}",
            task_name,
            registry.get_task_names().join(", ")
        )
    })?;

    // Validate output format
    let format: OutputFormat = args.format.parse()?;

    // Validate working directory
    if args.work_dir.trim().is_empty() {
        return Err("--work-dir must not be empty".to_string());
    }
    let work_dir = PathBuf::from(&args.work_dir);

    // Parameter file, then overrides
    let params = match &args.params {
        Some(path) => {
            let path = Path::new(path);
            if !path.exists() {
                return Err(format!("Parameter file not found: {}", path.display()));
            }
            load_parameters(path)?
        }
        None => ParameterSet::new(),
    };
    let mut params = apply_assignments(params, &args.set)?;

    if let Some(threads) = args.num_threads {
        if threads < 1 {
            return Err(format!("--num-threads must be at least 1, got {}", threads));
        }
        if task.schema().field("num_threads").is_none() {
            return Err(format!("Task '{}' does not accept num_threads", task_name));
        }
        if !params.is_set("num_threads") {
            params.insert("num_threads", Value::Int(threads));
        }
    }

    Ok(ValidationResult {
        task: task_name,
        format,
        work_dir,
        params,
    })
}
