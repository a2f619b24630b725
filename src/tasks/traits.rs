// traits.rs - Core traits and types for the task system

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::value::bool_token;
use crate::core::{Bindings, CommandLine, ParameterSet, Result, Schema};

use super::common::thread_env;

/// A derived output: one file, an ordered list of files, or per-file flags
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    File(PathBuf),
    Files(Vec<PathBuf>),
    Flags(Vec<bool>),
}

impl OutputValue {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            OutputValue::File(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_paths(&self) -> Option<&[PathBuf]> {
        match self {
            OutputValue::Files(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_flags(&self) -> Option<&[bool]> {
        match self {
            OutputValue::Flags(f) => Some(f),
            _ => None,
        }
    }

    /// One display string per element
    pub fn lines(&self) -> Vec<String> {
        match self {
            OutputValue::File(p) => vec![p.display().to_string()],
            OutputValue::Files(ps) => ps.iter().map(|p| p.display().to_string()).collect(),
            OutputValue::Flags(fs) => fs.iter().map(|f| bool_token(*f).to_string()).collect(),
        }
    }
}

/// Logical output name to derived value; conditional outputs are simply absent
pub type OutputMap = BTreeMap<String, OutputValue>;

/// Everything a host needs to run one task invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPlan {
    pub task: String,
    pub executable: String,
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub outputs: OutputMap,
}

impl TaskPlan {
    pub fn command_line(&self) -> CommandLine {
        CommandLine {
            executable: self.executable.clone(),
            args: self.argv.iter().skip(1).cloned().collect(),
            env: self.env.clone(),
        }
    }
}

/// Wrapper around one external executable.
///
/// Implementors declare a schema and two pure functions over validated bindings:
/// argument synthesis and output derivation.
pub trait Task: Send + Sync + Debug {
    /// Registry name, e.g. `n4_bias_field_correction`
    fn name(&self) -> &'static str;

    fn executable(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schema(&self) -> &Schema;

    /// Cross-field checks the schema cannot express (sequence lengths, ranges)
    fn check(&self, _bound: &Bindings) -> Result<()> {
        Ok(())
    }

    /// Argument tokens after the executable
    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>>;

    /// Output paths resolved against the working directory
    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap>;

    /// Extra environment for the process
    fn environment(&self, bound: &Bindings) -> BTreeMap<String, String> {
        thread_env(bound)
    }

    /// Validate caller parameters; nothing is synthesized on failure
    fn bind(&self, params: &ParameterSet) -> Result<Bindings> {
        let bound = self.schema().validate(params)?;
        self.check(&bound)?;
        Ok(bound)
    }

    fn command_line(&self, params: &ParameterSet) -> Result<CommandLine> {
        let bound = self.bind(params)?;
        let args = self.format_args(&bound)?;
        Ok(CommandLine {
            executable: self.executable().to_string(),
            args,
            env: self.environment(&bound),
        })
    }

    fn outputs(&self, params: &ParameterSet, work_dir: &Path) -> Result<OutputMap> {
        let bound = self.bind(params)?;
        self.list_outputs(&bound, work_dir)
    }

    /// Validate once, then synthesize argv and outputs together
    fn compile(&self, params: &ParameterSet, work_dir: &Path) -> Result<TaskPlan> {
        let bound = self.bind(params)?;
        let args = self.format_args(&bound)?;
        let outputs = self.list_outputs(&bound, work_dir)?;

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.executable().to_string());
        argv.extend(args);

        debug!(
            task = self.name(),
            tokens = argv.len(),
            outputs = outputs.len(),
            "compiled task"
        );

        Ok(TaskPlan {
            task: self.name().to_string(),
            executable: self.executable().to_string(),
            argv,
            env: self.environment(&bound),
            outputs,
        })
    }
}
