// config.rs - Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    // Task selection
    pub task: Option<String>,
    pub params: Option<String>,
    pub set: Option<Vec<String>>,

    // Output
    pub work_dir: Option<String>,
    pub format: Option<String>,
    pub output: Option<String>,

    // Resources
    pub num_threads: Option<i64>,

    // Flags
    pub dry_run: Option<bool>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        eprintln!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        eprintln!("📄 Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# antswrap.toml - Configuration file for antswrap
# Command line arguments will override these settings

# =============================================================================
# TASK
# =============================================================================

# Task to compile (antswrap --list-tasks shows all of them)
task = "n4_bias_field_correction"

# Parameter file (.toml table or .json object)
params = "n4_params.toml"

# Individual overrides, applied after the parameter file
set = ["dimension=3", "shrink_factor=4", "n_iterations=[50,50,30,20]"]

# =============================================================================
# OUTPUT
# =============================================================================

# Directory output paths are resolved against
work_dir = "/data/derivatives/sub-01"

# Output format: argv, shell, json, tsv
format = "shell"

# Output file (omit for stdout)
output = "run_n4.sh"

# =============================================================================
# RESOURCES
# =============================================================================

# ITK thread count, bound to num_threads for tasks that declare it
num_threads = 4

# =============================================================================
# FLAGS
# =============================================================================

# Validate parameters without writing a plan
dry_run = false
"#
        .to_string()
    }
}
