// merge.rs - Merge configuration file with CLI arguments

use crate::cli::{Args, Config};

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(mut self, config: Config) -> Self {
        // Task selection
        if self.task.is_none() {
            self.task = config.task;
        }
        if self.params.is_none() {
            self.params = config.params;
        }
        // Config overrides come first so command line overrides win
        if let Some(mut set) = config.set {
            set.append(&mut self.set);
            self.set = set;
        }

        // Output (only override defaults, not explicit CLI values)
        if self.work_dir == "." {
            if let Some(work_dir) = config.work_dir {
                self.work_dir = work_dir;
            }
        }
        if self.format == "argv" {
            if let Some(format) = config.format {
                self.format = format;
            }
        }
        if self.output.is_none() {
            self.output = config.output;
        }

        // Resources
        if self.num_threads.is_none() {
            self.num_threads = config.num_threads;
        }

        // Flags (CLI flags take precedence, config only sets if not explicitly set)
        if !self.dry_run && config.dry_run.unwrap_or(false) {
            self.dry_run = true;
        }

        self
    }

    /// Load configuration and merge with CLI args
    pub fn with_config_file(self, config_path: &str) -> Result<Self, String> {
        let config = Config::from_file(config_path)?;
        Ok(self.merge_with_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["antswrap"], args).unwrap()
    }

    #[test]
    fn test_cli_values_win() {
        let args = parse(&["--task", "image_math", "--format", "json", "--set", "op1=b.nii"]);
        let config = Config {
            task: Some("threshold_image".to_string()),
            format: Some("shell".to_string()),
            work_dir: Some("/data".to_string()),
            set: Some(vec!["op1=a.nii".to_string(), "operation=m".to_string()]),
            dry_run: Some(true),
            ..Config::new()
        };
        let merged = args.merge_with_config(config);
        assert_eq!(merged.task.as_deref(), Some("image_math"));
        assert_eq!(merged.format, "json");
        assert_eq!(merged.work_dir, "/data");
        assert_eq!(merged.set, vec!["op1=a.nii", "operation=m", "op1=b.nii"]);
        assert!(merged.dry_run);
    }

    #[test]
    fn test_config_fills_defaults() {
        let config = Config {
            task: Some("ai".to_string()),
            num_threads: Some(8),
            output: Some("plan.sh".to_string()),
            ..Config::new()
        };
        let merged = parse(&[]).merge_with_config(config);
        assert_eq!(merged.task.as_deref(), Some("ai"));
        assert_eq!(merged.num_threads, Some(8));
        assert_eq!(merged.output.as_deref(), Some("plan.sh"));
        assert_eq!(merged.format, "argv");
        assert!(!merged.dry_run);
    }
}
