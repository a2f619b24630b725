// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// antswrap - Typed command lines and output paths for ANTs executables
pub struct Args {
    /// task to compile (see --list-tasks)
    #[argh(option)]
    pub task: Option<String>,

    /// parameter file (.toml or .json)
    #[argh(option)]
    pub params: Option<String>,

    /// parameter override as key=value, repeatable (value is a TOML literal or plain text)
    #[argh(option)]
    pub set: Vec<String>,

    /// directory output paths are resolved against (default: .)
    #[argh(option, default = "String::from(\".\")")]
    pub work_dir: String,

    /// output format: argv, shell, json, tsv (default: argv)
    #[argh(option, default = "String::from(\"argv\")")]
    pub format: String,

    /// output file (default: stdout)
    #[argh(option)]
    pub output: Option<String>,

    /// bind num_threads when the task declares it
    #[argh(option)]
    pub num_threads: Option<i64>,

    /// list available tasks and exit
    #[argh(switch)]
    pub list_tasks: bool,

    /// validate parameters without writing a plan (dry run)
    #[argh(switch)]
    pub dry_run: bool,

    /// enable debug logging
    #[argh(switch)]
    pub verbose: bool,

    /// path to TOML configuration file
    #[argh(option)]
    pub config: Option<String>,

    /// generate sample configuration file and exit
    #[argh(switch)]
    pub generate_config: bool,
}
