// main.rs - CLI entry point

use std::time::Instant;

use antswrap::cli::Config;
use antswrap::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_main() -> Result<(), String> {
    let mut args: Args = argh::from_env();
    let command_line = std::env::args().collect::<Vec<String>>().join(" ");

    // Handle generate config first
    if args.generate_config {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
        return Ok(());
    }

    init_logging(args.verbose);

    // Load configuration file if specified
    if let Some(config_path) = args.config.clone() {
        args = args.with_config_file(&config_path)?;
    }

    let registry =
        TaskRegistry::new().map_err(|e| format!("Failed to build task registry: {}", e))?;

    if args.list_tasks {
        println!("📋 Available tasks:");
        for (name, executable, description) in registry.list_tasks() {
            println!("  - {:<36} {:<30} {}", name, executable, description);
        }
        return Ok(());
    }

    // Validate all arguments
    let validation = validate_args(&args, &registry)?;
    let task = registry
        .require_task(&validation.task)
        .map_err(|e| e.to_string())?;

    eprintln!("🚀 antswrap v{}", VERSION);
    eprintln!("🔧 Task: {} ({})", task.name(), task.executable());
    eprintln!("📂 Working directory: {}", validation.work_dir.display());

    let start = Instant::now();

    if args.dry_run {
        task.bind(&validation.params)
            .map_err(|e| format!("Invalid parameters for '{}': {}", task.name(), e))?;
        eprintln!("✅ Dry run completed successfully");
        return Ok(());
    }

    let plan = task
        .compile(&validation.params, &validation.work_dir)
        .map_err(|e| format!("Invalid parameters for '{}': {}", task.name(), e))?;

    eprintln!(
        "✅ Compiled {} argument(s) and {} output(s) in {:.1?}",
        plan.argv.len(),
        plan.outputs.len(),
        start.elapsed()
    );

    write_plan(&plan, validation.format, args.output.as_deref(), &command_line)
}
