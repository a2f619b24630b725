// describe_task.rs - Print the parameter schema of one or all tasks

use clap::{Arg, ArgAction, Command};
use serde::Serialize;

use antswrap::core::{FieldSpec, Schema};
use antswrap::tasks::{Task, TaskRegistry};

#[derive(Debug, Serialize)]
struct FieldDescription {
    name: String,
    kind: String,
    help: String,
    mandatory: bool,
    default: Option<String>,
    allowed: Option<Vec<String>>,
    requires: Vec<String>,
    excludes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TaskDescription {
    task: String,
    executable: String,
    description: String,
    fields: Vec<FieldDescription>,
}

fn describe_field(schema: &Schema, field: &FieldSpec) -> FieldDescription {
    FieldDescription {
        name: field.name.clone(),
        kind: field.kind.describe(),
        help: field.help.clone(),
        mandatory: field.mandatory,
        default: field.default.as_ref().map(|v| v.to_string()),
        allowed: field
            .allowed
            .as_ref()
            .map(|values| values.iter().map(|v| v.to_string()).collect()),
        requires: field.requires.clone(),
        excludes: schema
            .excludes(&field.name)
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

fn describe_task(task: &dyn Task) -> TaskDescription {
    let schema = task.schema();
    TaskDescription {
        task: task.name().to_string(),
        executable: task.executable().to_string(),
        description: task.description().to_string(),
        fields: schema
            .fields()
            .iter()
            .map(|f| describe_field(schema, f))
            .collect(),
    }
}

fn print_task(description: &TaskDescription) {
    println!("🔧 {} ({})", description.task, description.executable);
    println!("   {}", description.description);
    for field in &description.fields {
        let mut notes = Vec::new();
        if field.mandatory {
            notes.push("mandatory".to_string());
        }
        if let Some(default) = &field.default {
            notes.push(format!("default {}", default));
        }
        if let Some(allowed) = &field.allowed {
            notes.push(format!("one of {}", allowed.join("|")));
        }
        if !field.requires.is_empty() {
            notes.push(format!("requires {}", field.requires.join(", ")));
        }
        if !field.excludes.is_empty() {
            notes.push(format!("excludes {}", field.excludes.join(", ")));
        }
        println!("   - {:<34} {:<18} {}", field.name, field.kind, field.help);
        if !notes.is_empty() {
            println!("     {:<34} [{}]", "", notes.join("; "));
        }
    }
    println!();
}

fn main() {
    if let Err(e) = run() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let matches = Command::new("describe_task")
        .version(antswrap::VERSION)
        .about("Prints the parameter schema of antswrap tasks")
        .arg(Arg::new("task")
            .value_name("TASK")
            .help("Task to describe (default: all tasks)"))
        .arg(Arg::new("json")
            .long("json")
            .help("Print the schema as JSON")
            .action(ArgAction::SetTrue))
        .get_matches();

    let registry =
        TaskRegistry::new().map_err(|e| format!("Failed to build task registry: {}", e))?;

    let descriptions: Vec<TaskDescription> = match matches.get_one::<String>("task") {
        Some(name) => {
            let task = registry.require_task(name).map_err(|e| {
                format!("{}. Available: {}", e, registry.get_task_names().join(", "))
            })?;
            vec![describe_task(task)]
        }
        None => registry
            .get_task_names()
            .into_iter()
            .filter_map(|name| registry.get_task(name))
            .map(describe_task)
            .collect(),
    };

    if matches.get_flag("json") {
        let json = serde_json::to_string_pretty(&descriptions)
            .map_err(|e| format!("Failed to serialize schema: {}", e))?;
        println!("{}", json);
    } else {
        for description in &descriptions {
            print_task(description);
        }
    }
    Ok(())
}
