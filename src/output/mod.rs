// mod.rs - Plan writers: argv, shell script, JSON and TSV

use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::tasks::TaskPlan;

/// Supported plan output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Argv,
    Shell,
    Json,
    Tsv,
}

impl OutputFormat {
    pub const NAMES: &'static [&'static str] = &["argv", "shell", "json", "tsv"];
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "argv" => Ok(OutputFormat::Argv),
            "shell" | "sh" => Ok(OutputFormat::Shell),
            "json" => Ok(OutputFormat::Json),
            "tsv" => Ok(OutputFormat::Tsv),
            _ => Err(format!(
                "Unsupported output format: {}. Use: {}",
                s,
                OutputFormat::NAMES.join(", ")
            )),
        }
    }
}

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).map_err(|e| {
                format!("Failed to create parent directory '{}': {}", parent.display(), e)
            })?;
        }
    }
    Ok(())
}

fn header_lines(command_line: &str) -> Vec<String> {
    vec![
        format!("# Command: {}", command_line),
        format!("# Generated: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
        format!("# antswrap v{}", env!("CARGO_PKG_VERSION")),
    ]
}

/// One token per line, executable first
pub fn render_argv(plan: &TaskPlan) -> String {
    let mut out = plan.argv.join("\n");
    out.push('\n');
    out
}

/// Executable shell script with the environment exported
pub fn render_shell(plan: &TaskPlan, command_line: &str) -> String {
    let mut lines = vec!["#!/bin/sh".to_string()];
    lines.extend(header_lines(command_line));
    lines.push(format!("# Task: {}", plan.task));
    for (name, value) in &plan.env {
        lines.push(format!("export {}={}", name, shell_words::quote(value)));
    }
    lines.push(shell_words::join(&plan.argv));
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn render_json(plan: &TaskPlan) -> Result<String, String> {
    let mut out = serde_json::to_string_pretty(plan)
        .map_err(|e| format!("Failed to serialize plan: {}", e))?;
    out.push('\n');
    Ok(out)
}

/// `section\tname\tvalue` rows for argv positions, environment and outputs
pub fn render_tsv(plan: &TaskPlan, command_line: &str) -> Result<String, String> {
    let mut buffer = Vec::new();
    for line in header_lines(command_line) {
        writeln!(buffer, "{}", line).map_err(|e| format!("Write error: {}", e))?;
    }

    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(&mut buffer);
        let mut row = |section: &str, name: &str, value: &str| {
            writer
                .write_record([section, name, value])
                .map_err(|e| format!("Write error: {}", e))
        };

        row("section", "name", "value")?;
        row("task", "name", &plan.task)?;
        for (i, token) in plan.argv.iter().enumerate() {
            row("argv", &i.to_string(), token)?;
        }
        for (name, value) in &plan.env {
            row("env", name, value)?;
        }
        for (name, value) in &plan.outputs {
            for line in value.lines() {
                row("output", name, &line)?;
            }
        }
        writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    }

    String::from_utf8(buffer).map_err(|e| format!("Invalid UTF-8 in TSV output: {}", e))
}

/// Render a plan in the requested format
pub fn render_plan(
    plan: &TaskPlan,
    format: OutputFormat,
    command_line: &str,
) -> Result<String, String> {
    match format {
        OutputFormat::Argv => Ok(render_argv(plan)),
        OutputFormat::Shell => Ok(render_shell(plan, command_line)),
        OutputFormat::Json => render_json(plan),
        OutputFormat::Tsv => render_tsv(plan, command_line),
    }
}

/// Write a plan to a file, or to stdout when no path is given
pub fn write_plan(
    plan: &TaskPlan,
    format: OutputFormat,
    file_path: Option<&str>,
    command_line: &str,
) -> Result<(), String> {
    let content = render_plan(plan, format, command_line)?;

    match file_path {
        Some(file_path) => {
            ensure_parent_dir(file_path)?;
            let file = File::create(file_path)
                .map_err(|e| format!("Failed to create output file '{}': {}", file_path, e))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(content.as_bytes())
                .map_err(|e| format!("Write error: {}", e))?;
            writer.flush().map_err(|e| format!("Flush error: {}", e))?;
            eprintln!("✅ Plan for '{}' written to: {}", plan.task, file_path);
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .map_err(|e| format!("Write error: {}", e))?;
        }
    }
    Ok(())
}
