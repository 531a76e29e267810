use colored::Colorize;
use serde_json::Value;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => print_error(&format!("failed to render JSON: {e}")),
        },
        OutputFormat::Text => println!("{}", format_text(value, 0)),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn format_text(value: &Value, indent: usize) -> String {
    let prefix = " ".repeat(indent);
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            items
                .iter()
                .map(|v| format!("{prefix}- {}", format_text(v, indent + 2).trim_start()))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                return "{}".to_string();
            }
            fields
                .iter()
                .map(|(k, v)| match v {
                    Value::Array(_) | Value::Object(_) => {
                        format!("{prefix}{}:\n{}", k.cyan(), format_text(v, indent + 2))
                    }
                    _ => format!("{prefix}{}: {}", k.cyan(), format_text(v, indent + 2)),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}
