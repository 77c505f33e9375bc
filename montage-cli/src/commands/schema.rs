//! Schema command handlers
//!
//! Schemas come back as plain JSON; only the fields shown here are read.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use serde_json::Value;

use crate::config::Config;

/// Schema subcommands
#[derive(Subcommand)]
pub enum SchemaCommands {
    /// List every node type
    List,
    /// Show the input slots and config fields of one node type
    Show {
        /// Node type, e.g. merge-videos
        node_type: String,
    },
}

/// Handle schema commands
pub async fn handle_schema_command(command: SchemaCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        SchemaCommands::List => {
            let schemas = client.list_schemas().await?;
            println!("{}", format!("Found {} node type(s):", schemas.len()).bold());
            println!();
            for schema in &schemas {
                println!("  {} {}", "▸".cyan(), text(schema, "node_type"));
            }
            Ok(())
        }
        SchemaCommands::Show { node_type } => {
            let schema = client.get_schema(&node_type).await?;
            print_schema(&schema);
            Ok(())
        }
    }
}

fn text<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("?")
}

fn requirement(value: &Value) -> ColoredString {
    if value.get("required").and_then(Value::as_bool) == Some(true) {
        "required".yellow()
    } else {
        "optional".dimmed()
    }
}

fn slot_shape(slot: &Value) -> String {
    if text(slot, "kind") != "multiple" {
        return "single".to_string();
    }
    let min = slot.get("min").and_then(Value::as_u64).unwrap_or(0);
    match slot.get("max").and_then(Value::as_u64) {
        Some(max) => format!("multiple ({}..={})", min, max),
        None => format!("multiple ({}..)", min),
    }
}

fn print_schema(schema: &Value) {
    println!("{}", format!("Schema {}", text(schema, "node_type")).bold());
    println!("{}", "─".repeat(60).dimmed());

    let empty = Vec::new();
    let inputs = schema.get("inputs").and_then(Value::as_array).unwrap_or(&empty);
    println!("  Inputs:");
    if inputs.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for slot in inputs {
        println!(
            "    {} {} {} {}",
            "▸".cyan(),
            text(slot, "name").bold(),
            slot_shape(slot),
            requirement(slot)
        );
    }

    let fields = schema.get("config").and_then(Value::as_array).unwrap_or(&empty);
    println!("  Config:");
    if fields.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for field in fields {
        println!(
            "    {} {}: {} {}",
            "▸".cyan(),
            text(field, "name").bold(),
            text(field, "field_type"),
            requirement(field)
        );
        if let Some(allowed) = field.get("allowed_values").and_then(Value::as_array) {
            let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
            println!("      one of {}", allowed.join(", ").dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_shape() {
        assert_eq!(slot_shape(&json!({ "kind": "single" })), "single");
        assert_eq!(
            slot_shape(&json!({ "kind": "multiple", "min": 2, "max": null })),
            "multiple (2..)"
        );
        assert_eq!(
            slot_shape(&json!({ "kind": "multiple", "min": 1, "max": 4 })),
            "multiple (1..=4)"
        );
    }
}
