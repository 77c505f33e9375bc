//! Terminal rendering shared by the command handlers

use colored::*;
use montage_core::domain::node::{InputRef, NodeStatus};
use montage_core::dto::node::NodeRecord;
use montage_core::dto::pipeline::PipelineProgress;

pub fn colorize_status(status: NodeStatus) -> ColoredString {
    match status {
        NodeStatus::Pending => status.as_str().yellow(),
        NodeStatus::InProgress => status.as_str().cyan(),
        NodeStatus::Completed => status.as_str().green(),
        NodeStatus::Failed => status.as_str().red(),
    }
}

fn describe_input(input: &InputRef) -> String {
    match input {
        InputRef::Single(id) => id.to_string(),
        InputRef::Multiple(ids) => {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            format!("[{}]", ids.join(", "))
        }
    }
}

pub fn print_node_details(node: &NodeRecord) {
    println!("{}", format!("Node {}", node.id).bold());
    println!("{}", "─".repeat(60).dimmed());
    println!("  Title:    {}", node.title);
    println!("  Type:     {}", node.node_type.cyan());
    println!("  Pipeline: {}", node.pipeline_id.to_string().dimmed());
    println!("  Status:   {}", colorize_status(node.status));

    if node.is_valid {
        println!("  Valid:    {}", "yes".green());
    } else {
        println!("  Valid:    {}", "no".red());
        for (field, message) in &node.validation_errors {
            println!("    {} {}: {}", "✗".red(), field.bold(), message);
        }
    }

    if !node.inputs.is_empty() {
        println!("  Inputs:");
        for (slot, input) in &node.inputs {
            println!("    {} {} ← {}", "▸".cyan(), slot, describe_input(input).dimmed());
        }
    }

    let metadata = &node.metadata;
    if let Some(job_id) = &metadata.attempt.provider_job_id {
        println!("  Job:      {}", job_id.dimmed());
    }
    if let Some(cost) = metadata.attempt.cost {
        println!("  Cost:     {:.2}", cost);
    }
    if let Some(token) = metadata.execution_token {
        println!("  Token:    {}", token.to_string().dimmed());
    }
    if let Some(started) = metadata.started_at {
        println!(
            "  Started:  {}",
            started.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
        );
    }
    if let Some(completed) = metadata.completed_at {
        println!(
            "  Finished: {}",
            completed.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
        );
    }

    if let Some(output) = &node.output {
        println!("  Output:");
        println!("    Key:   {}", output.key.green());
        println!("    Type:  {}", output.media_type);
        println!("    Size:  {} bytes", output.size_bytes);
        if let Some(duration) = output.duration_seconds {
            println!("    Length: {:.1}s", duration);
        }
    }
    if let Some(error) = &metadata.error {
        println!("  Error:    {}", error.red());
    }
}

pub fn print_progress(progress: &PipelineProgress) {
    println!(
        "{}",
        format!("Pipeline {}", progress.pipeline_id).bold()
    );
    println!("{}", "─".repeat(60).dimmed());
    println!("  Total:       {}", progress.total);
    println!("  Pending:     {}", progress.pending.to_string().yellow());
    println!("  In progress: {}", progress.in_progress.to_string().cyan());
    println!("  Completed:   {}", progress.completed.to_string().green());
    println!("  Failed:      {}", progress.failed.to_string().red());
    println!("  Invalid:     {}", progress.invalid.to_string().red());
    println!("  Cost:        {:.2}", progress.total_cost);

    if progress.is_finished() {
        println!();
        println!("{}", "✓ All nodes completed".green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_describe_input_keeps_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(describe_input(&InputRef::Single(a)), a.to_string());
        assert_eq!(
            describe_input(&InputRef::Multiple(vec![b, a])),
            format!("[{}, {}]", b, a)
        );
    }
}
