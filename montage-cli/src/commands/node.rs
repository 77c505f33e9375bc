//! Node command handlers
//!
//! Inspect, validate and execute nodes, or create one from a JSON file.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use montage_client::OrchestratorClient;
use montage_core::domain::node::NodeStatus;
use montage_core::dto::node::{CreateNode, NodeRecord};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::output::{colorize_status, print_node_details};

/// Node subcommands
#[derive(Subcommand)]
pub enum NodeCommands {
    /// Create a node from a JSON definition
    Create {
        /// Path to a file holding the node definition
        file: PathBuf,
    },
    /// Show node details
    Show {
        /// Node ID
        id: Uuid,
    },
    /// Re-run validation and show the result
    Validate {
        /// Node ID
        id: Uuid,
    },
    /// Execute a node
    Execute {
        /// Node ID
        id: Uuid,

        /// Wait until the node completes or fails
        #[arg(short, long)]
        wait: bool,

        /// Seconds between status checks while waiting
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
}

/// Handle node commands
pub async fn handle_node_command(command: NodeCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        NodeCommands::Create { file } => create_node(&client, file).await,
        NodeCommands::Show { id } => show_node(&client, id).await,
        NodeCommands::Validate { id } => validate_node(&client, id).await,
        NodeCommands::Execute { id, wait, interval } => {
            execute_node(&client, id, wait, Duration::from_secs(interval.max(1))).await
        }
    }
}

async fn create_node(client: &OrchestratorClient, file: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request: CreateNode = serde_json::from_str(&content)
        .with_context(|| format!("Invalid node definition in {}", file.display()))?;

    let node = client.create_node(&request).await?;

    println!("{}", "✓ Node created".green().bold());
    println!();
    print_node_details(&node);

    Ok(())
}

async fn show_node(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let node = client.get_node(id).await?;
    print_node_details(&node);
    Ok(())
}

async fn validate_node(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let node = client.validate_node(id).await?;

    if node.is_valid {
        println!("{}", "✓ Node is valid".green().bold());
    } else {
        println!(
            "{}",
            format!("✗ Node has {} validation error(s)", node.validation_errors.len())
                .red()
                .bold()
        );
    }
    println!();
    print_node_details(&node);

    Ok(())
}

async fn execute_node(
    client: &OrchestratorClient,
    id: Uuid,
    wait: bool,
    interval: Duration,
) -> Result<()> {
    let node = client.execute_node(id).await?;
    println!(
        "{} Execution of {} dispatched",
        "▸".cyan(),
        node.title.bold()
    );

    if !wait {
        println!(
            "{}",
            format!("  Follow with: montage node show {}", id).dimmed()
        );
        return Ok(());
    }

    let node = wait_for_terminal(client, id, interval).await?;
    println!();
    print_node_details(&node);

    if node.status == NodeStatus::Failed {
        anyhow::bail!("Node {} failed", id);
    }
    Ok(())
}

async fn wait_for_terminal(
    client: &OrchestratorClient,
    id: Uuid,
    interval: Duration,
) -> Result<NodeRecord> {
    let mut last = None;
    loop {
        let node = client.get_node(id).await?;
        if last != Some(node.status) {
            println!("  Status: {}", colorize_status(node.status));
            last = Some(node.status);
        }
        if matches!(node.status, NodeStatus::Completed | NodeStatus::Failed) {
            return Ok(node);
        }
        tokio::time::sleep(interval).await;
    }
}
