//! Commands module
//!
//! Defines all CLI commands and their handlers.

pub mod node;
pub mod pipeline;
pub mod schema;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Node inspection and execution
    Node {
        #[command(subcommand)]
        command: node::NodeCommands,
    },
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: pipeline::PipelineCommands,
    },
    /// Node type schemas
    Schema {
        #[command(subcommand)]
        command: schema::SchemaCommands,
    },
}

/// Route the command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Node { command } => node::handle_node_command(command, config).await,
        Commands::Pipeline { command } => {
            pipeline::handle_pipeline_command(command, config).await
        }
        Commands::Schema { command } => schema::handle_schema_command(command, config).await,
    }
}
