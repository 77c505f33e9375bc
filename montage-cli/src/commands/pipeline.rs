//! Pipeline command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use montage_client::OrchestratorClient;
use montage_core::domain::pipeline::PipelineConfig;
use montage_core::dto::pipeline::CreatePipeline;
use uuid::Uuid;

use crate::config::Config;
use crate::output::print_progress;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create an empty pipeline
    Create {
        /// Pipeline title
        title: String,

        /// Bucket for the pipeline's artifacts
        #[arg(long)]
        bucket: Option<String>,

        /// Key prefix for the pipeline's artifacts
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Show pipeline details
    Show {
        /// Pipeline ID
        id: Uuid,
    },
    /// Show node counts and accumulated cost
    Progress {
        /// Pipeline ID
        id: Uuid,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        PipelineCommands::Create {
            title,
            bucket,
            prefix,
        } => create_pipeline(&client, title, bucket, prefix).await,
        PipelineCommands::Show { id } => show_pipeline(&client, id).await,
        PipelineCommands::Progress { id } => {
            let progress = client.pipeline_progress(id).await?;
            print_progress(&progress);
            Ok(())
        }
    }
}

async fn create_pipeline(
    client: &OrchestratorClient,
    title: String,
    bucket: Option<String>,
    prefix: Option<String>,
) -> Result<()> {
    let request = CreatePipeline {
        title,
        config: PipelineConfig {
            storage_bucket: bucket,
            output_prefix: prefix,
        },
    };

    let pipeline = client.create_pipeline(&request).await?;

    println!("{}", "✓ Pipeline created".green().bold());
    println!("  ID:    {}", pipeline.id.to_string().cyan());
    println!("  Title: {}", pipeline.title);

    Ok(())
}

async fn show_pipeline(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let pipeline = client.get_pipeline(id).await?;

    println!("{}", format!("Pipeline {}", pipeline.id).bold());
    println!("{}", "─".repeat(60).dimmed());
    println!("  Title:   {}", pipeline.title);
    println!("  Version: {}", pipeline.version);
    if let Some(bucket) = &pipeline.config.storage_bucket {
        println!("  Bucket:  {}", bucket);
    }
    println!("  Prefix:  {}", pipeline.output_prefix().dimmed());
    println!("  Cost:    {:.2}", pipeline.metadata.total_cost);
    println!(
        "  Created: {}",
        pipeline
            .created_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed()
    );

    Ok(())
}
