//! Pipeline domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A video generation pipeline
///
/// Owns a graph of nodes. Deleting a pipeline deletes its nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub title: String,
    pub version: i32,
    pub config: PipelineConfig,
    pub metadata: PipelineMetadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Pipeline {
    pub fn new(title: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            version: 1,
            config: PipelineConfig::default(),
            metadata: PipelineMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage bucket for this pipeline's artifacts, falling back to `default`
    pub fn bucket<'a>(&'a self, default: &'a str) -> &'a str {
        self.config.storage_bucket.as_deref().unwrap_or(default)
    }

    /// Key prefix under which this pipeline's artifacts are stored
    pub fn output_prefix(&self) -> String {
        match &self.config.output_prefix {
            Some(prefix) => prefix.trim_end_matches('/').to_string(),
            None => format!("pipelines/{}", self.id),
        }
    }
}

/// Pipeline configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<String>,
}

/// Aggregate bookkeeping kept on the pipeline record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMetadata {
    #[serde(default)]
    pub total_cost: f64,
}
