//! Postgres repository
//!
//! Transitions run in a transaction that takes the node row with
//! `SELECT ... FOR UPDATE`, so the token comparison and the write are one
//! critical section across every orchestrator instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use montage_core::domain::execution::{ExecutionState, Transition};
use montage_core::domain::node::{InputRef, Node, NodeMetadata};
use montage_core::domain::pipeline::{Pipeline, PipelineConfig, PipelineMetadata};
use montage_core::validation::ValidationResult;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use super::{NodeRepository, PipelineRepository, RepositoryError, TransitionReport};

const NODE_COLUMNS: &str = r#"
    id, pipeline_id, title, node_type, inputs, config, asset, execution,
    is_valid, validation_errors, metadata, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_node(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Node>, RepositoryError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(Node::from))
    }

    async fn write_execution(
        tx: &mut Transaction<'_, Postgres>,
        node: &Node,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE nodes
            SET status = $1, execution = $2, execution_token = $3, metadata = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(node.status().as_str())
        .bind(Json(&node.execution))
        .bind(node.execution.token().map(|t| t.as_uuid()))
        .bind(Json(&node.metadata))
        .bind(node.updated_at)
        .bind(node.id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PipelineRepository for PgRepository {
    async fn insert_pipeline(&self, pipeline: &Pipeline) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO pipelines (id, title, version, config, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(pipeline.id)
        .bind(&pipeline.title)
        .bind(pipeline.version)
        .bind(Json(&pipeline.config))
        .bind(Json(&pipeline.metadata))
        .bind(pipeline.created_at)
        .bind(pipeline.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, RepositoryError> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, title, version, config, metadata, created_at, updated_at
            FROM pipelines
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_cost(&self, id: Uuid, amount: f64) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE pipelines
            SET metadata = jsonb_set(
                    metadata,
                    '{total_cost}',
                    to_jsonb(COALESCE((metadata->>'total_cost')::float8, 0) + $1)
                ),
                updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::PipelineNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeRepository for PgRepository {
    async fn insert_node(&self, node: &Node) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO nodes (id, pipeline_id, title, node_type, inputs, config, asset,
                               status, execution, execution_token, is_valid,
                               validation_errors, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(node.id)
        .bind(node.pipeline_id)
        .bind(&node.title)
        .bind(&node.node_type)
        .bind(Json(&node.inputs))
        .bind(Json(&node.config))
        .bind(node.asset.as_ref().map(Json))
        .bind(node.status().as_str())
        .bind(Json(&node.execution))
        .bind(node.execution.token().map(|t| t.as_uuid()))
        .bind(node.is_valid)
        .bind(Json(&node.validation_errors))
        .bind(Json(&node.metadata))
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_foreign_key_violation() {
                    return RepositoryError::PipelineNotFound(node.pipeline_id);
                }
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    async fn find_node(&self, id: Uuid) -> Result<Option<Node>, RepositoryError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Node>, RepositoryError> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE pipeline_id = $1 ORDER BY created_at ASC"
        ))
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn find_many(&self, pipeline_id: Uuid, ids: &[Uuid]) -> Result<Vec<Node>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE pipeline_id = $1 AND id = ANY($2)"
        ))
        .bind(pipeline_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn find_existing_ids(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM nodes WHERE pipeline_id = $1 AND id = ANY($2)")
                .bind(pipeline_id)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(found.into_iter().collect())
    }

    async fn update_definition(
        &self,
        node: &Node,
        reset_execution: bool,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();

        let result = if reset_execution {
            sqlx::query(
                r#"
                UPDATE nodes
                SET title = $1, inputs = $2, config = $3, asset = $4,
                    is_valid = $5, validation_errors = $6, updated_at = $7,
                    status = $8, execution = $9, execution_token = NULL,
                    metadata = '{}'
                WHERE id = $10
                "#,
            )
            .bind(&node.title)
            .bind(Json(&node.inputs))
            .bind(Json(&node.config))
            .bind(node.asset.as_ref().map(Json))
            .bind(node.is_valid)
            .bind(Json(&node.validation_errors))
            .bind(now)
            .bind(ExecutionState::NotStarted.status().as_str())
            .bind(Json(ExecutionState::NotStarted))
            .bind(node.id)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE nodes
                SET title = $1, inputs = $2, config = $3, asset = $4,
                    is_valid = $5, validation_errors = $6, updated_at = $7
                WHERE id = $8
                "#,
            )
            .bind(&node.title)
            .bind(Json(&node.inputs))
            .bind(Json(&node.config))
            .bind(node.asset.as_ref().map(Json))
            .bind(node.is_valid)
            .bind(Json(&node.validation_errors))
            .bind(now)
            .bind(node.id)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NodeNotFound(node.id));
        }
        Ok(())
    }

    async fn save_validation(
        &self,
        id: Uuid,
        result: &ValidationResult,
    ) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            r#"
            UPDATE nodes
            SET is_valid = $1, validation_errors = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(result.is_valid)
        .bind(Json(&result.errors))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NodeNotFound(id));
        }
        Ok(())
    }

    async fn delete_detaching(&self, id: Uuid) -> Result<Option<Vec<Uuid>>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(removed) = Self::lock_node(&mut tx, id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE pipeline_id = $1 AND id <> $2 FOR UPDATE"
        ))
        .bind(removed.pipeline_id)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let mut detached = Vec::new();
        for row in rows {
            let mut sibling = Node::from(row);
            if !sibling.detach(id) {
                continue;
            }
            sqlx::query("UPDATE nodes SET inputs = $1, updated_at = $2 WHERE id = $3")
                .bind(Json(&sibling.inputs))
                .bind(now)
                .bind(sibling.id)
                .execute(&mut *tx)
                .await?;
            detached.push(sibling.id);
        }

        sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(detached))
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<TransitionReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut node = Self::lock_node(&mut tx, id)
            .await?
            .ok_or(RepositoryError::NodeNotFound(id))?;

        let now = Utc::now();
        let outcome = transition.apply(&mut node.execution, &mut node.metadata, now);
        if outcome.is_applied() {
            node.updated_at = now;
            Self::write_execution(&mut tx, &node).await?;
        }

        tx.commit().await?;
        Ok(TransitionReport { outcome, node })
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    title: String,
    version: i32,
    config: Json<PipelineConfig>,
    metadata: Json<PipelineMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: row.id,
            title: row.title,
            version: row.version,
            config: row.config.0,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: Uuid,
    pipeline_id: Uuid,
    title: String,
    node_type: String,
    inputs: Json<BTreeMap<String, InputRef>>,
    config: Json<Map<String, Value>>,
    asset: Option<Json<Value>>,
    execution: Json<ExecutionState>,
    is_valid: bool,
    validation_errors: Json<BTreeMap<String, String>>,
    metadata: Json<NodeMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Node {
            id: row.id,
            pipeline_id: row.pipeline_id,
            title: row.title,
            node_type: row.node_type,
            inputs: row.inputs.0,
            config: row.config.0,
            asset: row.asset.map(|a| a.0),
            execution: row.execution.0,
            is_valid: row.is_valid,
            validation_errors: row.validation_errors.0,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
