//! Polling provider adapter
//!
//! Submission happens inside the dispatch task. Each status query afterwards
//! is a [`PollCheck`] handed to the scheduler, so no task sits blocked while a
//! provider renders.

use montage_client::GenerationProvider;
use montage_core::domain::execution::{ExecutionToken, OutputDescriptor};
use montage_core::domain::executor::ExecutorType;
use montage_core::domain::node::{Node, NodeMetadata, NodeStatus};
use montage_core::domain::pipeline::Pipeline;
use montage_core::dto::provider::{
    GenerationRequest, GenerationStatus, SlotUrls, SubmitResponse,
};
use montage_core::schema::{NodeSchema, SlotKind};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{ExecutorContext, ExecutorError, inputs};
use crate::scheduler::PollCheck;

/// What one status check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Rescheduled,
    Failed,
    TimedOut,
    /// The attempt was superseded or the node is gone
    Aborted,
}

pub async fn submit(
    ctx: &ExecutorContext,
    provider: &dyn GenerationProvider,
    executor_type: ExecutorType,
    schema: &NodeSchema,
    node: Node,
    token: ExecutionToken,
) -> Result<(), ExecutorError> {
    let pipeline = ctx.attempt_pipeline(&node, token).await?;

    let submitted = match request(ctx, provider, &pipeline, schema, &node).await {
        Ok(submitted) => submitted,
        Err(e) => {
            ctx.lifecycle
                .fail(node.id, format!("Submission error: {e}"), token)
                .await?;
            return Err(e);
        }
    };

    if submitted.status == Some(GenerationStatus::Completed) {
        if let Some(url) = submitted.url.as_deref() {
            info!("Provider finished node {} inline", node.id);
            return match finish(
                ctx,
                &pipeline,
                &node,
                executor_type,
                token,
                url,
                submitted.duration_seconds,
                submitted.cost,
            )
            .await
            {
                Ok(_) => Ok(()),
                Err(e) => {
                    ctx.lifecycle
                        .fail(node.id, format!("Submission error: {e}"), token)
                        .await?;
                    Err(e)
                }
            };
        }
    }

    let Some(job_id) = submitted.job_id else {
        let e = ExecutorError::InvalidProviderResponse("no job id".to_string());
        ctx.lifecycle
            .fail(node.id, format!("Submission error: {e}"), token)
            .await?;
        return Err(e);
    };

    let patch = NodeMetadata {
        cost: submitted.cost,
        ..NodeMetadata::with_provider_job_id(job_id.clone())
    };
    if !ctx.lifecycle.update(node.id, patch, token).await? {
        debug!("Attempt for node {} superseded before polling began", node.id);
        return Ok(());
    }

    info!(
        "Submitted node {} to {} (job {})",
        node.id, executor_type, job_id
    );
    ctx.scheduler.schedule(
        ctx.settings.poll_interval,
        PollCheck {
            node_id: node.id,
            token,
            executor_type,
            provider_job_id: job_id,
            attempt: 1,
        },
    );
    Ok(())
}

async fn request(
    ctx: &ExecutorContext,
    provider: &dyn GenerationProvider,
    pipeline: &Pipeline,
    schema: &NodeSchema,
    node: &Node,
) -> Result<SubmitResponse, ExecutorError> {
    let bucket = ctx.bucket(pipeline);
    let mut urls = BTreeMap::new();

    for slot in inputs::resolve(ctx, node, schema).await? {
        let mut presigned = Vec::with_capacity(slot.outputs.len());
        for output in &slot.outputs {
            presigned.push(
                ctx.storage
                    .presigned_url(&output.key, bucket, ctx.settings.presign_ttl)
                    .await?,
            );
        }

        let value = match slot.kind {
            SlotKind::Single => match presigned.into_iter().next() {
                Some(url) => SlotUrls::Single(url),
                None => continue,
            },
            SlotKind::Multiple { .. } => SlotUrls::Multiple(presigned),
        };
        urls.insert(slot.name.to_string(), value);
    }

    let request = GenerationRequest {
        node_id: node.id,
        parameters: node.config.clone(),
        inputs: urls,
    };
    Ok(provider.submit(&request).await?)
}

/// Run one status check for one attempt
pub async fn check(
    ctx: &ExecutorContext,
    provider: &dyn GenerationProvider,
    check: PollCheck,
) -> Result<PollOutcome, ExecutorError> {
    let Some(node) = ctx.repo.find_node(check.node_id).await? else {
        debug!("Node {} deleted, dropping poll", check.node_id);
        return Ok(PollOutcome::Aborted);
    };
    if node.status() != NodeStatus::InProgress || node.execution.token() != Some(check.token) {
        debug!(
            "Poll {} for node {} belongs to a superseded attempt",
            check.attempt, check.node_id
        );
        return Ok(PollOutcome::Aborted);
    }

    let max = ctx.settings.max_poll_attempts;
    if check.attempt > max {
        return time_out(ctx, &check, max).await;
    }

    let status = match provider.status(&check.provider_job_id).await {
        Ok(status) => status,
        Err(e) => {
            ctx.lifecycle
                .fail(node.id, format!("Polling error: {e}"), check.token)
                .await?;
            return Err(e.into());
        }
    };

    match status.status {
        GenerationStatus::Completed => {
            let Some(url) = status.url.as_deref() else {
                ctx.lifecycle
                    .fail(
                        node.id,
                        "API generation failed: completed without a result url",
                        check.token,
                    )
                    .await?;
                return Ok(PollOutcome::Failed);
            };

            let pipeline = ctx.pipeline(node.pipeline_id).await?;
            match finish(
                ctx,
                &pipeline,
                &node,
                check.executor_type,
                check.token,
                url,
                status.duration_seconds,
                status.cost,
            )
            .await
            {
                Ok(true) => Ok(PollOutcome::Completed),
                Ok(false) => Ok(PollOutcome::Aborted),
                Err(e) => {
                    ctx.lifecycle
                        .fail(node.id, format!("Polling error: {e}"), check.token)
                        .await?;
                    Err(e)
                }
            }
        }
        GenerationStatus::Pending | GenerationStatus::Processing => {
            if check.attempt >= max {
                return time_out(ctx, &check, max).await;
            }
            debug!(
                "Node {} still {:?} after attempt {}",
                node.id, status.status, check.attempt
            );
            ctx.scheduler
                .schedule(ctx.settings.poll_interval, check.next());
            Ok(PollOutcome::Rescheduled)
        }
        GenerationStatus::Failed => {
            let reason = status.error.as_deref().unwrap_or("unknown error");
            ctx.lifecycle
                .fail(
                    node.id,
                    format!("API generation failed: {reason}"),
                    check.token,
                )
                .await?;
            Ok(PollOutcome::Failed)
        }
    }
}

async fn time_out(
    ctx: &ExecutorContext,
    check: &PollCheck,
    max: u32,
) -> Result<PollOutcome, ExecutorError> {
    ctx.lifecycle
        .fail(
            check.node_id,
            format!("Polling timeout after {max} attempts"),
            check.token,
        )
        .await?;
    Ok(PollOutcome::TimedOut)
}

/// Copy the provider's artifact into storage and complete the attempt
///
/// Returns whether the completion was applied.
#[allow(clippy::too_many_arguments)]
async fn finish(
    ctx: &ExecutorContext,
    pipeline: &Pipeline,
    node: &Node,
    executor_type: ExecutorType,
    token: ExecutionToken,
    url: &str,
    duration_seconds: Option<f64>,
    cost: Option<f64>,
) -> Result<bool, ExecutorError> {
    let media = ctx.fetcher.fetch(url).await?;
    let media_type = media
        .content_type
        .clone()
        .unwrap_or_else(|| executor_type.default_media_type().to_string());
    let key = ctx.output_key(pipeline, node, &media_type);
    let size_bytes = media.bytes.len() as u64;

    ctx.storage
        .upload(&key, media.bytes, &media_type, ctx.bucket(pipeline))
        .await?;

    if cost.is_some() {
        let patch = NodeMetadata {
            cost,
            ..NodeMetadata::default()
        };
        ctx.lifecycle.update(node.id, patch, token).await?;
    }

    let output = OutputDescriptor {
        key,
        media_type,
        size_bytes,
        duration_seconds,
    };
    let report = ctx.lifecycle.succeed(node.id, output, token).await?;
    Ok(report.outcome.is_applied())
}
