//! Asset adapter
//!
//! Assets resolve in-process: either the payload names an object already in
//! storage, or it names a URL which is copied into storage.

use montage_core::domain::execution::{ExecutionToken, OutputDescriptor};
use montage_core::domain::node::Node;
use montage_core::domain::pipeline::Pipeline;
use serde_json::Value;

use super::{ExecutorContext, ExecutorError};

pub async fn execute(
    ctx: &ExecutorContext,
    node: Node,
    token: ExecutionToken,
) -> Result<(), ExecutorError> {
    let pipeline = ctx.attempt_pipeline(&node, token).await?;

    match ingest(ctx, &pipeline, &node).await {
        Ok(output) => {
            ctx.lifecycle.succeed(node.id, output, token).await?;
            Ok(())
        }
        Err(e) => {
            ctx.lifecycle.fail(node.id, e.to_string(), token).await?;
            Err(e)
        }
    }
}

async fn ingest(
    ctx: &ExecutorContext,
    pipeline: &Pipeline,
    node: &Node,
) -> Result<OutputDescriptor, ExecutorError> {
    let asset = node
        .asset
        .as_ref()
        .and_then(Value::as_object)
        .ok_or_else(|| ExecutorError::Asset("Asset node has no asset payload".to_string()))?;
    let bucket = ctx.bucket(pipeline);
    let declared = asset
        .get("content_type")
        .or_else(|| asset.get("media_type"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let duration_seconds = asset.get("duration_seconds").and_then(Value::as_f64);

    if let Some(key) = asset.get("key").and_then(Value::as_str) {
        let size_bytes = ctx.storage.size(key, bucket).await?.ok_or_else(|| {
            ExecutorError::Asset(format!("Asset not found in storage: {key}"))
        })?;
        return Ok(OutputDescriptor {
            key: key.to_string(),
            media_type: declared.unwrap_or_else(|| category_media_type(node).to_string()),
            size_bytes,
            duration_seconds,
        });
    }

    if let Some(url) = asset.get("url").and_then(Value::as_str) {
        let media = ctx.fetcher.fetch(url).await?;
        let media_type = declared
            .or(media.content_type)
            .unwrap_or_else(|| category_media_type(node).to_string());
        let key = ctx.output_key(pipeline, node, &media_type);
        let size_bytes = media.bytes.len() as u64;
        ctx.storage
            .upload(&key, media.bytes, &media_type, bucket)
            .await?;

        return Ok(OutputDescriptor {
            key,
            media_type,
            size_bytes,
            duration_seconds,
        });
    }

    Err(ExecutorError::Asset(
        "Asset has neither a storage key nor a url".to_string(),
    ))
}

/// Fallback media type from the node's configured category
fn category_media_type(node: &Node) -> &'static str {
    match node.config.get("media_type").and_then(Value::as_str) {
        Some("video") => "video/mp4",
        Some("audio") => "audio/mpeg",
        Some("image") => "image/png",
        Some("text") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectStorage;
    use crate::testing::Harness;
    use montage_core::domain::node::NodeStatus;
    use serde_json::json;

    fn asset(harness: &Harness, payload: Value) -> Node {
        Node::new(harness.pipeline.id, "logo", "asset")
            .with_config("media_type", "image")
            .with_asset(payload)
    }

    #[tokio::test]
    async fn test_existing_key_is_adopted() {
        let harness = Harness::new().await;
        harness
            .storage
            .upload("brand/logo.png", vec![7; 64], "image/png", &harness.bucket())
            .await
            .unwrap();
        let node = harness
            .insert(asset(&harness, json!({ "key": "brand/logo.png" })))
            .await;

        harness.run(&node).await.unwrap();

        let stored = harness.node(node.id).await;
        assert_eq!(stored.status(), NodeStatus::Completed);
        let output = stored.output().unwrap();
        assert_eq!(output.key, "brand/logo.png");
        assert_eq!(output.media_type, "image/png");
        assert_eq!(output.size_bytes, 64);
    }

    #[tokio::test]
    async fn test_missing_key_fails_node() {
        let harness = Harness::new().await;
        let node = harness
            .insert(asset(&harness, json!({ "key": "brand/missing.png" })))
            .await;

        assert!(harness.run(&node).await.is_err());
        assert_eq!(
            harness.node(node.id).await.execution.error(),
            Some("Asset not found in storage: brand/missing.png")
        );
    }

    #[tokio::test]
    async fn test_url_is_copied_into_storage() {
        let harness = Harness::new().await;
        harness
            .fetcher
            .serve("https://example.com/intro.mp4", b"intro", Some("video/mp4"));
        let node = harness
            .insert(
                Node::new(harness.pipeline.id, "intro", "asset")
                    .with_config("media_type", "video")
                    .with_asset(json!({ "url": "https://example.com/intro.mp4" })),
            )
            .await;

        harness.run(&node).await.unwrap();

        let stored = harness.node(node.id).await;
        let output = stored.output().unwrap();
        assert!(output.key.ends_with(".mp4"));
        let object = harness
            .storage
            .get(&output.key, &harness.bucket())
            .await
            .unwrap();
        assert_eq!(object.bytes, b"intro".to_vec());
        assert_eq!(object.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_empty_payload_fails_node() {
        let harness = Harness::new().await;
        let node = harness.insert(asset(&harness, json!({}))).await;

        assert!(harness.run(&node).await.is_err());
        assert_eq!(harness.node(node.id).await.status(), NodeStatus::Failed);
    }
}
