//! Callback compute adapter
//!
//! Invokes the compute service once and returns. The node stays in progress
//! until the service posts a callback carrying the attempt's token.

use montage_client::ComputeInvoker;
use montage_core::domain::execution::ExecutionToken;
use montage_core::domain::executor::ExecutorType;
use montage_core::domain::node::{Node, NodeMetadata};
use montage_core::dto::provider::{ComputeInvocation, OutputLocation};
use montage_core::schema::NodeSchema;

use super::{ExecutorContext, ExecutorError, OUTPUT_KEY, inputs};

pub async fn invoke(
    ctx: &ExecutorContext,
    invoker: &dyn ComputeInvoker,
    executor_type: ExecutorType,
    schema: &NodeSchema,
    node: Node,
    token: ExecutionToken,
) -> Result<(), ExecutorError> {
    let pipeline = ctx.attempt_pipeline(&node, token).await?;
    let bucket = ctx.bucket(&pipeline).to_string();
    let output_key = ctx.output_key(&pipeline, &node, executor_type.default_media_type());

    let recorded = ctx
        .lifecycle
        .update(
            node.id,
            NodeMetadata::default().with_extra(OUTPUT_KEY, output_key.clone()),
            token,
        )
        .await?;
    if !recorded {
        tracing::debug!("Attempt for node {} superseded before invocation", node.id);
        return Ok(());
    }

    let input_refs: Vec<String> = match inputs::resolve(ctx, &node, schema).await {
        Ok(slots) => slots
            .into_iter()
            .flat_map(|slot| slot.outputs.into_iter().map(|output| output.key))
            .collect(),
        Err(e) => {
            ctx.lifecycle
                .fail(node.id, format!("Input error: {e}"), token)
                .await?;
            return Err(e);
        }
    };

    let invocation = ComputeInvocation {
        input_refs,
        output_location: OutputLocation {
            bucket,
            key: output_key,
        },
        callback_url: ctx.settings.callback_url.clone(),
        node_id: node.id,
        executor_type,
        token,
        parameters: node.config.clone(),
    };

    if let Err(e) = invoker.invoke(&invocation).await {
        ctx.lifecycle
            .fail(node.id, format!("Invocation error: {e}"), token)
            .await?;
        return Err(e.into());
    }

    tracing::info!(
        "Invoked {} for node {} ({} inputs)",
        executor_type,
        node.id,
        invocation.input_refs.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use montage_client::ClientError;
    use montage_core::domain::node::{InputRef, NodeStatus};

    #[tokio::test]
    async fn test_merge_passes_segments_in_array_order() {
        let harness = Harness::new().await;
        let a = harness.completed("a", "asset", "clips/a.mp4").await;
        let b = harness.completed("b", "asset", "clips/b.mp4").await;
        let c = harness.completed("c", "asset", "clips/c.mp4").await;
        let node = harness
            .insert(
                Node::new(harness.pipeline.id, "merged", "merge-videos")
                    .with_config("transition", "crossfade")
                    .with_input("segments", InputRef::Multiple(vec![c.id, a.id, b.id])),
            )
            .await;

        harness.run(&node).await.unwrap();

        let invocations = harness.compute.invocations();
        assert_eq!(invocations.len(), 1);
        let invocation = &invocations[0];
        assert_eq!(
            invocation.input_refs,
            vec!["clips/c.mp4", "clips/a.mp4", "clips/b.mp4"]
        );
        assert_eq!(invocation.executor_type, ExecutorType::VideoMerge);
        assert_eq!(invocation.callback_url, harness.context().settings.callback_url);
        assert_eq!(invocation.parameters["transition"], "crossfade");

        let stored = harness.node(node.id).await;
        assert_eq!(stored.status(), NodeStatus::InProgress);
        assert_eq!(stored.execution.token(), Some(invocation.token));
        assert_eq!(
            stored.metadata.extra_str(OUTPUT_KEY),
            Some(invocation.output_location.key.as_str())
        );
    }

    #[tokio::test]
    async fn test_compose_orders_inputs_by_slot() {
        let harness = Harness::new().await;
        let video = harness.completed("v", "asset", "v.mp4").await;
        let audio = harness.completed("a", "asset", "a.mp3").await;
        let overlay = harness.completed("o", "asset", "o.png").await;
        let node = harness
            .insert(
                Node::new(harness.pipeline.id, "final", "compose-video")
                    .with_config("resolution", "1080p")
                    .with_input("overlays", InputRef::Multiple(vec![overlay.id]))
                    .with_input("audio", InputRef::Single(audio.id))
                    .with_input("video", InputRef::Single(video.id)),
            )
            .await;

        harness.run(&node).await.unwrap();

        assert_eq!(
            harness.compute.invocations()[0].input_refs,
            vec!["v.mp4", "a.mp3", "o.png"]
        );
    }

    #[tokio::test]
    async fn test_missing_input_output_fails_node() {
        let harness = Harness::new().await;
        let pending = harness
            .insert(Node::new(harness.pipeline.id, "voice", "generate-voiceover"))
            .await;
        let node = harness
            .insert(
                Node::new(harness.pipeline.id, "mix", "mix-audio")
                    .with_input("tracks", InputRef::Multiple(vec![pending.id])),
            )
            .await;

        let err = harness.run(&node).await.unwrap_err();
        assert!(matches!(err, ExecutorError::InputUnavailable(id) if id == pending.id));
        assert!(harness.compute.invocations().is_empty());

        let stored = harness.node(node.id).await;
        assert_eq!(stored.status(), NodeStatus::Failed);
        assert!(stored.execution.error().unwrap().starts_with("Input error:"));
    }

    #[tokio::test]
    async fn test_invocation_failure_fails_node() {
        let harness = Harness::new().await;
        harness
            .compute
            .fail_next(ClientError::api_error(503, "compute busy"));
        let node = harness
            .insert(
                Node::new(harness.pipeline.id, "code", "render-code")
                    .with_config("code", "print(1)")
                    .with_config("language", "python"),
            )
            .await;

        assert!(harness.run(&node).await.is_err());
        let stored = harness.node(node.id).await;
        assert_eq!(stored.status(), NodeStatus::Failed);
        assert!(stored.execution.error().unwrap().starts_with("Invocation error:"));
    }
}
