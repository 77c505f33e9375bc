//! Input resolution
//!
//! Turns a node's input references into the outputs of the nodes they point
//! at, in schema slot order and, within a multiple slot, in array order.

use montage_core::domain::execution::OutputDescriptor;
use montage_core::domain::node::Node;
use montage_core::schema::{NodeSchema, SlotKind};
use std::collections::HashMap;

use super::{ExecutorContext, ExecutorError};

pub(crate) struct ResolvedSlot {
    pub name: &'static str,
    pub kind: SlotKind,
    pub outputs: Vec<OutputDescriptor>,
}

pub(crate) async fn resolve(
    ctx: &ExecutorContext,
    node: &Node,
    schema: &NodeSchema,
) -> Result<Vec<ResolvedSlot>, ExecutorError> {
    let ids = node.referenced_ids();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let by_id: HashMap<_, _> = ctx
        .repo
        .find_many(node.pipeline_id, &ids)
        .await?
        .into_iter()
        .map(|n| (n.id, n))
        .collect();

    let mut slots = Vec::new();
    for spec in &schema.inputs {
        let Some(input) = node.inputs.get(spec.name) else {
            continue;
        };

        let mut outputs = Vec::with_capacity(input.ids().len());
        for id in input.ids() {
            let output = by_id
                .get(id)
                .and_then(Node::output)
                .ok_or(ExecutorError::InputUnavailable(*id))?;
            outputs.push(output.clone());
        }

        slots.push(ResolvedSlot {
            name: spec.name,
            kind: spec.kind,
            outputs,
        });
    }
    Ok(slots)
}
