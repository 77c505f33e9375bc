//! Readiness checks
//!
//! A node may execute only when its own status allows it, its last validation
//! passed and every node it references has completed. [`check_readiness`]
//! reports all failing conditions at once.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::domain::node::{Node, NodeStatus};

/// One reason a node cannot execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessFailure {
    BadStatus(NodeStatus),
    Invalid(BTreeMap<String, String>),
    /// Referenced nodes that are not completed, with their status if they
    /// exist at all
    UnsatisfiedInputs(Vec<(Uuid, Option<NodeStatus>)>),
}

impl fmt::Display for ReadinessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessFailure::BadStatus(status) => {
                write!(f, "status is {status}, expected pending or failed")
            }
            ReadinessFailure::Invalid(errors) => {
                let listed: Vec<String> = errors
                    .iter()
                    .map(|(field, message)| format!("{field}: {message}"))
                    .collect();
                write!(f, "node is invalid ({})", listed.join("; "))
            }
            ReadinessFailure::UnsatisfiedInputs(inputs) => {
                let listed: Vec<String> = inputs
                    .iter()
                    .map(|(id, status)| match status {
                        Some(status) => format!("{id} is {status}"),
                        None => format!("{id} does not exist"),
                    })
                    .collect();
                write!(f, "inputs not completed ({})", listed.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Node {node_id} is not ready: {}", join_failures(.failures))]
pub struct NotReady {
    pub node_id: Uuid,
    pub failures: Vec<ReadinessFailure>,
}

fn join_failures(failures: &[ReadinessFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check whether `node` may execute
///
/// `inputs` maps each referenced node id to its current status; ids absent
/// from the map are treated as missing.
pub fn check_readiness(node: &Node, inputs: &HashMap<Uuid, NodeStatus>) -> Result<(), NotReady> {
    let mut failures = Vec::new();

    let status = node.status();
    if !status.is_executable() {
        failures.push(ReadinessFailure::BadStatus(status));
    }

    if !node.is_valid {
        failures.push(ReadinessFailure::Invalid(node.validation_errors.clone()));
    }

    let unsatisfied: Vec<(Uuid, Option<NodeStatus>)> = node
        .referenced_ids()
        .into_iter()
        .filter_map(|id| match inputs.get(&id) {
            Some(NodeStatus::Completed) => None,
            other => Some((id, other.copied())),
        })
        .collect();
    if !unsatisfied.is_empty() {
        failures.push(ReadinessFailure::UnsatisfiedInputs(unsatisfied));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(NotReady {
            node_id: node.id,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::{ExecutionState, ExecutionToken};
    use crate::domain::node::InputRef;

    fn valid(node: Node) -> Node {
        Node {
            is_valid: true,
            ..node
        }
    }

    #[test]
    fn test_pending_valid_node_without_inputs_is_ready() {
        let node = valid(Node::new(Uuid::new_v4(), "logo", "asset"));
        assert!(check_readiness(&node, &HashMap::new()).is_ok());
    }

    #[test]
    fn test_failed_node_may_retry() {
        let mut node = valid(Node::new(Uuid::new_v4(), "logo", "asset"));
        node.execution = ExecutionState::Failed {
            token: None,
            started_at: None,
            completed_at: chrono::Utc::now(),
            error: "Polling timeout after 60 attempts".to_string(),
        };
        assert!(check_readiness(&node, &HashMap::new()).is_ok());
    }

    #[test]
    fn test_running_node_is_not_ready() {
        let mut node = valid(Node::new(Uuid::new_v4(), "logo", "asset"));
        node.execution = ExecutionState::Running {
            token: ExecutionToken::generate(),
            started_at: chrono::Utc::now(),
        };

        let err = check_readiness(&node, &HashMap::new()).unwrap_err();
        assert_eq!(
            err.failures,
            vec![ReadinessFailure::BadStatus(NodeStatus::InProgress)]
        );
    }

    #[test]
    fn test_every_failing_condition_is_reported() {
        let done = Uuid::new_v4();
        let busy = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let mut node = Node::new(Uuid::new_v4(), "merged", "merge-videos")
            .with_input("segments", InputRef::Multiple(vec![done, busy, gone]));
        node.validation_errors
            .insert("segments".to_string(), "segments references missing node(s)".to_string());

        let statuses = HashMap::from([
            (done, NodeStatus::Completed),
            (busy, NodeStatus::InProgress),
        ]);

        let err = check_readiness(&node, &statuses).unwrap_err();
        assert_eq!(err.failures.len(), 2);
        assert_eq!(
            err.failures[1],
            ReadinessFailure::UnsatisfiedInputs(vec![
                (busy, Some(NodeStatus::InProgress)),
                (gone, None),
            ])
        );

        let message = err.to_string();
        assert!(message.contains("node is invalid"));
        assert!(message.contains(&format!("{busy} is in_progress")));
        assert!(message.contains(&format!("{gone} does not exist")));
    }
}
