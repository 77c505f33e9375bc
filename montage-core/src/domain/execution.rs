//! Execution state and lifecycle transitions
//!
//! Every execution attempt is tagged with an [`ExecutionToken`] minted when it
//! starts. Later writes for that attempt must present the same token. A node
//! only starts again once it is pending or failed; the new token silently
//! invalidates whatever the previous attempt still has in flight.
//!
//! [`Transition::apply`] holds the rules. It is pure so each repository can run
//! it inside its own critical section (row lock, per-node mutex) and persist the
//! result only when it reports [`TransitionOutcome::Applied`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::node::{NodeMetadata, NodeStatus};

/// Identifies one execution attempt of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionToken(Uuid);

impl ExecutionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ExecutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ExecutionToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Describes a finished artifact in durable storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub key: String,
    pub media_type: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// Where a node is in its execution lifecycle
///
/// Only one consistent shape exists at a time: an output can only be present
/// on a completed node, an error only on a failed one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    NotStarted,
    Running {
        token: ExecutionToken,
        started_at: DateTime<Utc>,
    },
    Completed {
        token: Option<ExecutionToken>,
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
        output: OutputDescriptor,
    },
    Failed {
        token: Option<ExecutionToken>,
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
        error: String,
    },
}

impl ExecutionState {
    pub fn status(&self) -> NodeStatus {
        match self {
            ExecutionState::NotStarted => NodeStatus::Pending,
            ExecutionState::Running { .. } => NodeStatus::InProgress,
            ExecutionState::Completed { .. } => NodeStatus::Completed,
            ExecutionState::Failed { .. } => NodeStatus::Failed,
        }
    }

    /// The token of the current (or most recent) attempt
    pub fn token(&self) -> Option<ExecutionToken> {
        match self {
            ExecutionState::NotStarted => None,
            ExecutionState::Running { token, .. } => Some(*token),
            ExecutionState::Completed { token, .. } | ExecutionState::Failed { token, .. } => {
                *token
            }
        }
    }

    pub fn output(&self) -> Option<&OutputDescriptor> {
        match self {
            ExecutionState::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExecutionState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ExecutionState::NotStarted => None,
            ExecutionState::Running { started_at, .. } => Some(*started_at),
            ExecutionState::Completed { started_at, .. }
            | ExecutionState::Failed { started_at, .. } => *started_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ExecutionState::Completed { completed_at, .. }
            | ExecutionState::Failed { completed_at, .. } => Some(*completed_at),
            _ => None,
        }
    }
}

/// Which attempt a write claims to belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenGuard {
    /// Accept only if this is the node's current token
    Exact(ExecutionToken),
    /// Accept regardless of token (tokenless callbacks)
    Any,
}

impl TokenGuard {
    fn admits(&self, current: Option<ExecutionToken>) -> bool {
        match self {
            TokenGuard::Exact(token) => current == Some(*token),
            TokenGuard::Any => true,
        }
    }
}

impl From<ExecutionToken> for TokenGuard {
    fn from(token: ExecutionToken) -> Self {
        TokenGuard::Exact(token)
    }
}

impl From<Option<ExecutionToken>> for TokenGuard {
    fn from(token: Option<ExecutionToken>) -> Self {
        token.map_or(TokenGuard::Any, TokenGuard::Exact)
    }
}

/// A write against a node's lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start {
        token: ExecutionToken,
        extra: NodeMetadata,
    },
    Update {
        guard: TokenGuard,
        patch: NodeMetadata,
    },
    Succeed {
        guard: TokenGuard,
        output: OutputDescriptor,
    },
    Fail {
        guard: TokenGuard,
        error: String,
    },
}

/// What happened when a [`Transition`] was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The write belongs to a superseded attempt
    TokenMismatch,
    /// The node already reached `completed` or `failed`
    AlreadyTerminal,
    /// No attempt is running, or none was ever started
    NotRunning,
    /// Start only applies to pending or failed nodes
    NotStartable,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start { .. } => "start",
            Transition::Update { .. } => "update",
            Transition::Succeed { .. } => "succeed",
            Transition::Fail { .. } => "fail",
        }
    }

    /// Apply this transition to a node's state in place
    ///
    /// Nothing is modified unless the outcome is [`TransitionOutcome::Applied`].
    pub fn apply(
        self,
        execution: &mut ExecutionState,
        metadata: &mut NodeMetadata,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let current = execution.token();

        match self {
            Transition::Start { token, extra } => {
                if !execution.status().is_executable() {
                    return TransitionOutcome::NotStartable;
                }
                *execution = ExecutionState::Running {
                    token,
                    started_at: now,
                };
                // Job id, cost and output location belong to one attempt
                *metadata = extra;
                TransitionOutcome::Applied
            }
            Transition::Update { guard, patch } => {
                if !matches!(execution, ExecutionState::Running { .. }) {
                    return TransitionOutcome::NotRunning;
                }
                if !guard.admits(current) {
                    return TransitionOutcome::TokenMismatch;
                }
                metadata.merge(patch);
                TransitionOutcome::Applied
            }
            Transition::Succeed { guard, output } => {
                if matches!(execution, ExecutionState::NotStarted) {
                    return TransitionOutcome::NotRunning;
                }
                if execution.status().is_terminal() {
                    return TransitionOutcome::AlreadyTerminal;
                }
                if !guard.admits(current) {
                    return TransitionOutcome::TokenMismatch;
                }
                *execution = ExecutionState::Completed {
                    token: current,
                    started_at: execution.started_at(),
                    completed_at: now,
                    output,
                };
                TransitionOutcome::Applied
            }
            Transition::Fail { guard, error } => {
                if matches!(execution, ExecutionState::NotStarted) {
                    return TransitionOutcome::NotRunning;
                }
                if execution.status().is_terminal() {
                    return TransitionOutcome::AlreadyTerminal;
                }
                if !guard.admits(current) {
                    return TransitionOutcome::TokenMismatch;
                }
                *execution = ExecutionState::Failed {
                    token: current,
                    started_at: execution.started_at(),
                    completed_at: now,
                    error,
                };
                TransitionOutcome::Applied
            }
        }
    }
}
