//! Core domain types
//!
//! These types represent the fundamental entities of a generation pipeline and
//! are shared between the orchestrator (persistence, execution) and clients.

pub mod execution;
pub mod executor;
pub mod node;
pub mod pipeline;
