//! Service Layer
//!
//! Business logic over the repository traits.

pub mod node;
pub mod pipeline;

pub use node::{NodeError, NodeService};
pub use pipeline::{PipelineError, PipelineService};
