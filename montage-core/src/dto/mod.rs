//! Data Transfer Objects
//!
//! Wire shapes exchanged with providers, external compute, the callback
//! endpoint and API consumers. Domain types stay in [`crate::domain`]; these
//! are what goes over the network.

pub mod callback;
pub mod node;
pub mod pipeline;
pub mod provider;
