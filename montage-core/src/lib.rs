//! Montage Core
//!
//! Core types and rules for the Montage video generation pipeline.
//!
//! This crate contains:
//! - Domain types: Pipelines, nodes, execution state and tokens
//! - Schemas: Per node type descriptors of input slots and config fields
//! - Validation and readiness: Pure checks run before a node may execute
//! - DTOs: Wire shapes shared by the orchestrator and its clients
//!
//! Nothing in here performs I/O. Persistence and provider calls live in
//! the orchestrator and client crates.

pub mod domain;
pub mod dto;
pub mod readiness;
pub mod schema;
pub mod validation;
