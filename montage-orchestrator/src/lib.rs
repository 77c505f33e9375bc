//! Montage Orchestrator
//!
//! Executes the nodes of AI video pipelines: validates them, checks readiness,
//! dispatches each to its executor and tracks every attempt under an
//! execution token, so late polls and callbacks from superseded attempts
//! are ignored.

pub mod api;
pub mod app;
pub mod callback;
pub mod config;
pub mod db;
pub mod executor;
pub mod lifecycle;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod storage;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
