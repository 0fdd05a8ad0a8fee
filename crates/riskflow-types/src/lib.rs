//! Shared domain types for riskflow.
//!
//! Workflow graph and node definitions, the execution envelope, the risk
//! vocabulary, execution history records, analytics report shapes and the
//! engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod analytics;
pub mod config;
pub mod envelope;
pub mod error;
pub mod risk;
pub mod workflow;
