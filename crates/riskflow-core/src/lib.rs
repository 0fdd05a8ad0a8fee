//! Node execution engine and execution analytics for riskflow.
//!
//! Collaborators (agents, rule packs, data sources, sub-flows, approvals,
//! execution history) are traits defined here and implemented outside the
//! engine. This crate performs no I/O of its own.

pub mod analytics;
pub mod collaborator;
pub mod engine;
pub mod node;
pub mod risk;
pub mod value;

#[cfg(test)]
mod testing;
