//! Execution analytics over historical workflow and node records.

pub mod aggregate;
pub mod service;

pub use aggregate::{
    duration_distribution, execution_trend, failure_categories, node_performance, p95,
};
pub use service::{AnalyticsError, AnalyticsService, ExecutionHistorySource, InMemoryHistory};
