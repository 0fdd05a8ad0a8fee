use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by external collaborators (agent invocation, rule-pack
/// lookup, data sources, sub-flow invocation, approvals, history stores).
///
/// Node executors never swallow these: they surface as FAILED node results
/// carrying this error's display string.
///
/// Serializes externally tagged in camelCase (`{"timeout": 250}`) so that
/// fixture files can describe failures.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    Invalid(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),
}
