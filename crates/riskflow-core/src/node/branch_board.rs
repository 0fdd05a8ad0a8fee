//! Per-run board of node outputs.
//!
//! The graph runner publishes every completed node's output here. JOIN waits
//! on it; DECISION_MERGE reads from it.

use std::time::Duration;

use dashmap::DashMap;
use riskflow_types::envelope::Envelope;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
pub struct BranchBoard {
    outputs: DashMap<String, Envelope>,
    notify: Notify,
}

impl BranchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's output and wake every waiter.
    pub fn publish(&self, node_id: impl Into<String>, output: Envelope) {
        self.outputs.insert(node_id.into(), output);
        self.notify.notify_waiters();
    }

    pub fn get(&self, node_id: &str) -> Option<Envelope> {
        self.outputs.get(node_id).map(|entry| entry.value().clone())
    }

    /// Ids from `ids` that have not been published yet, in the given order.
    pub fn missing(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter(|id| !self.outputs.contains_key(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Wait until every id in `ids` is published or `timeout` elapses.
    ///
    /// On success returns the outputs in `ids` order. On timeout returns the
    /// ids still missing.
    pub async fn wait_for(
        &self,
        ids: &[String],
        timeout: Duration,
    ) -> Result<Vec<(String, Envelope)>, Vec<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // register interest before checking, so a publish in between is not lost
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let missing = self.missing(ids);
            if missing.is_empty() {
                return Ok(self.collect(ids));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let missing = self.missing(ids);
                if missing.is_empty() {
                    return Ok(self.collect(ids));
                }
                return Err(missing);
            }
        }
    }

    fn collect(&self, ids: &[String]) -> Vec<(String, Envelope)> {
        ids.iter()
            .filter_map(|id| self.get(id).map(|out| (id.clone(), out)))
            .collect()
    }
}

impl std::fmt::Debug for BranchBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.outputs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        f.debug_struct("BranchBoard").field("published", &ids).finish()
    }
}
