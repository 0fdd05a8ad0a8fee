//! DATA_FETCH executor: one call to a [`DataFetcher`].

use std::sync::Arc;

use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::collaborator::{DataFetcher, FetchRequest};
use crate::value::resolve_references;

fn default_output_key() -> String {
    "data".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataFetchConfig {
    source: String,
    /// May contain `$.path` references into the input envelope.
    #[serde(default)]
    params: Value,
    #[serde(default = "default_output_key")]
    output_key: String,
}

pub struct DataFetchExecutor<F> {
    fetcher: Arc<F>,
}

impl<F: DataFetcher> DataFetchExecutor<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }
}

impl<F: DataFetcher> NodeExecutor for DataFetchExecutor<F> {
    fn name(&self) -> &'static str {
        "data_fetch"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::DataFetch
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: DataFetchConfig = ctx.typed_config()?;
        if config.source.trim().is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "source must not be empty"));
        }

        let request = FetchRequest {
            source: config.source.clone(),
            params: resolve_references(&config.params, ctx.input.as_map()),
            execution_id: ctx.execution_id.clone(),
        };

        let mut output = ctx.input.clone();
        let mut meta = Map::new();
        meta.insert("source".into(), json!(config.source));
        meta.insert("outputKey".into(), json!(config.output_key));

        match self.fetcher.fetch(&request).await {
            Ok(data) => {
                output.insert(config.output_key, data);
                meta.insert("ok".into(), json!(true));
                output.merge_meta("dataFetch", meta);
                Ok(NodeExecutionResult::success(output))
            }
            Err(e) => {
                tracing::warn!(
                    node_id = ctx.node.id.as_str(),
                    source = request.source.as_str(),
                    error = %e,
                    "data fetch failed"
                );
                meta.insert("ok".into(), json!(false));
                meta.insert("error".into(), json!(e.to_string()));
                output.merge_meta("dataFetch", meta);
                Ok(NodeExecutionResult::failed(
                    format!("data fetch from '{}' failed: {e}", request.source),
                    output,
                ))
            }
        }
    }
}
