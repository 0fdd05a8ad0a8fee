//! BoxNodeExecutor -- object-safe dynamic dispatch wrapper for NodeExecutor.
//!
//! 1. `NodeExecutorDyn` is an object-safe mirror of `NodeExecutor` with a boxed future
//! 2. Blanket impl of `NodeExecutorDyn` for every `T: NodeExecutor`
//! 3. `BoxNodeExecutor` owns a `Box<dyn NodeExecutorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use riskflow_types::workflow::WorkflowNode;

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};

/// Object-safe version of [`NodeExecutor`].
pub trait NodeExecutorDyn: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, node: &WorkflowNode) -> bool;

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a NodeExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<NodeExecutionResult, NodeError>> + Send + 'a>>;
}

impl<T: NodeExecutor> NodeExecutorDyn for T {
    fn name(&self) -> &'static str {
        NodeExecutor::name(self)
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        NodeExecutor::supports(self, node)
    }

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a NodeExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<NodeExecutionResult, NodeError>> + Send + 'a>> {
        Box::pin(self.execute(ctx))
    }
}

/// Type-erased node executor, so heterogeneous executors share one registry.
pub struct BoxNodeExecutor {
    inner: Box<dyn NodeExecutorDyn>,
}

impl BoxNodeExecutor {
    pub fn new<T: NodeExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Box::new(executor),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn supports(&self, node: &WorkflowNode) -> bool {
        self.inner.supports(node)
    }

    pub async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        self.inner.execute_boxed(ctx).await
    }
}

impl std::fmt::Debug for BoxNodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNodeExecutor")
            .field("name", &self.name())
            .finish()
    }
}
