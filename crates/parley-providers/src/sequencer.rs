use parley_protocol::Node;
use tracing::{info, warn};

use crate::{should_advance, ChatRequest, NodeExecutor, ProviderError};

/// A successful sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Position in the plan of the node that answered.
    pub node_index: usize,
    pub node_name: String,
    /// Nodes tried, including the one that answered.
    pub attempts: usize,
}

/// Walks an execution plan, trying each node once until one answers.
pub struct Sequencer<'a> {
    executor: &'a dyn NodeExecutor,
}

impl<'a> Sequencer<'a> {
    pub fn new(executor: &'a dyn NodeExecutor) -> Self {
        Self { executor }
    }

    pub async fn run(&self, plan: &[Node], request: &ChatRequest) -> Result<Completion, ProviderError> {
        for (index, node) in plan.iter().enumerate() {
            info!(node = %node.name, attempt = index + 1, of = plan.len(), "Attempting node");

            match self.executor.execute(node, request).await {
                Ok(text) => {
                    return Ok(Completion {
                        text,
                        node_index: index,
                        node_name: node.name.clone(),
                        attempts: index + 1,
                    });
                }
                Err(e) if should_advance(node, &e) => {
                    warn!(node = %node.name, error = %e, "Node failed, trying next");
                }
                Err(e) => {
                    warn!(node = %node.name, error = %e, "Node failed with non-retryable error");
                    return Err(e);
                }
            }
        }

        Err(ProviderError::AllNodesFailed)
    }
}
