use std::sync::Arc;

use {relaybot_common::Message, tokio::task::JoinSet, tracing::warn};

use crate::{
    acceptor::Acceptor, bot::Bot, invoke::invoke, processor::ProcessorHandle,
    registry::ProcessorRegistry,
};

/// Processors that each see the same input, concurrently.
///
/// Every output of every member goes straight to the acceptor. One member
/// failing does not affect the others.
#[derive(Clone, Debug)]
pub struct ProcessorGroup {
    processors: Arc<[ProcessorHandle]>,
}

impl ProcessorGroup {
    pub fn new(processors: impl Into<Vec<ProcessorHandle>>) -> Self {
        Self {
            processors: processors.into().into(),
        }
    }

    pub fn from_registry(registry: &ProcessorRegistry) -> Self {
        Self::new(registry.list())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every member on `message`. Resolves when all members and
    /// everything they handed to the acceptor have finished.
    pub async fn call(&self, bot: &Arc<Bot>, message: Message, accept: Acceptor) {
        let mut members = JoinSet::new();
        for handle in self.processors.iter().cloned() {
            let bot = Arc::clone(bot);
            let message = message.clone();
            let accept = accept.clone();
            members.spawn(async move {
                invoke(&bot, &handle, message, |output| accept.accept(output)).await;
            });
        }

        while let Some(result) = members.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "group member aborted");
            }
        }
    }
}
