use std::sync::Arc;

use {
    futures::future::{BoxFuture, FutureExt},
    relaybot_common::Message,
};

use crate::{
    acceptor::Acceptor, bot::Bot, invoke::invoke, processor::ProcessorHandle,
    registry::ProcessorRegistry,
};

/// Processors applied in sequence, forking on multiple outputs.
///
/// The first processor runs on the input. Each of its outputs continues
/// independently through the rest of the chain, so if every processor emits
/// two messages a three-step chain hands eight messages to the acceptor.
/// An empty chain hands the input over unchanged.
#[derive(Clone, Debug)]
pub struct ProcessorChain {
    processors: Arc<[ProcessorHandle]>,
}

impl ProcessorChain {
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

    /// Run `message` through the chain. Resolves when every path that
    /// started from it has either been accepted or ended.
    pub async fn call(&self, bot: &Arc<Bot>, message: Message, accept: Acceptor) {
        self.run_from(0, Arc::clone(bot), message, accept).await;
    }

    fn run_from(
        &self,
        index: usize,
        bot: Arc<Bot>,
        message: Message,
        accept: Acceptor,
    ) -> BoxFuture<'static, ()> {
        let chain = self.clone();
        async move {
            let Some(handle) = chain.processors.get(index) else {
                accept.accept(message).await;
                return;
            };

            let rest = chain.clone();
            let next_bot = Arc::clone(&bot);
            invoke(&bot, handle, message, move |output| {
                rest.run_from(index + 1, Arc::clone(&next_bot), output, accept.clone())
            })
            .await;
        }
        .boxed()
    }
}
