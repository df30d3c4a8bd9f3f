use std::sync::Arc;

use relaybot_common::Message;

use crate::{
    acceptor::Acceptor, bot::Bot, chain::ProcessorChain, group::ProcessorGroup,
    registry::ProcessorRegistry,
};

pub const PREPROCESSOR: &str = "preprocessor";
pub const SERVICE: &str = "service";
pub const POSTPROCESSOR: &str = "postprocessor";
pub const SENDER: &str = "sender";

/// How a stage combines its processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Each processor feeds the next. See [`ProcessorChain`].
    Chain,
    /// Each processor sees the stage input. See [`ProcessorGroup`].
    Group,
}

/// The stages a bot gets when none are configured.
pub fn default_stages() -> Vec<(String, StageKind)> {
    vec![
        (PREPROCESSOR.to_string(), StageKind::Chain),
        (SERVICE.to_string(), StageKind::Group),
        (POSTPROCESSOR.to_string(), StageKind::Chain),
        (SENDER.to_string(), StageKind::Group),
    ]
}

/// A named step of the pipeline and the processors registered for it.
#[derive(Debug)]
pub struct Stage {
    kind: StageKind,
    registry: ProcessorRegistry,
}

impl Stage {
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            kind,
            registry: ProcessorRegistry::new(name),
        }
    }

    pub fn name(&self) -> &str {
        self.registry.stage()
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Run `message` through the processors registered right now.
    pub async fn call(&self, bot: &Arc<Bot>, message: Message, accept: Acceptor) {
        match self.kind {
            StageKind::Chain => {
                ProcessorChain::from_registry(&self.registry)
                    .call(bot, message, accept)
                    .await;
            },
            StageKind::Group => {
                ProcessorGroup::from_registry(&self.registry)
                    .call(bot, message, accept)
                    .await;
            },
        }
    }
}
