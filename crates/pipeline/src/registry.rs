use std::{collections::HashSet, sync::RwLock};

use tracing::{debug, info};

use crate::processor::{ProcessorHandle, ProcessorId, Task};

#[derive(Default)]
struct Entries {
    order: Vec<ProcessorHandle>,
    ids: HashSet<ProcessorId>,
}

/// Processors registered for one stage, in registration order.
///
/// Registering a processor that is already present is ignored, so a plugin
/// that registers itself twice still runs once per message. Registration is
/// meant to happen during setup. Traversals that are already running keep
/// the list they started with.
#[derive(Default)]
pub struct ProcessorRegistry {
    stage: String,
    entries: RwLock<Entries>,
}

impl ProcessorRegistry {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            entries: RwLock::default(),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Add a processor. Returns `false` if it was already registered.
    pub fn register(&self, handle: impl Into<ProcessorHandle>) -> bool {
        let handle = handle.into();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.ids.insert(handle.id()) {
            debug!(stage = %self.stage, processor = handle.name(), "processor already registered");
            return false;
        }
        info!(stage = %self.stage, processor = handle.name(), "processor registered");
        entries.order.push(handle);
        true
    }

    pub fn register_task<T: Task>(&self) -> bool {
        self.register(ProcessorHandle::task::<T>())
    }

    pub fn contains(&self, handle: &ProcessorHandle) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .ids
            .contains(&handle.id())
    }

    /// Snapshot of the registered processors.
    pub fn list(&self) -> Vec<ProcessorHandle> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .order
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.list().iter().map(|h| h.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("stage", &self.stage)
            .field("processors", &self.names())
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{bot::Bot, outcome::Outcome, processor::processor_fn},
        async_trait::async_trait,
        relaybot_common::Message,
        std::sync::Arc,
    };

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        fn new(_bot: Arc<Bot>) -> Self {
            Noop
        }

        async fn process(&self, message: Message) -> Outcome {
            message.into()
        }
    }

    #[test]
    fn deduplicates_and_keeps_order() {
        let registry = ProcessorRegistry::new("preprocessor");
        let first = processor_fn("first", |_bot, m, _emit| async move { Outcome::forward(m) });
        let second = processor_fn("second", |_bot, m, _emit| async move { Outcome::forward(m) });

        assert!(registry.register(first.clone()));
        assert!(registry.register(second.clone()));
        assert!(!registry.register(first.clone()));
        assert!(registry.register_task::<Noop>());
        assert!(!registry.register_task::<Noop>());

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.list(), vec![
            first,
            second,
            ProcessorHandle::task::<Noop>()
        ]);
        assert!(registry.contains(&ProcessorHandle::task::<Noop>()));
    }

    #[test]
    fn list_is_a_snapshot() {
        let registry = ProcessorRegistry::new("sender");
        let snapshot = registry.list();
        registry.register(processor_fn("late", |_bot, m, _emit| async move { Outcome::forward(m) }));
        assert!(snapshot.is_empty());
        assert_eq!(registry.names(), vec!["late".to_string()]);
    }
}
