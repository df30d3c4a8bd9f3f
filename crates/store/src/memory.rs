use std::sync::Arc;

use {
    dashmap::DashMap,
    relaybot_common::{KeyValueAtom, Result, StoreProvider, validate_store_key},
};

/// Non-durable store provider. Flushing is a no-op.
#[derive(Default)]
pub struct MemoryStore {
    cells: DashMap<String, Arc<KeyValueAtom>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl StoreProvider for MemoryStore {
    fn store(&self, key: &str) -> Result<Arc<KeyValueAtom>> {
        validate_store_key(key)?;
        let cell = self.cells.entry(key.to_string()).or_default();
        Ok(Arc::clone(cell.value()))
    }

    fn flush(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn flush_all(&self) -> Result<()> {
        Ok(())
    }
}
