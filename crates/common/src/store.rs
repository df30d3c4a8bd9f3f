use std::sync::Arc;

use crate::{Error, KeyValueAtom, Result};

/// Source of named key-value cells.
///
/// Cells are created lazily and the same `Arc` is returned for a key on every
/// call. Whether and when a cell reaches durable storage is up to the
/// provider: callers mutate the cell, then ask for a [`flush`](Self::flush).
pub trait StoreProvider: Send + Sync {
    /// Get (or lazily create) the cell for `key`.
    fn store(&self, key: &str) -> Result<Arc<KeyValueAtom>>;

    /// Persist the current snapshot of `key`. No-op for unknown keys.
    fn flush(&self, key: &str) -> Result<()>;

    /// Persist every cell handed out so far.
    fn flush_all(&self) -> Result<()>;
}

/// Store keys double as file names, so they must be a single plain path segment.
pub fn validate_store_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_store_key(key, "key is empty"));
    }
    if key == "." || key == ".." {
        return Err(Error::invalid_store_key(key, "key is a relative path"));
    }
    if key.contains(['/', '\\', '\0']) {
        return Err(Error::invalid_store_key(key, "key contains a path separator"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_keys() {
        assert!(validate_store_key("karma").is_ok());
        assert!(validate_store_key("karma.v2").is_ok());
    }

    #[test]
    fn rejects_paths() {
        for key in ["", "..", "a/b", "a\\b"] {
            assert!(validate_store_key(key).is_err(), "{key:?} should be rejected");
        }
    }
}
