//! Key-value store providers.
//!
//! [`FileStore`] keeps one JSON file per key under a store directory and only
//! writes when asked to flush. [`MemoryStore`] has the same contract without
//! durability.

pub mod file;
pub mod memory;

pub use {
    file::FileStore,
    memory::MemoryStore,
    relaybot_common::{Error, KeyValueAtom, Result, StoreProvider},
};
