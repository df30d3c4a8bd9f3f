//! Shared types, error definitions, and utilities used across all relaybot crates.

pub mod atom;
pub mod error;
pub mod message;
pub mod store;

pub use {
    atom::KeyValueAtom,
    error::{Error, FromMessage, Result},
    message::Message,
    store::{StoreProvider, validate_store_key},
};
