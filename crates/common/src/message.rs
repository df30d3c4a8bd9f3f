//! Immutable chat message records.
//!
//! A [`Message`] is a shared, read-only JSON object. Processors never mutate a
//! message they receive; they derive new records with [`Message::with`] and
//! friends, which leaves every other holder of the original untouched. This is
//! what makes it safe to hand the same message to many concurrent processors.

use std::{fmt, sync::Arc};

use {
    serde::{Deserialize, Deserializer, Serialize, Serializer},
    serde_json::{Map, Value},
};

use crate::{Error, Result};

/// Field naming the chat service a message came from (or is addressed to).
pub const SERVICE: &str = "service";
/// Field naming the group/conversation within the service.
pub const GROUP: &str = "group";
/// Field holding the message body.
pub const TEXT: &str = "text";

/// An immutable key-value message record.
#[derive(Clone, Default, PartialEq)]
pub struct Message(Arc<Map<String, Value>>);

impl Message {
    /// An empty message.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Arc::new(map))
    }

    /// Build a reply addressed to the service and group of `original`.
    pub fn reply_to(original: &Message, text: impl Into<String>) -> Self {
        let mut map = Map::new();
        for field in [SERVICE, GROUP] {
            if let Some(value) = original.get(field) {
                map.insert(field.to_string(), value.clone());
            }
        }
        map.insert(TEXT.to_string(), Value::String(text.into()));
        Self::from_map(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn text(&self) -> Option<&str> {
        self.get_str(TEXT)
    }

    pub fn service(&self) -> Option<&str> {
        self.get_str(SERVICE)
    }

    pub fn group(&self) -> Option<&str> {
        self.get_str(GROUP)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Return a new message with `key` set to `value`.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = (*self.0).clone();
        map.insert(key.into(), value.into());
        Self::from_map(map)
    }

    /// Return a new message without `key`.
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        if !self.contains_key(key) {
            return self.clone();
        }
        let mut map = (*self.0).clone();
        map.remove(key);
        Self::from_map(map)
    }

    /// True when both handles share the same underlying record.
    pub fn ptr_eq(&self, other: &Message) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Check the identity fields every message entering a pipeline must carry.
    pub fn validate_identity(&self) -> Result<()> {
        for field in [SERVICE, GROUP, TEXT] {
            if self.get_str(field).is_none() {
                return Err(Error::MissingField { field });
            }
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        Value::Object((*self.0).clone())
    }
}

impl TryFrom<Value> for Message {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::Null => Err(Error::NotAnObject { kind: "null" }),
            Value::Bool(_) => Err(Error::NotAnObject { kind: "boolean" }),
            Value::Number(_) => Err(Error::NotAnObject { kind: "number" }),
            Value::String(_) => Err(Error::NotAnObject { kind: "string" }),
            Value::Array(_) => Err(Error::NotAnObject { kind: "array" }),
        }
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        message.to_value()
    }
}

impl std::str::FromStr for Message {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Self::try_from(value)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({})", Value::Object((*self.0).clone()))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&*self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("{..}"),
        }
    }
}
