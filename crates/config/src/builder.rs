use serde_json::{Map, Value};

/// Build processor configuration in code instead of reading it from files.
///
/// ```
/// use relaybot_config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .set("key", "value")
///     .group("group", |g| g.set("key", "value"))
///     .build();
///
/// assert_eq!(config["group"]["key"], "value");
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    values: Map<String, Value>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a value to a key. Later assignments to the same key win.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Build a nested object under `key`.
    pub fn group(mut self, key: impl Into<String>, f: impl FnOnce(Self) -> Self) -> Self {
        let nested = f(Self::new()).build();
        self.values.insert(key.into(), nested);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.values)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn builds_nested_objects() {
        let config = ConfigBuilder::new()
            .set("key", "value")
            .group("group", |g| g.set("key", "value").set("n", 2))
            .build();
        assert_eq!(
            config,
            json!({"key": "value", "group": {"key": "value", "n": 2}})
        );
    }

    #[test]
    fn empty_builder_is_an_empty_object() {
        assert_eq!(ConfigBuilder::new().build(), json!({}));
    }
}
