//! Bot settings schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a bot instance is wired: where its configuration and stores live,
/// which sigil introduces commands, and how it logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory whose files make up the processor configuration, one
    /// top-level key per file.
    pub conf_directory: Option<PathBuf>,
    /// Single processor configuration file, used when no directory is set.
    pub config_file: Option<PathBuf>,
    /// Directory for durable key-value stores.
    pub store_directory: Option<PathBuf>,
    /// Character that introduces a command, e.g. `#weather`.
    pub command_sigil: char,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conf_directory: None,
            config_file: None,
            store_directory: None,
            command_sigil: '#',
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON log lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn conf_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.conf_directory = Some(dir.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.config_file = Some(path.into());
        self
    }

    pub fn store_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.store_directory = Some(dir.into());
        self
    }

    pub fn command_sigil(mut self, sigil: char) -> Self {
        self.settings.command_sigil = sigil;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.settings.log.level = level.into();
        self
    }

    pub fn json_logs(mut self, json: bool) -> Self {
        self.settings.log.json = json;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}
