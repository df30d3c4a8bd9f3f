//! Configuration loading for relaybot instances.
//!
//! Two kinds of configuration exist:
//! - [`Settings`]: how the bot itself is wired (directories, command sigil,
//!   logging). Read from `relaybot.{toml,yaml,yml,json}`.
//! - free-form processor configuration: an immutable JSON value read from a
//!   single file or from every file in a configuration directory, consumed by
//!   processors through the bot.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all files.

pub mod builder;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    builder::ConfigBuilder,
    error::{Error, Result},
    loader::{
        CONFIG_ENV, discover_config_file, discover_settings, load_conf_directory,
        load_config_value, load_settings,
    },
    schema::{LogSettings, Settings, SettingsBuilder},
};
