use std::{
    fs,
    path::{Path, PathBuf},
};

use {
    serde::de::DeserializeOwned,
    serde_json::{Map, Value},
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::Settings,
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RELAYBOT_CONFIG";

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "relaybot.toml",
    "relaybot.yaml",
    "relaybot.yml",
    "relaybot.json",
];

const SUPPORTED_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Load [`Settings`] from the given path (any supported format).
pub fn load_settings(path: &Path) -> Result<Settings> {
    let raw = read(path)?;
    parse(&raw, path)
}

/// Load a config file as an untyped JSON value.
pub fn load_config_value(path: &Path) -> Result<Value> {
    let raw = read(path)?;
    parse(&raw, path)
}

/// Load every supported file in `dir` into one JSON object keyed by file stem.
///
/// `dir/weather.yml` ends up under `"weather"`. Files with other extensions
/// are skipped. Any file that fails to parse fails the whole load.
pub fn load_conf_directory(dir: &Path) -> Result<Value> {
    if !dir.is_dir() {
        return Err(Error::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_supported_extension(path))
        .collect();
    paths.sort();

    let mut config = Map::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "skipping config file with non-UTF-8 name");
            continue;
        };
        if config.contains_key(stem) {
            warn!(path = %path.display(), key = stem, "duplicate config key, keeping first file");
            continue;
        }
        let value = load_config_value(&path)?;
        debug!(path = %path.display(), key = stem, "loaded config file");
        config.insert(stem.to_string(), value);
    }
    Ok(Value::Object(config))
}

/// Find the config file to use.
///
/// Search order:
/// 1. `$RELAYBOT_CONFIG`
/// 2. `./relaybot.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/relaybot/relaybot.{toml,yaml,yml,json}` (user-global)
pub fn discover_config_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        warn!(path = %path.display(), "{CONFIG_ENV} points at a missing file");
        return Err(Error::NotFound);
    }

    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Ok(p);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "relaybot") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Ok(p);
            }
        }
    }

    Err(Error::NotFound)
}

/// Discover and load [`Settings`], falling back to defaults when no file exists.
///
/// A file that exists but cannot be read or parsed is an error.
pub fn discover_settings() -> Result<Settings> {
    match discover_config_file() {
        Ok(path) => {
            debug!(path = %path.display(), "loading settings");
            load_settings(&path)
        },
        Err(Error::NotFound) => {
            debug!("no config file found, using default settings");
            Ok(Settings::default())
        },
        Err(e) => Err(e),
    }
}

fn read(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(substitute_env(&raw))
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

fn parse<T: DeserializeOwned>(raw: &str, path: &Path) -> Result<T> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat {
            ext: ext.to_string(),
        }),
    }
}
