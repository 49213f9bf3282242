//! Configuration
//!
//! JSON settings loaded once at startup. Missing file = built-in defaults.

use crate::hotkey::{Hotkey, HotkeyError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "runtime_nudge.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be {expected}, got {value}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("no aliases configured")]
    NoAliases,
    #[error("alias '{0}' configured more than once")]
    DuplicateAlias(String),
    #[error("invalid hotkey '{combo}': {source}")]
    Hotkey {
        combo: String,
        #[source]
        source: HotkeyError,
    },
}

/// Settings as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// alias -> executable, document order preserved
    #[serde(with = "ordered_map")]
    pub aliases: Vec<(String, String)>,
    pub check_interval_secs: f64,
    pub trigger_duration_secs: f64,
    pub suppress_duration_secs: f64,
    pub hotkey: String,
    pub alert_message_template: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aliases: vec![("qq".to_string(), "QQ.exe".to_string())],
            check_interval_secs: 1.0,
            trigger_duration_secs: 2.0,
            suppress_duration_secs: 2.0,
            hotkey: "ctrl+alt+shift+q".to_string(),
            alert_message_template: "你好像玩了{{time}}的{{name}}...休息一下吧？".to_string(),
        }
    }
}

/// Validated settings ready for use
#[derive(Debug, Clone)]
pub struct Config {
    pub aliases: Vec<(String, String)>,
    pub check_interval: Duration,
    pub trigger_duration: Duration,
    pub suppress_duration: Duration,
    pub hotkey: Hotkey,
    pub alert_message_template: String,
}

fn seconds(field: &'static str, value: f64, allow_zero: bool) -> Result<Duration, ConfigError> {
    let in_range = if allow_zero { value >= 0.0 } else { value > 0.0 };
    // try_from also rejects NaN, infinity and values too large for a Duration
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if in_range => Ok(duration),
        _ => Err(ConfigError::InvalidValue {
            field,
            expected: if allow_zero { ">= 0" } else { "> 0" },
            value,
        }),
    }
}

impl Settings {
    pub fn validate(self) -> Result<Config, ConfigError> {
        if self.aliases.is_empty() {
            return Err(ConfigError::NoAliases);
        }

        let mut seen = HashSet::new();
        for (alias, _) in &self.aliases {
            if !seen.insert(alias.as_str()) {
                return Err(ConfigError::DuplicateAlias(alias.clone()));
            }
        }

        let hotkey = self
            .hotkey
            .parse::<Hotkey>()
            .map_err(|source| ConfigError::Hotkey {
                combo: self.hotkey.clone(),
                source,
            })?;

        Ok(Config {
            check_interval: seconds("check_interval_secs", self.check_interval_secs, false)?,
            trigger_duration: seconds("trigger_duration_secs", self.trigger_duration_secs, true)?,
            suppress_duration: seconds("suppress_duration_secs", self.suppress_duration_secs, true)?,
            aliases: self.aliases,
            hotkey,
            alert_message_template: self.alert_message_template,
        })
    }
}

/// Default config path (next to the EXE)
pub fn default_config_path() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join(CONFIG_FILE_NAME);
        }
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the explicit path, or the default path if it exists, or the defaults
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let settings = match explicit {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            load_settings(path)?
        }
        None => {
            let path = default_config_path();
            if path.exists() {
                info!("Loading configuration from {}", path.display());
                load_settings(&path)?
            } else {
                info!("No configuration file at {}, using defaults", path.display());
                Settings::default()
            }
        }
    };
    settings.validate()
}

pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(settings).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}

/// Serializes `Vec<(String, String)>` as a JSON object, keeping key order
mod ordered_map {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of alias to executable name")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    pairs.push((k, v));
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}
