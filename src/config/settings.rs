//! Application settings
//!
//! Settings are plain key/value pairs behind [`SettingsStore`]; [`AppSettings`]
//! is the typed view that gets passed into constructors.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::config;

const KEY_CONFIG_PATH: &str = "config_path";
const KEY_AUTO_APPLY: &str = "auto_apply_config";
const KEY_DOUBLE_CLICK_APPLY: &str = "double_click_apply";
const KEY_CLOSE_BEHAVIOR: &str = "close_behavior";

/// Abstract key/value persistence for settings
pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

/// In-memory settings, used by tests and as a scratch store
impl SettingsStore for HashMap<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings kept as a single JSON object on disk
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonSettingsStore {
    pub fn default_path() -> PathBuf {
        let mut path = default_config_dir();
        path.push(config::SETTINGS_FILENAME);
        path
    }

    /// Load settings; a missing or unreadable file starts from defaults
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(values)) => values,
                Ok(_) => {
                    warn!(path = %path.display(), "Settings file is not a JSON object, using defaults");
                    Map::new()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse settings, using defaults");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.values).context("Failed to serialize settings")?;
        fs::write(&self.path, json).with_context(|| format!("Failed to write settings to {:?}", self.path))?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let previous = self.values.insert(key.to_string(), value);
        if let Err(e) = self.save() {
            match previous {
                Some(previous) => self.values.insert(key.to_string(), previous),
                None => self.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// What closing the main window does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CloseBehavior {
    #[default]
    Minimize,
    Exit,
}

impl CloseBehavior {
    /// Decode a stored value. Older versions wrote an integer
    /// (0 → minimize, anything else → exit); the flag reports that shape.
    fn from_stored(value: &Value) -> Option<(Self, bool)> {
        match value {
            Value::Number(n) => {
                let legacy = if n.as_f64() == Some(0.0) {
                    CloseBehavior::Minimize
                } else {
                    CloseBehavior::Exit
                };
                Some((legacy, true))
            }
            other => serde_json::from_value(other.clone()).ok().map(|b| (b, false)),
        }
    }
}

fn default_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(config::APP_DIR);
    path
}

fn read_bool(store: &dyn SettingsStore, key: &str) -> bool {
    match store.get(key) {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// Directory holding the record file and the icon folder
    pub config_dir: PathBuf,
    pub auto_apply: bool,
    pub double_click_apply: bool,
    pub close_behavior: CloseBehavior,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            auto_apply: false,
            double_click_apply: false,
            close_behavior: CloseBehavior::default(),
        }
    }
}

impl AppSettings {
    /// Read settings, filling gaps with defaults. A legacy integer
    /// `close_behavior` is rewritten as its string form (best-effort).
    pub fn load(store: &mut dyn SettingsStore) -> Self {
        let config_dir = store
            .get(KEY_CONFIG_PATH)
            .and_then(|v| v.as_str().filter(|s| !s.is_empty()).map(PathBuf::from))
            .unwrap_or_else(default_config_dir);

        let close_behavior = match store.get(KEY_CLOSE_BEHAVIOR).as_ref().and_then(CloseBehavior::from_stored) {
            Some((behavior, true)) => {
                info!(close_behavior = ?behavior, "Migrating legacy close_behavior setting");
                if let Err(e) = store.set(KEY_CLOSE_BEHAVIOR, serde_json::json!(behavior)) {
                    warn!(error = %e, "Failed to rewrite legacy close_behavior setting");
                }
                behavior
            }
            Some((behavior, false)) => behavior,
            None => CloseBehavior::default(),
        };

        Self {
            config_dir,
            auto_apply: read_bool(store, KEY_AUTO_APPLY),
            double_click_apply: read_bool(store, KEY_DOUBLE_CLICK_APPLY),
            close_behavior,
        }
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<()> {
        self.save_config_dir(store)?;
        self.save_preferences(store)
    }

    pub fn save_config_dir(&self, store: &mut dyn SettingsStore) -> Result<()> {
        store.set(KEY_CONFIG_PATH, Value::String(self.config_dir.to_string_lossy().into_owned()))
    }

    /// Toggles only; leaves the stored config directory alone
    pub fn save_preferences(&self, store: &mut dyn SettingsStore) -> Result<()> {
        store.set(KEY_AUTO_APPLY, Value::Bool(self.auto_apply))?;
        store.set(KEY_DOUBLE_CLICK_APPLY, Value::Bool(self.double_click_apply))?;
        store.set(KEY_CLOSE_BEHAVIOR, serde_json::to_value(self.close_behavior)?)?;
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(config::FILENAME)
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.config_dir.join(config::ICONS_DIR)
    }
}
