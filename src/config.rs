//! Settings for the APM tracker.
//!
//! Settings live in a flat JSON file. Missing keys take their defaults,
//! unknown keys are ignored with a warning, and values that fail to parse
//! or fall outside their valid range are replaced by defaults. A broken
//! settings file never stops the tracker.

use crate::core::history::MAX_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const APP_DIR: &str = "apm-tracker";

pub const DEFAULT_ACTION_COOLDOWN: f64 = 0.05;
pub const DEFAULT_EAPM_COOLDOWN: f64 = 0.5;
pub const DEFAULT_TRANSPARENCY: f64 = 1.0;
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 500;
pub const DEFAULT_GRAPH_UPDATE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_GRAPH_TIME_RANGE: u64 = 60;
pub const DEFAULT_MAX_ACTIONS_PER_SECOND: u32 = 50;
pub const DEFAULT_ACTIVE_CHECK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Keys recognized in the settings file.
pub const KNOWN_KEYS: [&str; 13] = [
    "action_cooldown",
    "eapm_cooldown",
    "history_capacity",
    "target_program",
    "transparency",
    "update_interval_ms",
    "graph_update_interval_ms",
    "graph_time_range",
    "max_actions_per_second",
    "active_check_interval_ms",
    "log_level",
    "paused",
    "sources",
];

/// Persisted tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum seconds between two counted raw actions
    pub action_cooldown: f64,
    /// Minimum seconds between two effective actions
    pub eapm_cooldown: f64,
    /// Capacity of each action history
    pub history_capacity: usize,
    /// Only record while this program has focus (empty = everywhere)
    pub target_program: String,
    /// Overlay opacity, kept for front ends that draw one
    pub transparency: f64,
    /// Readout refresh interval
    pub update_interval_ms: u64,
    /// Chart refresh interval
    pub graph_update_interval_ms: u64,
    /// Seconds shown in the chart
    pub graph_time_range: u64,
    /// Upper bound of the chart's y axis
    pub max_actions_per_second: u32,
    /// How long a foreground-program lookup stays valid
    pub active_check_interval_ms: u64,
    pub log_level: String,
    /// Whether collection is currently paused
    pub paused: bool,
    /// Which input sources to capture
    pub sources: SourceConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            action_cooldown: DEFAULT_ACTION_COOLDOWN,
            eapm_cooldown: DEFAULT_EAPM_COOLDOWN,
            history_capacity: crate::core::DEFAULT_HISTORY_CAPACITY,
            target_program: String::new(),
            transparency: DEFAULT_TRANSPARENCY,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            graph_update_interval_ms: DEFAULT_GRAPH_UPDATE_INTERVAL_MS,
            graph_time_range: DEFAULT_GRAPH_TIME_RANGE,
            max_actions_per_second: DEFAULT_MAX_ACTIONS_PER_SECOND,
            active_check_interval_ms: DEFAULT_ACTIVE_CHECK_INTERVAL_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            paused: false,
            sources: SourceConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load settings, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("could not load settings, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(?path, "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings from JSON text.
    ///
    /// Only a document that is not a JSON object is an error; individual
    /// bad entries are dropped with a warning.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(mut map) = value else {
            return Err(ConfigError::NotAnObject);
        };

        for key in unknown_keys(&map) {
            warn!(key = %key, "ignoring unknown setting");
            map.remove(&key);
        }

        map.retain(|key, value| {
            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            match serde_json::from_value::<Settings>(Value::Object(single)) {
                Ok(_) => true,
                Err(e) => {
                    warn!(key = %key, "ignoring malformed setting: {e}");
                    false
                }
            }
        });

        let mut settings: Settings = serde_json::from_value(Value::Object(map))?;
        settings.validate();
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!(?path, "settings saved");
        Ok(())
    }

    /// Get the path to the settings file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.json")
    }

    /// Directory for logs and exports.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn export_dir() -> PathBuf {
        Self::data_dir().join("exports")
    }

    pub fn log_dir() -> PathBuf {
        Self::data_dir().join("logs")
    }

    /// Replace out-of-range values with defaults.
    ///
    /// Returns the keys that were corrected.
    pub fn validate(&mut self) -> Vec<&'static str> {
        let mut corrected = Vec::new();

        if self.update_interval_ms < 100 {
            warn!("update interval too low, setting to 100ms");
            self.update_interval_ms = 100;
            corrected.push("update_interval_ms");
        }
        if self.graph_update_interval_ms < 500 {
            warn!("graph update interval too low, setting to 500ms");
            self.graph_update_interval_ms = 500;
            corrected.push("graph_update_interval_ms");
        }
        if !(10..=300).contains(&self.graph_time_range) {
            warn!("invalid graph time range, setting to {DEFAULT_GRAPH_TIME_RANGE} seconds");
            self.graph_time_range = DEFAULT_GRAPH_TIME_RANGE;
            corrected.push("graph_time_range");
        }
        if self.max_actions_per_second < 1 {
            warn!("invalid max actions per second, setting to 1");
            self.max_actions_per_second = 1;
            corrected.push("max_actions_per_second");
        }
        if !(0.01..=1.0).contains(&self.action_cooldown) {
            warn!("invalid action cooldown, setting to {DEFAULT_ACTION_COOLDOWN} seconds");
            self.action_cooldown = DEFAULT_ACTION_COOLDOWN;
            corrected.push("action_cooldown");
        }
        if !(0.1..=2.0).contains(&self.eapm_cooldown) {
            warn!("invalid eAPM cooldown, setting to {DEFAULT_EAPM_COOLDOWN} seconds");
            self.eapm_cooldown = DEFAULT_EAPM_COOLDOWN;
            corrected.push("eapm_cooldown");
        }
        if !(1..=MAX_HISTORY_CAPACITY).contains(&self.history_capacity) {
            warn!(
                capacity = self.history_capacity,
                "history capacity must be between 1 and {MAX_HISTORY_CAPACITY}, using the default"
            );
            self.history_capacity = crate::core::DEFAULT_HISTORY_CAPACITY;
            corrected.push("history_capacity");
        }
        if !(0.1..=1.0).contains(&self.transparency) {
            warn!("invalid transparency, setting to {DEFAULT_TRANSPARENCY}");
            self.transparency = DEFAULT_TRANSPARENCY;
            corrected.push("transparency");
        }
        let level = self.log_level.to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            self.log_level = level;
        } else {
            warn!(level = %self.log_level, "unknown log level, using {DEFAULT_LOG_LEVEL}");
            self.log_level = DEFAULT_LOG_LEVEL.to_string();
            corrected.push("log_level");
        }

        corrected
    }

    /// Update one setting from its textual value, then re-validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "action_cooldown" => self.action_cooldown = value.parse().map_err(|_| invalid())?,
            "eapm_cooldown" => self.eapm_cooldown = value.parse().map_err(|_| invalid())?,
            "history_capacity" => self.history_capacity = value.parse().map_err(|_| invalid())?,
            "target_program" => self.target_program = crate::target::normalize_target(value),
            "transparency" => self.transparency = value.parse().map_err(|_| invalid())?,
            "update_interval_ms" => {
                self.update_interval_ms = value.parse().map_err(|_| invalid())?
            }
            "graph_update_interval_ms" => {
                self.graph_update_interval_ms = value.parse().map_err(|_| invalid())?
            }
            "graph_time_range" => self.graph_time_range = value.parse().map_err(|_| invalid())?,
            "max_actions_per_second" => {
                self.max_actions_per_second = value.parse().map_err(|_| invalid())?
            }
            "active_check_interval_ms" => {
                self.active_check_interval_ms = value.parse().map_err(|_| invalid())?
            }
            "log_level" => self.log_level = value.to_string(),
            "paused" => self.paused = value.parse().map_err(|_| invalid())?,
            "sources" => {
                let sources = SourceConfig::from_csv(value);
                if !sources.any_enabled() {
                    return Err(invalid());
                }
                self.sources = sources;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        self.validate();
        info!(key, value, "setting updated");
        Ok(())
    }

    /// The configured target program, if any.
    pub fn target(&self) -> Option<&str> {
        let target = self.target_program.trim();
        (!target.is_empty()).then_some(target)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn graph_update_interval(&self) -> Duration {
        Duration::from_millis(self.graph_update_interval_ms)
    }

    pub fn active_check_interval(&self) -> Duration {
        Duration::from_millis(self.active_check_interval_ms)
    }
}

/// Keys in `map` that are not recognized settings.
pub fn unknown_keys(map: &Map<String, Value>) -> Vec<String> {
    map.keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .cloned()
        .collect()
}

/// Configuration for which input sources to capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub keyboard: bool,
    pub mouse: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            mouse: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            keyboard: sources.iter().any(|s| s == "keyboard" || s == "all"),
            mouse: sources.iter().any(|s| s == "mouse" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.keyboard || self.mouse
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings file must contain a JSON object")]
    NotAnObject,
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for setting {key}")]
    InvalidValue { key: String, value: String },
}
