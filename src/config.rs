use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AdEventError, Result};

pub const DEFAULT_ADS_PER_HOUR: u32 = 12;
pub const DEFAULT_ADS_PER_DAY: u32 = 48;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_WORKER_ID: u16 = 0;

const CONFIG_DIR_ENV: &str = "ADPULSE_CONFIG_DIR";
const DATA_DIR_ENV: &str = "ADPULSE_DATA_DIR";

fn default_bool_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyCaps {
    pub ads_per_hour: u32,
    pub ads_per_day: u32,
}

impl Default for FrequencyCaps {
    fn default() -> Self {
        Self {
            ads_per_hour: DEFAULT_ADS_PER_HOUR,
            ads_per_day: DEFAULT_ADS_PER_DAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogObserverConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Default for LogObserverConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookObserverConfig {
    pub endpoint: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub https: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObserverConfig {
    Log(LogObserverConfig),
    Webhook(WebhookObserverConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverDefinition {
    #[serde(default = "default_bool_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub config: ObserverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub worker_id: u16,
    #[serde(default)]
    pub caps: FrequencyCaps,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default)]
    pub observers: Vec<ObserverDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            data_dir: default_data_dir(),
            worker_id: DEFAULT_WORKER_ID,
            caps: FrequencyCaps::default(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            observers: vec![ObserverDefinition {
                enabled: true,
                name: None,
                config: ObserverConfig::Log(LogObserverConfig::default()),
            }],
            created_at: now,
            updated_at: now,
        }
    }
}

impl Config {
    pub fn event_store_path(&self) -> PathBuf {
        self.data_dir.join("events")
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AdEventError::Config(format!("{}: {err}", path.display())))?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut config = self.clone();
        config.updated_at = Utc::now();
        let raw = toml::to_string_pretty(&config)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

/// Loads the config at `path` (or the default location), falling back to
/// defaults when no file exists yet. Returns the effective path alongside
/// the config so callers can save back to the same place.
pub fn load_or_default(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    if path.exists() {
        Ok((Config::load(&path)?, path))
    } else {
        Ok((Config::default(), path))
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("config.toml"));
    }
    let base = dirs::config_dir()
        .ok_or_else(|| AdEventError::Config("unable to locate user config directory".into()))?;
    Ok(base.join("adpulse").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".adpulse").join("data"))
        .unwrap_or_else(|| PathBuf::from(".adpulse").join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_round_trips_through_toml() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.caps.ads_per_hour = 3;
        config.observers.push(ObserverDefinition {
            enabled: false,
            name: Some("hook".into()),
            config: ObserverConfig::Webhook(WebhookObserverConfig {
                endpoint: "hooks.example.com/ads".into(),
                headers: BTreeMap::new(),
                https: true,
            }),
        });
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.caps.ads_per_hour, 3);
        assert_eq!(loaded.observers.len(), 2);
        assert!(!loaded.observers[1].enabled);
    }

    #[test]
    fn load_or_default_falls_back_when_missing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.toml");
        let (config, effective) = load_or_default(Some(path.clone())).unwrap();
        assert_eq!(effective, path);
        assert_eq!(config.caps, FrequencyCaps::default());
    }
}
