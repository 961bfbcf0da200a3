//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and overridden by `LEDGER__*` environment
//! variables (e.g. `LEDGER__SCHEDULER__INTERVAL_SECS=60`).
//!
//! See `settings.toml` for the configuration.
use std::time::Duration;

use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use engine::{EngineConfig, ProcessorConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub interval_secs: u64,
    pub tick_timeout_secs: u64,
    pub reminder_lead_days: i64,
    pub editable_window_secs: i64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
            tick_timeout_secs: 5 * 60,
            reminder_lead_days: 3,
            editable_window_secs: 15 * 60,
        }
    }
}

impl Scheduler {
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let editable_window = TimeDelta::try_seconds(self.editable_window_secs)
            .ok_or_else(|| ConfigError::Message("editable_window_secs out of range".into()))?;
        let reminder_lead_time = TimeDelta::try_days(self.reminder_lead_days)
            .ok_or_else(|| ConfigError::Message("reminder_lead_days out of range".into()))?;
        Ok(EngineConfig {
            editable_window,
            reminder_lead_time,
        })
    }

    pub fn processor_config(&self) -> Result<ProcessorConfig, ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Message("interval_secs must be > 0".into()));
        }
        Ok(ProcessorConfig {
            interval: Duration::from_secs(self.interval_secs),
            tick_timeout: Duration::from_secs(self.tick_timeout_secs),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub scheduler: Scheduler,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
