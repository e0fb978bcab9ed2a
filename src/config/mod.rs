// Configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alarm::{AlarmConfig, ControllerSettings, RampPolicy, SnoozePolicy};
use crate::audio::SoundConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::feed::FeedConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Values offered for the next alarm
    #[serde(default)]
    pub alarm: AlarmDefaults,

    /// Default alarm sound
    #[serde(default)]
    pub sound: SoundConfig,

    /// Volume ramp for the default sound
    #[serde(default)]
    pub ramp: RampPolicy,

    /// Limits for snooze adjustment
    #[serde(default)]
    pub snooze: SnoozePolicy,

    /// Podcast feed fetching
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmDefaults {
    #[serde(default = "default_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,

    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,

    /// Podcast feed played instead of the default sound
    #[serde(default)]
    pub feed_url: Option<String>,
}

fn default_hour() -> u32 {
    7
}

fn default_snooze_minutes() -> u32 {
    5
}

impl Default for AlarmDefaults {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            minute: 0,
            snooze_minutes: default_snooze_minutes(),
            feed_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Deadline check interval in milliseconds (1 to 1000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Keep the feed of a cancelled alarm for the next one
    #[serde(default = "default_retain_feed")]
    pub retain_feed_on_cancel: bool,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_retain_feed() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            retain_feed_on_cancel: default_retain_feed(),
        }
    }
}

impl Config {
    /// Load the config at `path`, writing defaults there if it doesn't exist
    pub fn load_or_create(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            return Self::load_from(path);
        }

        info!(path = %path.display(), "No config file, creating default");
        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    /// Read and validate a config file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Write the config, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("reveille").join("config.toml"))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.draft_alarm()?;
        self.ramp.validate()?;

        if let Some(max) = self.snooze.max_minutes {
            if max < self.snooze.min_minutes {
                return Err(ConfigError::InvalidValue(format!(
                    "snooze.max_minutes ({}) is below snooze.min_minutes ({})",
                    max, self.snooze.min_minutes
                )));
            }
        }

        if self.feed.attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "feed.attempts must be at least 1".to_string(),
            ));
        }
        if self.feed.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "feed.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(1..=1000).contains(&self.scheduler.poll_interval_ms) {
            return Err(ConfigError::InvalidValue(format!(
                "scheduler.poll_interval_ms must be between 1 and 1000, got {}",
                self.scheduler.poll_interval_ms
            )));
        }

        Ok(())
    }

    /// The alarm a plain `set` would arm
    pub fn draft_alarm(&self) -> ConfigResult<AlarmConfig> {
        let alarm = &self.alarm;
        AlarmConfig::new(
            alarm.hour,
            alarm.minute,
            alarm.snooze_minutes,
            alarm.feed_url.clone(),
        )
        .map_err(|e| ConfigError::InvalidValue(format!("[alarm]: {}", e)))
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            default_sound: self.sound.path.clone(),
            ramp: self.ramp,
            poll_interval: Duration::from_millis(self.scheduler.poll_interval_ms),
            retain_feed_on_cancel: self.scheduler.retain_feed_on_cancel,
        }
    }
}
