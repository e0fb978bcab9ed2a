// Error types for Reveille
//
// This module defines error types using thiserror for better error handling
// and debugging throughout the application.

use thiserror::Error;

use crate::alarm::AlarmState;
use crate::audio::AudioError;

/// Errors returned by alarm operations
#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("Invalid alarm time {hour:02}:{minute:02}")]
    InvalidDeadline { hour: u32, minute: u32 },

    #[error("Could not parse alarm time '{0}', expected HH:MM")]
    UnparsableTime(String),

    #[error("Snooze duration must be at least {min} minute(s), got {got}")]
    InvalidSnooze { got: u32, min: u32 },

    #[error("Cannot {action} while the alarm is {state}")]
    InvalidTransition {
        action: &'static str,
        state: AlarmState,
    },

    #[error("Playback failed: {0}")]
    PlaybackFailure(#[from] AudioError),

    #[error("Failed to start alarm thread: {0}")]
    Scheduler(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    NoConfigDir,

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Podcast feed errors
///
/// Every variant is recovered from by falling back to the default sound.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Feed server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Feed request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Malformed feed: {0}")]
    Malformed(#[from] rss::Error),

    #[error("Feed has no entries")]
    NoEntries,

    #[error("First feed entry has no audio enclosure")]
    NoEnclosure,

    #[error("Feed resolver unavailable: {0}")]
    Runtime(String),
}

// Convenience type aliases for common Result types
pub type Result<T> = std::result::Result<T, AlarmError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type FeedResult<T> = std::result::Result<T, FeedError>;
