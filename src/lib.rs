//! Reveille alarm clock library
//!
//! A single personal alarm: arm it for a time of day, optionally with a podcast
//! feed as the wake-up sound, then snooze, stop or cancel it. The state machine
//! lives in [`alarm`]; sound, feeds and presentation sit behind the
//! [`AudioSink`], [`FeedResolver`] and [`Display`] traits.

pub mod alarm;
pub mod audio;
pub mod clock;
pub mod command;
pub mod config;
pub mod config_watcher;
pub mod display;
pub mod error;
pub mod feed;

// Re-export commonly used types
pub use alarm::{
    AlarmConfig, AlarmController, AlarmScheduler, AlarmState, AlarmStatus, ControllerSettings,
    PlaybackKind, PlaybackSession, PlaybackSource, RampPolicy, SnoozePolicy,
};
pub use audio::{AudioError, AudioPlayer, AudioSink, SessionId, SoundConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, CommandError};
pub use config::Config;
pub use config_watcher::{ConfigReloadEvent, ConfigWatcher};
pub use display::{Display, TerminalDisplay};
pub use error::{AlarmError, ConfigError, FeedError};
pub use feed::{AudioSource, FeedConfig, FeedResolver, HttpFeedResolver};
