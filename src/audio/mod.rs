//! Audio playback for the alarm
//!
//! The controller talks to an [`AudioSink`]. With the `audio` feature the sink
//! is backed by rodio; without it a logging stub keeps the rest of the crate
//! usable on machines with no sound stack.

#[cfg(feature = "audio")]
mod player;

#[cfg(feature = "audio")]
pub use player::AudioPlayer;

#[cfg(not(feature = "audio"))]
mod stub;

#[cfg(not(feature = "audio"))]
pub use stub::AudioPlayer;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during audio playback
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to create output stream: {0}")]
    StreamError(String),

    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    #[error("Sound file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to download audio stream: {0}")]
    FetchError(String),

    #[error("Audio system not available")]
    NotAvailable,
}

/// Identifies one playback started through an [`AudioSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that can make noise
///
/// Implementations may block while opening a source; the controller never
/// calls them while holding its lock.
pub trait AudioSink: Send + Sync {
    /// Start looping a local sound file
    fn play_local(&self, path: &Path) -> Result<SessionId, AudioError>;

    /// Start playing a remote audio URL once
    fn play_stream(&self, url: &str) -> Result<SessionId, AudioError>;

    /// Set the volume (0.0 to 1.0) of a running session
    fn set_volume(&self, session: SessionId, volume: f32);

    /// Stop a session. Unknown or finished sessions are ignored.
    fn stop(&self, session: SessionId);

    /// Whether the session is still producing sound
    fn is_playing(&self, session: SessionId) -> bool;
}

/// Default alarm sound configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Local file played when no podcast is configured or it can't be fetched
    #[serde(default = "default_sound_path")]
    pub path: PathBuf,
}

fn default_sound_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reveille")
        .join("gentle_pastures.mp3")
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            path: default_sound_path(),
        }
    }
}
