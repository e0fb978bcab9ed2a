//! Stub implementation when audio feature is disabled

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::{AudioError, AudioSink, SessionId};

/// Stub audio player
///
/// Makes no sound but keeps session bookkeeping so a session reads as
/// playing until it is stopped.
pub struct AudioPlayer {
    sessions: Mutex<HashMap<SessionId, f32>>,
    next_id: AtomicU64,
}

impl AudioPlayer {
    /// Create a new audio player stub
    pub fn new(_fetch_timeout: Duration) -> Result<Self, AudioError> {
        debug!("Audio feature not enabled, using stub player");
        Ok(Self::default())
    }

    fn open(&self) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, 1.0);
        id
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl AudioSink for AudioPlayer {
    fn play_local(&self, path: &Path) -> Result<SessionId, AudioError> {
        debug!(path = %path.display(), "Audio playback skipped (feature not enabled)");
        Ok(self.open())
    }

    fn play_stream(&self, url: &str) -> Result<SessionId, AudioError> {
        debug!(url = %url, "Audio playback skipped (feature not enabled)");
        Ok(self.open())
    }

    fn set_volume(&self, session: SessionId, volume: f32) {
        if let Some(level) = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&session)
        {
            *level = volume;
        }
    }

    fn stop(&self, session: SessionId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
    }

    fn is_playing(&self, session: SessionId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&session)
    }
}
