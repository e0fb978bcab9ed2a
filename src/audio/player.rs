//! Audio sink implementation using rodio

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::HashMap;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AudioError, AudioSink, SessionId};

/// Audio player backed by the default output device
///
/// `OutputStream` is not `Send`, so it lives on a dedicated thread for the
/// lifetime of the player and only the handle is shared.
pub struct AudioPlayer {
    stream_handle: OutputStreamHandle,
    sinks: Mutex<HashMap<SessionId, Sink>>,
    next_id: AtomicU64,
    http: reqwest::blocking::Client,
    _shutdown: mpsc::Sender<()>,
}

impl AudioPlayer {
    /// Open the default output device
    ///
    /// `fetch_timeout` bounds how long a podcast download may take before
    /// `play_stream` gives up.
    pub fn new(fetch_timeout: Duration) -> Result<Self, AudioError> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if handle_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    // Returns once the player (and its sender) is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(AudioError::StreamError(e.to_string())));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let stream_handle = handle_rx.recv().map_err(|_| AudioError::NotAvailable)??;

        let http = reqwest::blocking::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AudioError::FetchError(e.to_string()))?;

        info!("Audio player initialized");

        Ok(Self {
            stream_handle,
            sinks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            http,
            _shutdown: shutdown_tx,
        })
    }

    fn sinks(&self) -> MutexGuard<'_, HashMap<SessionId, Sink>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start<S>(&self, source: S) -> Result<SessionId, AudioError>
    where
        S: Source<Item = i16> + Send + 'static,
    {
        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| AudioError::StreamError(e.to_string()))?;
        sink.append(source);
        sink.play();

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks().insert(id, sink);
        Ok(id)
    }
}

impl AudioSink for AudioPlayer {
    fn play_local(&self, path: &Path) -> Result<SessionId, AudioError> {
        debug!(path = %path.display(), "Playing sound file");

        if !path.exists() {
            return Err(AudioError::FileNotFound(path.to_path_buf()));
        }

        let file = std::fs::File::open(path).map_err(|e| AudioError::DecodeError(e.to_string()))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| AudioError::DecodeError(e.to_string()))?;

        // The default sound loops until someone stops it
        self.start(source.repeat_infinite())
    }

    fn play_stream(&self, url: &str) -> Result<SessionId, AudioError> {
        debug!(url = %url, "Downloading podcast episode");

        let response = self
            .http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| AudioError::FetchError(e.to_string()))?;
        let bytes = response
            .bytes()
            .map_err(|e| AudioError::FetchError(e.to_string()))?;

        info!(url = %url, size = bytes.len(), "Podcast episode downloaded");

        let source = Decoder::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| AudioError::DecodeError(e.to_string()))?;

        self.start(source)
    }

    fn set_volume(&self, session: SessionId, volume: f32) {
        match self.sinks().get(&session) {
            Some(sink) => sink.set_volume(volume.clamp(0.0, 1.0)),
            None => warn!(session = %session, "Volume change for unknown session"),
        }
    }

    fn stop(&self, session: SessionId) {
        if let Some(sink) = self.sinks().remove(&session) {
            sink.stop();
            debug!(session = %session, "Playback stopped");
        }
    }

    fn is_playing(&self, session: SessionId) -> bool {
        self.sinks()
            .get(&session)
            .is_some_and(|sink| !sink.empty() && !sink.is_paused())
    }
}
