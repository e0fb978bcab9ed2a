//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone};
use reveille::alarm::{ControllerSettings, RampPolicy};
use reveille::{
    AlarmController, AudioError, AudioSink, AudioSource, Display, FeedError, FeedResolver,
    ManualClock, SessionId,
};

pub const EPISODE_URL: &str = "https://cdn.example.com/morning-show/ep42.mp3";
pub const FEED_URL: &str = "https://example.com/morning-show/feed.xml";

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// 2026-06-15 at the given local time
pub fn local(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 6, 15, hour, minute, second)
        .earliest()
        .expect("valid local time")
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    PlayLocal(PathBuf),
    PlayStream(String),
    SetVolume(SessionId, f32),
    Stop(SessionId),
}

#[derive(Default)]
struct SinkState {
    calls: Vec<SinkCall>,
    playing: HashSet<SessionId>,
    fail_local: bool,
    fail_stream: bool,
}

/// Audio sink that records every call
#[derive(Default)]
pub struct FakeSink {
    state: Mutex<SinkState>,
    next_id: AtomicU64,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_local() -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().fail_local = true;
        sink
    }

    pub fn failing_stream() -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().fail_stream = true;
        sink
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn local_plays(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SinkCall::PlayLocal(_)))
            .count()
    }

    pub fn stream_plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::PlayStream(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn volumes(&self, session: SessionId) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::SetVolume(id, v) if id == session => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn was_stopped(&self, session: SessionId) -> bool {
        self.calls().contains(&SinkCall::Stop(session))
    }

    /// Simulate the sound ending by itself
    pub fn finish(&self, session: SessionId) {
        self.state.lock().unwrap().playing.remove(&session);
    }

    fn start(&self, call: SinkCall) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.playing.insert(id);
        id
    }
}

impl AudioSink for FakeSink {
    fn play_local(&self, path: &Path) -> Result<SessionId, AudioError> {
        if self.state.lock().unwrap().fail_local {
            return Err(AudioError::FileNotFound(path.to_path_buf()));
        }
        Ok(self.start(SinkCall::PlayLocal(path.to_path_buf())))
    }

    fn play_stream(&self, url: &str) -> Result<SessionId, AudioError> {
        if self.state.lock().unwrap().fail_stream {
            return Err(AudioError::DecodeError("unsupported format".to_string()));
        }
        Ok(self.start(SinkCall::PlayStream(url.to_string())))
    }

    fn set_volume(&self, session: SessionId, volume: f32) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(SinkCall::SetVolume(session, volume));
    }

    fn stop(&self, session: SessionId) {
        let mut state = self.state.lock().unwrap();
        state.playing.remove(&session);
        state.calls.push(SinkCall::Stop(session));
    }

    fn is_playing(&self, session: SessionId) -> bool {
        self.state.lock().unwrap().playing.contains(&session)
    }
}

/// Resolver with a canned answer
pub struct FakeResolver {
    succeed: bool,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn resolving() -> Self {
        Self {
            succeed: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeedResolver for FakeResolver {
    fn resolve(&self, _url: &str) -> Result<AudioSource, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(episode())
        } else {
            Err(FeedError::HttpStatus(503))
        }
    }
}

pub fn episode() -> AudioSource {
    AudioSource {
        url: EPISODE_URL.to_string(),
        title: Some("Episode 42".to_string()),
        mime_type: Some("audio/mpeg".to_string()),
    }
}

/// Resolver that blocks until the test releases it
#[derive(Default)]
pub struct GatedResolver {
    gate: Mutex<(bool, bool)>,
    changed: Condvar,
}

impl GatedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until some thread is blocked inside `resolve`
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        let gate = self.gate.lock().unwrap();
        let (gate, _) = self
            .changed
            .wait_timeout_while(gate, timeout, |(entered, _)| !*entered)
            .unwrap();
        gate.0
    }

    pub fn release(&self) {
        self.gate.lock().unwrap().1 = true;
        self.changed.notify_all();
    }
}

impl FeedResolver for GatedResolver {
    fn resolve(&self, _url: &str) -> Result<AudioSource, FeedError> {
        let mut gate = self.gate.lock().unwrap();
        gate.0 = true;
        self.changed.notify_all();
        let _gate = self
            .changed
            .wait_timeout_while(gate, Duration::from_secs(5), |(_, released)| !*released)
            .unwrap();
        Ok(episode())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    NextAlarm(DateTime<Local>),
    Countdown(chrono::Duration),
    Ringing,
    Idle,
    Error(String),
}

/// Display that keeps every event except clock refreshes
#[derive(Default)]
pub struct RecordingDisplay {
    events: Mutex<Vec<DisplayEvent>>,
    clock_refreshes: AtomicUsize,
}

impl RecordingDisplay {
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &DisplayEvent) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DisplayEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn clock_refreshes(&self) -> usize {
        self.clock_refreshes.load(Ordering::SeqCst)
    }

    fn push(&self, event: DisplayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Display for RecordingDisplay {
    fn show_time(&self, _now: DateTime<Local>) {
        self.clock_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn show_next_alarm(&self, deadline: DateTime<Local>) {
        self.push(DisplayEvent::NextAlarm(deadline));
    }

    fn show_countdown(&self, remaining: chrono::Duration) {
        self.push(DisplayEvent::Countdown(remaining));
    }

    fn show_ringing(&self) {
        self.push(DisplayEvent::Ringing);
    }

    fn show_idle(&self) {
        self.push(DisplayEvent::Idle);
    }

    fn show_error(&self, message: &str) {
        self.push(DisplayEvent::Error(message.to_string()));
    }
}

/// Controller wired to fakes and a manual clock
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub sink: Arc<FakeSink>,
    pub display: Arc<RecordingDisplay>,
    pub controller: AlarmController,
}

pub fn fast_settings() -> ControllerSettings {
    ControllerSettings {
        default_sound: PathBuf::from("/usr/share/reveille/gentle_pastures.mp3"),
        ramp: RampPolicy {
            step_interval_ms: 60_000,
            ..RampPolicy::default()
        },
        poll_interval: Duration::from_millis(5),
        retain_feed_on_cancel: true,
    }
}

impl Harness {
    pub fn new(start: DateTime<Local>, resolver: Arc<dyn FeedResolver>) -> Self {
        Self::with(start, resolver, FakeSink::new(), fast_settings())
    }

    pub fn with(
        start: DateTime<Local>,
        resolver: Arc<dyn FeedResolver>,
        sink: FakeSink,
        settings: ControllerSettings,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let sink = Arc::new(sink);
        let display = Arc::new(RecordingDisplay::default());
        let controller = AlarmController::new(
            clock.clone(),
            sink.clone(),
            resolver,
            display.clone(),
            settings,
        );

        Self {
            clock,
            sink,
            display,
            controller,
        }
    }

    /// Wait until the controller reports a committed ring
    pub fn wait_ringing(&self, rings: usize) -> bool {
        wait_until(Duration::from_secs(2), || {
            self.display.count(&DisplayEvent::Ringing) >= rings
        })
    }
}
