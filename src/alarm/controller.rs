//! Alarm orchestration
//!
//! [`AlarmController`] is what the UI talks to. It validates user actions
//! against the scheduler state, arms and cancels waits, and on ring decides
//! between a podcast stream and the ramped local sound.
//!
//! Locking: the controller mutex is always taken before the scheduler mutex.
//! The fire path never holds the controller mutex while resolving a feed or
//! opening audio; it re-checks its generation afterwards and throws away a
//! session that lost the race against snooze, stop or a new alarm.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use super::config::AlarmConfig;
use super::deadline::{next_occurrence, snooze_deadline};
use super::ramp::{self, RampHandle, RampPolicy, MAX_VOLUME};
use super::scheduler::{AlarmScheduler, Fired, WaitHandle, MAX_POLL_INTERVAL};
use super::state::{AlarmState, AlarmStatus};
use crate::audio::{AudioError, AudioSink, SessionId};
use crate::clock::Clock;
use crate::display::Display;
use crate::error::{AlarmError, Result};
use crate::feed::{AudioSource, FeedResolver};

/// How the volume of a session is managed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackKind {
    /// Podcast stream at the sink's own volume
    Streamed,
    /// Local sound driven by the volume ramp
    Ramped,
}

/// What is being played
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSource {
    DefaultSound(PathBuf),
    Podcast(AudioSource),
}

/// The sound currently produced for a ringing alarm
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub source: PlaybackSource,
    pub volume: f32,
    pub kind: PlaybackKind,
}

/// Controller behavior that comes from the settings file
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Played when there is no feed or it cannot be used
    pub default_sound: PathBuf,
    pub ramp: RampPolicy,
    /// How often the wait loop checks the deadline
    pub poll_interval: Duration,
    /// Whether a cancelled alarm keeps its feed for the next `set`
    pub retain_feed_on_cancel: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            default_sound: crate::audio::SoundConfig::default().path,
            ramp: RampPolicy::default(),
            poll_interval: MAX_POLL_INTERVAL,
            retain_feed_on_cancel: true,
        }
    }
}

#[derive(Default)]
struct Guarded {
    /// Config of the alarm in progress
    config: Option<AlarmConfig>,
    /// Config kept for re-arming after stop or cancel
    last_config: Option<AlarmConfig>,
    handle: Option<WaitHandle>,
    session: Option<PlaybackSession>,
    /// Generation whose ring is being set up or playing
    ring: Option<u64>,
    ramp: Option<RampHandle>,
}

struct Inner {
    scheduler: AlarmScheduler,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AudioSink>,
    resolver: Arc<dyn FeedResolver>,
    display: Arc<dyn Display>,
    settings: ControllerSettings,
    guarded: Mutex<Guarded>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.guarded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scheduler.reset();
        let guarded = self.guarded.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(ramp) = guarded.ramp.take() {
            ramp.halt();
        }
        if let Some(session) = guarded.session.take() {
            self.sink.stop(session.id);
        }
    }
}

/// Which wait a new arm starts
#[derive(Clone, Copy)]
enum Wait {
    WakeUp,
    Snooze,
}

/// Single-alarm state machine driven by the UI and the scheduler
#[derive(Clone)]
pub struct AlarmController {
    inner: Arc<Inner>,
}

impl AlarmController {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn AudioSink>,
        resolver: Arc<dyn FeedResolver>,
        display: Arc<dyn Display>,
        settings: ControllerSettings,
    ) -> Self {
        let scheduler =
            AlarmScheduler::new(Arc::clone(&clock)).with_poll_interval(settings.poll_interval);

        Self {
            inner: Arc::new(Inner {
                scheduler,
                clock,
                sink,
                resolver,
                display,
                settings,
                guarded: Mutex::new(Guarded::default()),
            }),
        }
    }

    /// Arm the alarm for the next occurrence of the configured time
    ///
    /// Only allowed while idle or cancelled. Returns the deadline.
    pub fn set_alarm(&self, config: AlarmConfig) -> Result<DateTime<Local>> {
        let inner = &self.inner;
        let mut guarded = inner.lock();

        let state = inner.scheduler.state();
        if !state.accepts_config() {
            return Err(AlarmError::InvalidTransition {
                action: "set the alarm",
                state,
            });
        }

        let deadline = next_occurrence(&inner.clock.now(), config.hour(), config.minute())?;
        inner.scheduler.settle();
        let handle = self.arm(deadline, Wait::WakeUp)?;

        info!(
            time = %config.time_label(),
            snooze_minutes = config.snooze_minutes(),
            feed = config.feed_url().unwrap_or("none"),
            deadline = %deadline.format("%Y-%m-%d %H:%M"),
            "Alarm armed"
        );

        guarded.handle = Some(handle);
        guarded.last_config = Some(config.clone());
        guarded.config = Some(config);
        inner.display.show_next_alarm(deadline);

        Ok(deadline)
    }

    /// Silence the ring and ring again after the snooze duration
    ///
    /// Only allowed while ringing. Returns the snooze deadline.
    pub fn snooze(&self) -> Result<DateTime<Local>> {
        let inner = &self.inner;
        let mut guarded = inner.lock();

        let state = inner.scheduler.state();
        let minutes = match (&guarded.config, state) {
            (Some(config), AlarmState::Ringing) => config.snooze_minutes(),
            _ => {
                return Err(AlarmError::InvalidTransition {
                    action: "snooze",
                    state,
                })
            }
        };

        self.end_playback(&mut guarded);

        let now = inner.clock.now();
        let deadline = snooze_deadline(&now, minutes);
        let handle = self.arm(deadline, Wait::Snooze)?;
        guarded.handle = Some(handle);

        info!(
            minutes,
            deadline = %deadline.format("%H:%M:%S"),
            "Alarm snoozed"
        );
        inner.display.show_countdown(deadline - now);

        Ok(deadline)
    }

    /// Silence the alarm and return to idle
    ///
    /// Allowed while ringing or snoozing.
    pub fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        let mut guarded = inner.lock();

        let state = inner.scheduler.state();
        if !matches!(state, AlarmState::Ringing | AlarmState::Snoozing) {
            return Err(AlarmError::InvalidTransition {
                action: "stop",
                state,
            });
        }

        self.end_playback(&mut guarded);
        inner.scheduler.reset();
        guarded.handle = None;
        guarded.config = None;

        info!(from = %state, "Alarm stopped");
        inner.display.show_idle();
        Ok(())
    }

    /// Call off a pending alarm before it rings
    ///
    /// Allowed while armed or snoozing. The config is kept for re-arming; its
    /// feed only if `retain_feed_on_cancel` is set.
    pub fn cancel(&self) -> Result<()> {
        let inner = &self.inner;
        let mut guarded = inner.lock();

        let state = inner.scheduler.state();
        let handle = match guarded.handle {
            Some(handle) if state.is_waiting() => handle,
            _ => {
                return Err(AlarmError::InvalidTransition {
                    action: "cancel",
                    state,
                })
            }
        };

        if !inner.scheduler.cancel(&handle) {
            // Fired between the state check and the cancel
            return Err(AlarmError::InvalidTransition {
                action: "cancel",
                state: inner.scheduler.state(),
            });
        }

        self.end_playback(&mut guarded);
        inner.scheduler.settle();
        guarded.handle = None;

        let cancelled = guarded.config.take();
        if !inner.settings.retain_feed_on_cancel {
            guarded.last_config = cancelled.map(|config| config.with_feed(None));
        }

        info!(from = %state, "Alarm cancelled");
        inner.display.show_idle();
        Ok(())
    }

    /// Push the current time, and the countdown while snoozing, to the display
    pub fn refresh(&self) {
        let inner = &self.inner;
        let now = inner.clock.now();
        inner.display.show_time(now);

        let status = self.status();
        if status.state == AlarmState::Snoozing {
            if let Some(deadline) = status.deadline {
                inner.display.show_countdown(deadline - now);
            }
        }
    }

    pub fn status(&self) -> AlarmStatus {
        let guarded = self.inner.lock();
        let session = guarded.session.as_ref();

        AlarmStatus {
            state: self.inner.scheduler.state(),
            deadline: self.inner.scheduler.deadline(),
            config: guarded.config.clone(),
            volume: session.map(|s| s.volume),
            streamed: session.map_or(false, |s| s.kind == PlaybackKind::Streamed),
        }
    }

    pub fn state(&self) -> AlarmState {
        self.inner.scheduler.state()
    }

    /// Config to offer for the next `set`
    pub fn last_config(&self) -> Option<AlarmConfig> {
        self.inner.lock().last_config.clone()
    }

    pub fn session(&self) -> Option<PlaybackSession> {
        self.inner.lock().session.clone()
    }

    /// Whether a volume ramp loop is still running
    pub fn is_ramping(&self) -> bool {
        self.inner
            .lock()
            .ramp
            .as_ref()
            .map_or(false, |ramp| !ramp.is_finished())
    }

    fn arm(&self, deadline: DateTime<Local>, wait: Wait) -> Result<WaitHandle> {
        let weak = Arc::downgrade(&self.inner);
        let on_fire = move |fired: Fired| {
            if let Some(inner) = weak.upgrade() {
                AlarmController { inner }.on_fire(fired);
            }
        };

        match wait {
            Wait::WakeUp => self.inner.scheduler.arm(deadline, on_fire),
            Wait::Snooze => self.inner.scheduler.arm_snooze(deadline, on_fire),
        }
    }

    fn end_playback(&self, guarded: &mut Guarded) {
        if let Some(ramp) = guarded.ramp.take() {
            ramp.halt();
        }
        if let Some(session) = guarded.session.take() {
            debug!(session = %session.id, "Stopping playback");
            self.inner.sink.stop(session.id);
        }
        guarded.ring = None;
    }

    fn on_fire(&self, fired: Fired) {
        let inner = &self.inner;
        let generation = fired.generation;

        let feed_url = {
            let mut guarded = inner.lock();
            if !inner.scheduler.is_current(generation) || inner.scheduler.state() != AlarmState::Ringing {
                debug!(generation, "Stale fire ignored");
                return;
            }
            guarded.ring = Some(generation);
            guarded.handle = None;
            guarded
                .config
                .as_ref()
                .and_then(|config| config.feed_url())
                .map(str::to_string)
        };

        let started = self.start_playback(feed_url.as_deref());

        let mut guarded = inner.lock();
        if !inner.scheduler.is_current(generation) || guarded.ring != Some(generation) {
            if let Ok(session) = started {
                info!(session = %session.id, generation, "Discarding playback for superseded alarm");
                inner.sink.stop(session.id);
            }
            return;
        }

        match started {
            Ok(session) => {
                if session.kind == PlaybackKind::Ramped {
                    guarded.ramp = self.start_ramp(session.id);
                }
                info!(
                    session = %session.id,
                    kind = ?session.kind,
                    volume = session.volume,
                    "Alarm ringing"
                );
                guarded.session = Some(session);
                inner.display.show_ringing();
            }
            Err(e) => {
                error!(error = %e, "Alarm is ringing without sound");
                inner.display.show_ringing();
                inner.display.show_error(&AlarmError::PlaybackFailure(e).to_string());
            }
        }
    }

    /// Open the podcast if there is one and it works, otherwise the local sound
    fn start_playback(&self, feed_url: Option<&str>) -> std::result::Result<PlaybackSession, AudioError> {
        let inner = &self.inner;

        if let Some(url) = feed_url {
            match inner.resolver.resolve(url) {
                Ok(source) => match inner.sink.play_stream(&source.url) {
                    Ok(id) => {
                        return Ok(PlaybackSession {
                            id,
                            source: PlaybackSource::Podcast(source),
                            volume: MAX_VOLUME,
                            kind: PlaybackKind::Streamed,
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, episode = %source.url, "Podcast playback failed, using default sound");
                    }
                },
                Err(e) => {
                    warn!(error = %e, feed = %url, "Feed unavailable, using default sound");
                }
            }
        }

        let path = inner.settings.default_sound.clone();
        let id = inner.sink.play_local(&path)?;
        let volume = inner.settings.ramp.start_volume;
        inner.sink.set_volume(id, volume);

        Ok(PlaybackSession {
            id,
            source: PlaybackSource::DefaultSound(path),
            volume,
            kind: PlaybackKind::Ramped,
        })
    }

    fn start_ramp(&self, id: SessionId) -> Option<RampHandle> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let spawned = ramp::spawn(self.inner.settings.ramp, move |volume| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let mut guarded = inner.lock();
            let Some(session) = guarded.session.as_mut().filter(|s| s.id == id) else {
                return false;
            };
            if !inner.sink.is_playing(id) {
                debug!(session = %id, "Playback ended, halting volume ramp");
                return false;
            }
            inner.sink.set_volume(id, volume);
            session.volume = volume;
            debug!(session = %id, volume, "Volume raised");
            true
        });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, "Failed to start volume ramp");
                None
            }
        }
    }
}
