//! Deadline wait loop with generation-based cancellation
//!
//! Every arm starts a new generation and a background thread that polls the
//! clock at most once per `poll_interval`. Cancelling, resetting or re-arming
//! bumps the generation; a loop whose generation is no longer current exits
//! without firing. The generation is re-checked under the scheduler lock at
//! the moment of firing, so a stale loop can never produce a ring.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, error, info};

use super::state::AlarmState;
use crate::clock::Clock;
use crate::error::{AlarmError, Result};

/// Longest time between two deadline checks
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest accepted poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to one armed wait, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitHandle {
    generation: u64,
    deadline: DateTime<Local>,
}

impl WaitHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn deadline(&self) -> DateTime<Local> {
        self.deadline
    }
}

/// Passed to the fire callback when a wait completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub generation: u64,
    pub deadline: DateTime<Local>,
    pub fired_at: DateTime<Local>,
}

#[derive(Debug, Default)]
struct Core {
    state: AlarmState,
    deadline: Option<DateTime<Local>>,
    generation: u64,
}

impl Core {
    /// Invalidate whatever wait loop is running
    fn invalidate(&mut self, state: AlarmState) {
        self.generation += 1;
        self.state = state;
        self.deadline = None;
    }
}

/// Owns the alarm state and deadline and runs the wait loop
#[derive(Clone)]
pub struct AlarmScheduler {
    clock: Arc<dyn Clock>,
    core: Arc<Mutex<Core>>,
    poll_interval: Duration,
}

impl AlarmScheduler {
    /// Create an idle scheduler polling once per second
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            core: Arc::new(Mutex::new(Core::default())),
            poll_interval: MAX_POLL_INTERVAL,
        }
    }

    /// Set the deadline check interval, clamped to 1ms..=1s
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        lock_core(&self.core)
    }

    /// Wait for the wake-up deadline
    ///
    /// A deadline at or before now is due and fires on the first check.
    pub fn arm<F>(&self, deadline: DateTime<Local>, on_fire: F) -> Result<WaitHandle>
    where
        F: FnOnce(Fired) + Send + 'static,
    {
        self.start(deadline, AlarmState::Armed, on_fire)
    }

    /// Wait for a snooze deadline
    pub fn arm_snooze<F>(&self, deadline: DateTime<Local>, on_fire: F) -> Result<WaitHandle>
    where
        F: FnOnce(Fired) + Send + 'static,
    {
        self.start(deadline, AlarmState::Snoozing, on_fire)
    }

    fn start<F>(&self, deadline: DateTime<Local>, waiting: AlarmState, on_fire: F) -> Result<WaitHandle>
    where
        F: FnOnce(Fired) + Send + 'static,
    {
        let generation = {
            let mut core = self.core();
            core.invalidate(waiting);
            core.deadline = Some(deadline);
            core.generation
        };

        let clock = Arc::clone(&self.clock);
        let core = Arc::clone(&self.core);
        let poll_interval = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("alarm-wait".to_string())
            .spawn(move || wait_loop(clock, core, generation, deadline, poll_interval, on_fire));

        if let Err(e) = spawned {
            error!(error = %e, "Failed to start alarm wait loop");
            let mut core = self.core();
            if core.generation == generation {
                core.invalidate(AlarmState::Idle);
            }
            return Err(AlarmError::Scheduler(e));
        }

        info!(
            generation,
            state = %waiting,
            deadline = %deadline.format("%Y-%m-%d %H:%M:%S"),
            "Alarm wait started"
        );

        Ok(WaitHandle { generation, deadline })
    }

    /// Cancel a wait before it fires
    ///
    /// Returns `false` without touching anything if the handle already fired,
    /// was cancelled, or was superseded.
    pub fn cancel(&self, handle: &WaitHandle) -> bool {
        let mut core = self.core();
        if core.generation != handle.generation || !core.state.is_waiting() {
            debug!(generation = handle.generation, "Cancel of inactive wait ignored");
            return false;
        }

        core.invalidate(AlarmState::Cancelled);
        info!(generation = handle.generation, "Alarm wait cancelled");
        true
    }

    /// Drop any wait and ringing state and return to idle
    pub fn reset(&self) {
        self.core().invalidate(AlarmState::Idle);
    }

    /// Move a cancelled scheduler back to idle
    pub fn settle(&self) {
        let mut core = self.core();
        if core.state == AlarmState::Cancelled {
            core.state = AlarmState::Idle;
        }
    }

    pub fn state(&self) -> AlarmState {
        self.core().state
    }

    /// Deadline of the live wait, if any
    pub fn deadline(&self) -> Option<DateTime<Local>> {
        self.core().deadline
    }

    pub fn generation(&self) -> u64 {
        self.core().generation
    }

    /// Whether `generation` is still the one in charge
    pub fn is_current(&self, generation: u64) -> bool {
        self.core().generation == generation
    }
}

fn lock_core(core: &Mutex<Core>) -> MutexGuard<'_, Core> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait_loop<F>(
    clock: Arc<dyn Clock>,
    core: Arc<Mutex<Core>>,
    generation: u64,
    deadline: DateTime<Local>,
    poll_interval: Duration,
    on_fire: F,
) where
    F: FnOnce(Fired),
{
    loop {
        if lock_core(&core).generation != generation {
            debug!(generation, "Wait loop superseded, exiting");
            return;
        }

        let now = clock.now();
        if now >= deadline {
            break;
        }

        let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
        thread::sleep(poll_interval.min(remaining).max(MIN_POLL_INTERVAL));
    }

    let fired = {
        let mut guard = lock_core(&core);
        if guard.generation != generation || !guard.state.is_waiting() {
            debug!(generation, "Wait cancelled at deadline, not firing");
            return;
        }
        guard.state = AlarmState::Ringing;
        guard.deadline = None;
        Fired {
            generation,
            deadline,
            fired_at: clock.now(),
        }
    };

    info!(
        generation,
        late_ms = (fired.fired_at - deadline).num_milliseconds(),
        "Alarm fired"
    );
    on_fire(fired);
}
