//! Gradual volume increase for the local alarm sound

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Loudest volume the ramp will reach
pub const MAX_VOLUME: f32 = 1.0;

/// How the ramped session gets louder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampPolicy {
    /// Volume the local sound starts at
    #[serde(default = "default_start_volume")]
    pub start_volume: f32,

    /// Volume added on every step
    #[serde(default = "default_step")]
    pub step: f32,

    /// Time between steps in milliseconds
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
}

fn default_start_volume() -> f32 {
    0.1
}

fn default_step() -> f32 {
    0.1
}

fn default_step_interval_ms() -> u64 {
    10_000
}

impl Default for RampPolicy {
    fn default() -> Self {
        Self {
            start_volume: default_start_volume(),
            step: default_step(),
            step_interval_ms: default_step_interval_ms(),
        }
    }
}

impl RampPolicy {
    /// Volume after `steps` steps, capped at [`MAX_VOLUME`]
    pub fn volume_at(&self, steps: u32) -> f32 {
        (self.start_volume + self.step * steps as f32).min(MAX_VOLUME)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.start_volume > 0.0 && self.start_volume <= MAX_VOLUME) {
            return Err(ConfigError::InvalidValue(format!(
                "ramp.start_volume must be in (0, 1], got {}",
                self.start_volume
            )));
        }
        if !(self.step > 0.0 && self.step <= MAX_VOLUME) {
            return Err(ConfigError::InvalidValue(format!(
                "ramp.step must be in (0, 1], got {}",
                self.step
            )));
        }
        if self.step_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "ramp.step_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A running ramp loop
///
/// Dropping the handle also halts the loop.
#[derive(Debug)]
pub struct RampHandle {
    halt: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl RampHandle {
    /// Ask the loop to stop before its next step
    pub fn halt(self) {
        let _ = self.halt.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Start stepping the volume on a background thread
///
/// `apply` is called with each new volume and returns `false` once the
/// playback it drives is gone. The loop ends then, when halted, or after the
/// maximum volume has been applied.
pub fn spawn<F>(policy: RampPolicy, mut apply: F) -> std::io::Result<RampHandle>
where
    F: FnMut(f32) -> bool + Send + 'static,
{
    let (halt, halted) = mpsc::channel::<()>();
    let interval = policy.interval();

    let thread = thread::Builder::new()
        .name("alarm-ramp".to_string())
        .spawn(move || {
            let mut steps = 0u32;
            loop {
                match halted.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!(steps, "Volume ramp halted");
                        return;
                    }
                }

                steps += 1;
                let volume = policy.volume_at(steps);
                if !apply(volume) {
                    debug!(steps, "Playback gone, volume ramp stopped");
                    return;
                }
                if volume >= MAX_VOLUME {
                    debug!(steps, "Volume ramp reached maximum");
                    return;
                }
            }
        })?;

    Ok(RampHandle { halt, thread })
}
