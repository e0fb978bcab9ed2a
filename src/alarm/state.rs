//! Alarm lifecycle states

use std::fmt;

use chrono::{DateTime, Local};

use super::config::AlarmConfig;

/// Where the single alarm currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmState {
    /// Nothing scheduled
    #[default]
    Idle,
    /// Waiting for the wake-up deadline
    Armed,
    /// Deadline reached, making noise
    Ringing,
    /// Waiting for the snooze deadline
    Snoozing,
    /// Armed wait was cancelled; settles back to idle
    Cancelled,
}

impl AlarmState {
    /// States with a live wait loop
    pub fn is_waiting(self) -> bool {
        matches!(self, AlarmState::Armed | AlarmState::Snoozing)
    }

    /// States in which a new alarm may be configured
    pub fn accepts_config(self) -> bool {
        matches!(self, AlarmState::Idle | AlarmState::Cancelled)
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlarmState::Idle => "idle",
            AlarmState::Armed => "armed",
            AlarmState::Ringing => "ringing",
            AlarmState::Snoozing => "snoozing",
            AlarmState::Cancelled => "cancelled",
        })
    }
}

/// Point-in-time view of the controller, for status lines and refresh loops
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmStatus {
    pub state: AlarmState,
    /// Next wake-up or snooze deadline while waiting
    pub deadline: Option<DateTime<Local>>,
    /// Configuration of the alarm in progress
    pub config: Option<AlarmConfig>,
    /// Volume of the current playback session
    pub volume: Option<f32>,
    /// Whether the current session is a podcast stream
    pub streamed: bool,
}
