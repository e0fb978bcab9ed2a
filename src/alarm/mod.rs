//! The alarm state machine
//!
//! [`AlarmScheduler`] owns the state and deadline and runs the wait loop;
//! [`AlarmController`] sits on top of it and decides what to play.

pub mod config;
pub mod controller;
pub mod deadline;
pub mod ramp;
pub mod scheduler;
pub mod state;

pub use config::{parse_time, AlarmConfig, SnoozePolicy, MIN_SNOOZE_MINUTES};
pub use controller::{AlarmController, ControllerSettings, PlaybackKind, PlaybackSession, PlaybackSource};
pub use deadline::{next_occurrence, snooze_deadline};
pub use ramp::{RampHandle, RampPolicy, MAX_VOLUME};
pub use scheduler::{AlarmScheduler, Fired, WaitHandle};
pub use state::{AlarmState, AlarmStatus};
