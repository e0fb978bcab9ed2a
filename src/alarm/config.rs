//! User intent for one alarm cycle

use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};

/// Lowest snooze duration the alarm accepts, in minutes
pub const MIN_SNOOZE_MINUTES: u32 = 1;

/// What the user asked for: wake-up time, snooze length and optional podcast
///
/// Values are validated on construction, so a config that exists is always
/// armable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmConfig {
    hour: u32,
    minute: u32,
    snooze_minutes: u32,
    feed_url: Option<String>,
}

impl AlarmConfig {
    /// Build a validated config
    ///
    /// A blank feed URL counts as no feed.
    pub fn new(hour: u32, minute: u32, snooze_minutes: u32, feed_url: Option<String>) -> Result<Self> {
        validate_time(hour, minute)?;
        if snooze_minutes < MIN_SNOOZE_MINUTES {
            return Err(AlarmError::InvalidSnooze {
                got: snooze_minutes,
                min: MIN_SNOOZE_MINUTES,
            });
        }

        Ok(Self {
            hour,
            minute,
            snooze_minutes,
            feed_url: normalize_feed(feed_url),
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn snooze_minutes(&self) -> u32 {
        self.snooze_minutes
    }

    pub fn feed_url(&self) -> Option<&str> {
        self.feed_url.as_deref()
    }

    /// Same config with a different wake-up time
    pub fn with_time(&self, hour: u32, minute: u32) -> Result<Self> {
        validate_time(hour, minute)?;
        Ok(Self {
            hour,
            minute,
            ..self.clone()
        })
    }

    /// Same config bound to a different feed (or none)
    pub fn with_feed(&self, feed_url: Option<String>) -> Self {
        Self {
            feed_url: normalize_feed(feed_url),
            ..self.clone()
        }
    }

    /// One minute longer snooze, limited by `policy`
    pub fn snooze_increased(&self, policy: &SnoozePolicy) -> Self {
        Self {
            snooze_minutes: policy.clamp(self.snooze_minutes.saturating_add(1)),
            ..self.clone()
        }
    }

    /// One minute shorter snooze, never below the policy minimum
    pub fn snooze_decreased(&self, policy: &SnoozePolicy) -> Self {
        Self {
            snooze_minutes: policy.clamp(self.snooze_minutes.saturating_sub(1)),
            ..self.clone()
        }
    }

    /// Wake-up time as `HH:MM`
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Bounds applied when the user adjusts the snooze length
///
/// No upper bound by default; a maximum can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozePolicy {
    #[serde(default = "default_min_minutes")]
    pub min_minutes: u32,

    #[serde(default)]
    pub max_minutes: Option<u32>,
}

fn default_min_minutes() -> u32 {
    MIN_SNOOZE_MINUTES
}

impl Default for SnoozePolicy {
    fn default() -> Self {
        Self {
            min_minutes: MIN_SNOOZE_MINUTES,
            max_minutes: None,
        }
    }
}

impl SnoozePolicy {
    /// Clamp a snooze length into the allowed range
    pub fn clamp(&self, minutes: u32) -> u32 {
        let floor = self.min_minutes.max(MIN_SNOOZE_MINUTES);
        let minutes = minutes.max(floor);
        match self.max_minutes {
            Some(max) => minutes.min(max.max(floor)),
            None => minutes,
        }
    }
}

fn validate_time(hour: u32, minute: u32) -> Result<()> {
    if hour > 23 || minute > 59 {
        return Err(AlarmError::InvalidDeadline { hour, minute });
    }
    Ok(())
}

fn normalize_feed(feed_url: Option<String>) -> Option<String> {
    feed_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Parse a wake-up time written as `H:MM` or `HH:MM`
pub fn parse_time(input: &str) -> Result<(u32, u32)> {
    let unparsable = || AlarmError::UnparsableTime(input.to_string());

    let (hour, minute) = input.trim().split_once(':').ok_or_else(unparsable)?;
    let hour: u32 = hour.trim().parse().map_err(|_| unparsable())?;
    let minute: u32 = minute.trim().parse().map_err(|_| unparsable())?;

    validate_time(hour, minute)?;
    Ok((hour, minute))
}
