//! Visual presentation of the alarm
//!
//! The controller reports what happened; a [`Display`] decides how it looks.
//! [`TerminalDisplay`] keeps a live clock on one line and prints events as
//! separate lines.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Local};
use tracing::warn;

/// Receives alarm events for presentation. Holds no alarm state.
pub trait Display: Send + Sync {
    /// Refresh the wall clock
    fn show_time(&self, now: DateTime<Local>);

    /// An alarm was armed for `deadline`
    fn show_next_alarm(&self, deadline: DateTime<Local>);

    /// Time left until a snoozed alarm rings again
    fn show_countdown(&self, remaining: Duration);

    fn show_ringing(&self);

    /// Nothing is scheduled any more
    fn show_idle(&self);

    /// Something went wrong that the user should know about
    fn show_error(&self, message: &str);
}

/// Format a snooze countdown, e.g. `Snoozing… 4 min 59 sec left`
///
/// Negative durations show as zero.
pub fn format_countdown(remaining: Duration) -> String {
    let total_seconds = remaining.num_seconds().max(0);
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("Snoozing… {} min {} sec left", minutes, seconds)
}

/// Format an armed deadline relative to `now`
pub fn format_next_alarm(deadline: DateTime<Local>, now: DateTime<Local>) -> String {
    let day = if deadline.date_naive() == now.date_naive() {
        "today"
    } else {
        "tomorrow"
    };
    format!("Alarm set for {} {}", deadline.format("%H:%M"), day)
}

struct Screen<W> {
    out: W,
    /// A clock line is showing without a trailing newline
    mid_line: bool,
}

/// Line-oriented display for a terminal
pub struct TerminalDisplay<W: Write + Send = io::Stdout> {
    screen: Mutex<Screen<W>>,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            screen: Mutex::new(Screen { out, mid_line: false }),
        }
    }

    /// Take back the writer, e.g. to inspect captured output
    pub fn into_inner(self) -> W {
        self.screen
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }

    /// Print a free-form line, e.g. a status report or help text
    pub fn show_message(&self, message: &str) {
        self.write_line(message);
    }

    fn write_line(&self, line: &str) {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        let prefix = if screen.mid_line { "\n" } else { "" };
        screen.mid_line = false;
        if let Err(e) = writeln!(screen.out, "{}{}", prefix, line).and_then(|_| screen.out.flush()) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write + Send> Display for TerminalDisplay<W> {
    fn show_time(&self, now: DateTime<Local>) {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        screen.mid_line = true;
        if let Err(e) = write!(screen.out, "\r{}", now.format("%H:%M:%S")).and_then(|_| screen.out.flush()) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }

    fn show_next_alarm(&self, deadline: DateTime<Local>) {
        self.write_line(&format_next_alarm(deadline, Local::now()));
    }

    fn show_countdown(&self, remaining: Duration) {
        self.write_line(&format_countdown(remaining));
    }

    fn show_ringing(&self) {
        self.write_line("Wake up! Alarm is ringing (snooze / stop)");
    }

    fn show_idle(&self) {
        self.write_line("No alarm set");
    }

    fn show_error(&self, message: &str) {
        self.write_line(&format!("Error: {}", message));
    }
}
