//! Terminal control surface
//!
//! One command per line:
//!
//! ```text
//! set [HH:MM] [feed-url]   arm the alarm (defaults from the config file)
//! cancel                   call off a pending alarm
//! snooze                   ring again after the snooze duration
//! stop                     silence the alarm
//! snooze+ / snooze-        adjust the snooze duration by one minute
//! feed <url>|none          choose the podcast for the next alarm
//! status | help | quit
//! ```

use thiserror::Error;

use crate::alarm::parse_time;
use crate::error::AlarmError;

/// Usage text printed by `help`
pub const HELP: &str = "\
Commands:
  set [HH:MM] [feed-url]  arm the alarm
  cancel                  call off a pending alarm
  snooze                  snooze a ringing alarm
  stop                    silence the alarm
  snooze+ | snooze-       lengthen or shorten the snooze by a minute
  feed <url>|none         podcast for the next alarm
  status                  show the alarm state
  help                    show this text
  quit                    exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        time: Option<(u32, u32)>,
        feed_url: Option<String>,
    },
    Cancel,
    Snooze,
    Stop,
    SnoozeLonger,
    SnoozeShorter,
    /// `None` clears the feed
    Feed(Option<String>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error(transparent)]
    InvalidTime(#[from] AlarmError),
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "set" => parse_set(&args)?,
            "cancel" => no_args(Command::Cancel, &args)?,
            "snooze" => no_args(Command::Snooze, &args)?,
            "stop" => no_args(Command::Stop, &args)?,
            "snooze+" => no_args(Command::SnoozeLonger, &args)?,
            "snooze-" => no_args(Command::SnoozeShorter, &args)?,
            "feed" => match args.as_slice() {
                [] => {
                    return Err(CommandError::MissingArgument {
                        command: "feed",
                        expected: "a URL or 'none'",
                    })
                }
                [url] if url.eq_ignore_ascii_case("none") => Command::Feed(None),
                [url] => Command::Feed(Some((*url).to_string())),
                [_, extra, ..] => return Err(CommandError::UnexpectedArgument((*extra).to_string())),
            },
            "status" => no_args(Command::Status, &args)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}

fn no_args(command: Command, args: &[&str]) -> Result<Command, CommandError> {
    match args.first() {
        Some(extra) => Err(CommandError::UnexpectedArgument((*extra).to_string())),
        None => Ok(command),
    }
}

fn parse_set(args: &[&str]) -> Result<Command, CommandError> {
    let (time, rest) = match args.split_first() {
        Some((first, rest)) if !first.contains("://") => (Some(parse_time(first)?), rest),
        _ => (None, args),
    };

    let feed_url = match rest {
        [] => None,
        [url] => Some((*url).to_string()),
        [_, extra, ..] => return Err(CommandError::UnexpectedArgument((*extra).to_string())),
    };

    Ok(Command::Set { time, feed_url })
}
