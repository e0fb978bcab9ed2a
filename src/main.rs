// Reveille - terminal alarm clock
// Commands come in on stdin, the clock line refreshes once a second

use anyhow::{Context, Result};
use calloop::{
    channel::{self, Channel},
    signals::{Signal, Signals},
    timer::{TimeoutAction, Timer},
    EventLoop, LoopSignal,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reveille::{
    alarm::AlarmState,
    command::{Command, HELP},
    AlarmConfig, AlarmController, AlarmStatus, AudioPlayer, Config, ConfigWatcher, Display,
    HttpFeedResolver, SystemClock, TerminalDisplay,
};

/// Main application state
struct App {
    controller: AlarmController,
    display: Arc<TerminalDisplay>,

    // Settings file and hot reload
    config: Config,
    config_path: PathBuf,
    watcher: Option<ConfigWatcher>,

    /// What the next `set` arms
    draft: AlarmConfig,
    /// Reloaded defaults waiting for the alarm to go idle
    pending_draft: Option<AlarmConfig>,

    signal: LoopSignal,
}

impl App {
    fn handle_line(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(Some(command)) => self.handle_command(command),
            Ok(None) => {}
            Err(e) => self.display.show_error(&e.to_string()),
        }
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, "Handling command");

        let result = match command {
            Command::Set { time, feed_url } => self.set(time, feed_url),
            Command::Cancel => self.controller.cancel().map(|()| {
                if let Some(config) = self.controller.last_config() {
                    self.draft = config;
                }
            }),
            Command::Snooze => self.controller.snooze().map(|_| ()),
            Command::Stop => self.controller.stop(),
            Command::SnoozeLonger => {
                self.draft = self.draft.snooze_increased(&self.config.snooze);
                self.report_snooze();
                Ok(())
            }
            Command::SnoozeShorter => {
                self.draft = self.draft.snooze_decreased(&self.config.snooze);
                self.report_snooze();
                Ok(())
            }
            Command::Feed(url) => {
                self.draft = self.draft.with_feed(url);
                self.display.show_message(&format!(
                    "Next alarm plays: {}",
                    self.draft.feed_url().unwrap_or("default sound")
                ));
                Ok(())
            }
            Command::Status => {
                let status = self.controller.status();
                self.display.show_message(&describe(&status, &self.draft));
                Ok(())
            }
            Command::Help => {
                self.display.show_message(HELP);
                Ok(())
            }
            Command::Quit => {
                tracing::info!("Quit requested");
                self.shutdown();
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Command rejected");
            self.display.show_error(&e.to_string());
        }
    }

    fn set(&mut self, time: Option<(u32, u32)>, feed_url: Option<String>) -> reveille::error::Result<()> {
        let mut config = self.draft.clone();
        if let Some((hour, minute)) = time {
            config = config.with_time(hour, minute)?;
        }
        if feed_url.is_some() {
            config = config.with_feed(feed_url);
        }

        self.controller.set_alarm(config.clone())?;
        self.draft = config;
        Ok(())
    }

    fn report_snooze(&self) {
        let mut message = format!("Snooze duration: {} min", self.draft.snooze_minutes());
        if self.controller.state() != AlarmState::Idle {
            message.push_str(" (applies to the next alarm)");
        }
        self.display.show_message(&message);
    }

    /// Once-a-second housekeeping
    fn tick(&mut self) {
        self.poll_config();

        if self.controller.state().accepts_config() {
            if let Some(draft) = self.pending_draft.take() {
                tracing::info!(time = %draft.time_label(), "Applying reloaded alarm defaults");
                self.draft = draft;
            }
        }

        self.controller.refresh();
    }

    fn poll_config(&mut self) {
        let Some(event) = self.watcher.as_ref().and_then(ConfigWatcher::try_recv) else {
            return;
        };

        match Config::load_from(&event.path) {
            Ok(config) => match config.draft_alarm() {
                Ok(draft) => {
                    tracing::info!(path = %event.path.display(), "Config reloaded");
                    self.config = config;
                    self.pending_draft = Some(draft);
                }
                Err(e) => self.display.show_error(&e.to_string()),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid config file, keeping previous settings");
                self.display.show_error(&format!("Config not reloaded: {}", e));
            }
        }
    }

    fn shutdown(&mut self) {
        if matches!(self.controller.state(), AlarmState::Ringing | AlarmState::Snoozing) {
            if let Err(e) = self.controller.stop() {
                tracing::warn!(error = %e, "Failed to stop alarm on exit");
            }
        }
        self.signal.stop();
    }
}

fn describe(status: &AlarmStatus, draft: &AlarmConfig) -> String {
    let mut line = format!("State: {}", status.state);

    if let Some(deadline) = status.deadline {
        line.push_str(&format!(", next ring {}", deadline.format("%Y-%m-%d %H:%M:%S")));
    }
    if let Some(volume) = status.volume {
        let mode = if status.streamed { "podcast" } else { "ramping" };
        line.push_str(&format!(", volume {:.0}% ({})", volume * 100.0, mode));
    }

    let config = status.config.as_ref().unwrap_or(draft);
    line.push_str(&format!(
        "\nAlarm {}, snooze {} min, sound: {}",
        config.time_label(),
        config.snooze_minutes(),
        config.feed_url().unwrap_or("default")
    ));
    line
}

/// Forward stdin lines into the event loop
fn spawn_stdin_reader() -> Result<Channel<String>> {
    let (sender, channel) = channel::channel();

    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn stdin reader")?;

    Ok(channel)
}

fn main() -> Result<()> {
    // Logs go to stderr, stdout is the display
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Reveille");

    let config_path = Config::config_path()?;
    let config = Config::load_or_create(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let draft = config.draft_alarm()?;
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    let sink = AudioPlayer::new(Duration::from_secs(config.feed.download_timeout_secs))
        .context("Failed to initialize audio output")?;
    let resolver = HttpFeedResolver::new(&config.feed).context("Failed to initialize feed resolver")?;
    let display = Arc::new(TerminalDisplay::stdout());

    let controller = AlarmController::new(
        Arc::new(SystemClock),
        Arc::new(sink),
        Arc::new(resolver),
        display.clone(),
        config.controller_settings(),
    );

    let watcher = match ConfigWatcher::new(config_path.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let mut event_loop = EventLoop::<App>::try_new().context("Failed to create event loop")?;
    let handle = event_loop.handle();

    let mut app = App {
        controller,
        display,
        config,
        config_path,
        watcher,
        draft,
        pending_draft: None,
        signal: event_loop.get_signal(),
    };

    handle
        .insert_source(spawn_stdin_reader()?, |event, _, app| match event {
            channel::Event::Msg(line) => app.handle_line(&line),
            channel::Event::Closed => {
                tracing::info!("stdin closed, exiting");
                app.shutdown();
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to insert stdin source: {:?}", e.error))?;

    handle
        .insert_source(Timer::immediate(), |_deadline, _metadata, app| {
            app.tick();
            TimeoutAction::ToDuration(Duration::from_secs(1))
        })
        .map_err(|e| anyhow::anyhow!("Failed to insert timer source: {:?}", e.error))?;

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])
        .context("Failed to create signal handler for graceful shutdown")?;
    handle
        .insert_source(signals, |event, _metadata, app| {
            tracing::info!(signal = ?event.signal(), "Received signal, exiting gracefully");
            app.shutdown();
        })
        .map_err(|e| anyhow::anyhow!("Failed to insert signal handler: {:?}", e.error))?;

    app.display.show_message(HELP);
    tracing::info!(config = %app.config_path.display(), "Event loop starting");

    event_loop
        .run(None::<Duration>, &mut app, |_| {})
        .context("Event loop dispatch error")?;

    tracing::info!("Reveille stopped");
    Ok(())
}
