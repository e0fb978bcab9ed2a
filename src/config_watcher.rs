// Settings file watcher for hot reload

use anyhow::{Context, Result};
use notify::{
    event::{EventKind, ModifyKind},
    Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Events closer together than this collapse into one reload
const DEBOUNCE_DURATION: Duration = Duration::from_millis(100);

/// The settings file changed on disk
#[derive(Debug, Clone)]
pub struct ConfigReloadEvent {
    pub path: PathBuf,
    pub timestamp: Instant,
}

/// Watches the settings file and reports edits
///
/// The parent directory is watched rather than the file itself, so editors
/// that save by writing a new file and renaming it over the old one are
/// still seen.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<ConfigReloadEvent>,
}

impl ConfigWatcher {
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let file_name: OsString = config_path
            .file_name()
            .with_context(|| format!("Config path has no file name: {}", config_path.display()))?
            .to_os_string();
        let directory = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let reported_path = config_path.clone();
        let mut last_event: Option<Instant> = None;

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "File watcher error");
                        return;
                    }
                };

                let relevant_kind = matches!(
                    event.kind,
                    EventKind::Create(_)
                        | EventKind::Modify(ModifyKind::Data(_))
                        | EventKind::Modify(ModifyKind::Name(_))
                        | EventKind::Modify(ModifyKind::Any)
                );
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));

                if !relevant_kind || !touches_config {
                    tracing::trace!(kind = ?event.kind, "Ignoring file event");
                    return;
                }

                let now = Instant::now();
                if let Some(last) = last_event {
                    if now.duration_since(last) < DEBOUNCE_DURATION {
                        tracing::trace!("Config change debounced");
                        return;
                    }
                }
                last_event = Some(now);

                tracing::info!(path = %reported_path.display(), "Config file changed");
                let reload = ConfigReloadEvent {
                    path: reported_path.clone(),
                    timestamp: now,
                };
                if let Err(e) = tx.send(reload) {
                    tracing::error!(error = %e, "Failed to send config reload event");
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", directory.display()))?;

        tracing::info!(path = %config_path.display(), "Config file watcher initialized");

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next pending reload, if any (non-blocking)
    ///
    /// Several queued events collapse into the most recent one.
    pub fn try_recv(&self) -> Option<ConfigReloadEvent> {
        self.receiver.try_iter().last()
    }
}
