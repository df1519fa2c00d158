//! Alert dispatch for confirmed events.
//!
//! `AlertDispatcher::fire` runs on the frame loop. It applies the grace-period
//! filter and queues the enabled side effects (sound, text or image
//! notification) on a `TaskPool`. It performs no I/O itself.
//!
//! The grace period is a cool-down: every confirmed edge restarts it, whether
//! or not that edge dispatched anything.

pub mod audio;
pub mod notifier;
pub mod pool;
pub mod snapshot;

use anyhow::{anyhow, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::frame::Frame;

pub use audio::{AudioPlayer, CommandAudioPlayer};
#[cfg(feature = "audio-rodio")]
pub use audio::RodioAudioPlayer;
pub use notifier::{LogNotifier, Notifier, PushbulletNotifier};
pub use pool::TaskPool;
pub use snapshot::{snapshot_file_name, FrameStore, JpegFrameStore};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(300);
pub const DEFAULT_MESSAGE: &str = "Dog pooped!";

#[derive(Clone, Debug)]
pub struct AlertSettings {
    /// Minimum spacing between dispatched alerts.
    pub grace_period: Duration,
    pub sound_enabled: bool,
    pub sound_path: PathBuf,
    pub notify_enabled: bool,
    /// Attach a snapshot of the confirming frame instead of sending text only.
    pub notify_with_image: bool,
    pub title: Option<String>,
    pub message: String,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            sound_enabled: false,
            sound_path: PathBuf::from("alert.wav"),
            notify_enabled: false,
            notify_with_image: false,
            title: None,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl AlertSettings {
    pub fn validate(&self) -> Result<()> {
        if self.sound_enabled && self.sound_path.as_os_str().is_empty() {
            return Err(anyhow!("sound alerts enabled but no sound path configured"));
        }
        if self.notify_enabled && self.message.trim().is_empty() {
            return Err(anyhow!("notification message must not be empty"));
        }
        Ok(())
    }
}

/// Side-effect capabilities handed to the dispatcher.
#[derive(Clone, Default)]
pub struct AlertSinks {
    pub notifier: Option<Arc<dyn Notifier>>,
    pub audio: Option<Arc<dyn AudioPlayer>>,
    pub frame_store: Option<Arc<dyn FrameStore>>,
}

/// What a confirmed edge led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FireOutcome {
    /// Inside the grace period; nothing was queued.
    Suppressed { since_last: Duration },
    /// Side effects queued; `rejected` counts jobs dropped by a full queue.
    Dispatched { queued: usize, rejected: usize },
}

pub struct AlertDispatcher {
    settings: AlertSettings,
    clock: Arc<dyn Clock>,
    pool: Arc<TaskPool>,
    sinks: AlertSinks,
    last_confirmed: Option<Duration>,
}

impl AlertDispatcher {
    pub fn new(
        settings: AlertSettings,
        clock: Arc<dyn Clock>,
        pool: Arc<TaskPool>,
        sinks: AlertSinks,
    ) -> Result<Self> {
        settings.validate()?;
        if settings.sound_enabled && sinks.audio.is_none() {
            return Err(anyhow!("sound alerts enabled but no audio player provided"));
        }
        if settings.notify_enabled && sinks.notifier.is_none() {
            return Err(anyhow!("notifications enabled but no notifier provided"));
        }
        if settings.notify_enabled && settings.notify_with_image && sinks.frame_store.is_none() {
            return Err(anyhow!("image notifications enabled but no frame store provided"));
        }
        // Sound and notification must run side by side.
        let effects = usize::from(settings.sound_enabled) + usize::from(settings.notify_enabled);
        if pool.workers() < effects {
            return Err(anyhow!(
                "{} side effects enabled but the alert pool has {} worker(s)",
                effects,
                pool.workers()
            ));
        }
        Ok(Self {
            settings,
            clock,
            pool,
            sinks,
            last_confirmed: None,
        })
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<TaskPool> {
        &self.pool
    }

    /// Clock reading of the most recent confirmed edge.
    pub fn last_confirmed(&self) -> Option<Duration> {
        self.last_confirmed
    }

    /// Handle one confirmed edge for `frame`. Never blocks.
    pub fn fire(&mut self, frame: &Frame) -> FireOutcome {
        let now = self.clock.now();
        let previous = self.last_confirmed.replace(now);

        if let Some(previous) = previous {
            let since_last = now.saturating_sub(previous);
            if since_last < self.settings.grace_period {
                log::debug!(
                    "alert suppressed, {:.1}s since last confirmation (grace {:.0}s)",
                    since_last.as_secs_f64(),
                    self.settings.grace_period.as_secs_f64()
                );
                return FireOutcome::Suppressed { since_last };
            }
        }

        let mut queued = 0;
        let mut rejected = 0;
        let mut tally = |accepted: bool| {
            if accepted {
                queued += 1;
            } else {
                rejected += 1;
            }
        };

        if self.settings.sound_enabled {
            if let Some(audio) = self.sinks.audio.clone() {
                let path = self.settings.sound_path.clone();
                tally(self.pool.spawn("sound alert", move || {
                    log::info!("playing alert '{}'", path.display());
                    audio.play(&path)
                }));
            }
        }

        if self.settings.notify_enabled {
            if let Some(notifier) = self.sinks.notifier.clone() {
                let message = self.settings.message.clone();
                let title = self.settings.title.clone();
                let store = self.sinks.frame_store.clone();
                match store.filter(|_| self.settings.notify_with_image) {
                    Some(store) => {
                        let snapshot = frame.snapshot();
                        tally(self.pool.spawn("image notification", move || {
                            let path = store.save(&snapshot)?;
                            log::info!("pushing text & image {}", path.display());
                            notifier.send_file(
                                &path,
                                Some(&timestamped(&message)),
                                title.as_deref(),
                            )
                        }));
                    }
                    None => {
                        tally(self.pool.spawn("text notification", move || {
                            log::info!("pushing text");
                            notifier.send_text(&timestamped(&message), title.as_deref())
                        }));
                    }
                }
            }
        }

        FireOutcome::Dispatched { queued, rejected }
    }
}

/// `"hh:mm:ss AM - message"` in local time.
fn timestamped(message: &str) -> String {
    format!("{} - {}", Local::now().format("%I:%M:%S %p"), message)
}
