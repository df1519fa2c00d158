//! alertd - detection confirmation daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured source (stub, HTTP snapshot, MJPEG)
//! 2. Runs the configured detector backend on each frame
//! 3. Feeds "target present" bits into the confirmation engine
//! 4. On a confirmed event, plays a sound and/or pushes a notification,
//!    at most once per grace period
//!
//! Side effects run on a worker pool and never stall the frame loop.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use detection_alert::alert::AlertSinks;
use detection_alert::ingest::frame_interval;
use detection_alert::{
    build_backend, AlertDispatcher, AlertdConfig, AudioPlayer, Clock, CommandAudioPlayer,
    ConfirmationEngine, FireOutcome, FrameSource, FrameStore, JpegFrameStore, LogNotifier,
    Notifier, PushbulletNotifier, Sentinel, Step, SystemClock, TaskPool,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(author, version, about = "Confirm sustained detections and raise alerts")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ALERTD_CONFIG")]
    config: Option<PathBuf>,

    /// Sound file to play on a confirmed event.
    #[arg(long)]
    sound: Option<PathBuf>,

    /// Disable the sound alert.
    #[arg(long)]
    no_alert: bool,

    /// Disable push notifications.
    #[arg(long)]
    no_notify: bool,

    /// Attach a snapshot of the confirming frame to the notification.
    #[arg(long)]
    notify_img: bool,

    /// Log notifications instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AlertdConfig::load_from(args.config.as_deref())?;
    if let Some(sound) = args.sound {
        cfg.sound_path = sound;
    }
    if args.no_alert {
        cfg.sound_enabled = false;
    }
    if args.no_notify {
        cfg.notify_enabled = false;
    }
    if args.notify_img {
        cfg.notify_with_image = true;
    }
    cfg.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let pool = Arc::new(TaskPool::new(cfg.workers, cfg.queue_depth)?);
    let sinks = build_sinks(&cfg, args.dry_run)?;
    let dispatcher = AlertDispatcher::new(cfg.alert_settings()?, clock.clone(), pool.clone(), sinks)?;
    let engine = ConfirmationEngine::new(cfg.engine_settings()?, clock, dispatcher)?;
    let mut sentinel = Sentinel::new(engine);

    let mut backend = build_backend(&cfg.detector)?;
    backend.warm_up()?;

    let mut source = FrameSource::open(&cfg.source)?;
    source.connect()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("failed to install ctrl-c handler: {}", e))?;

    log::info!(
        "alertd running: source={} detector={} target={}",
        cfg.source.url,
        backend.name(),
        cfg.detector.target_label
    );
    log::info!(
        "confirm {:.1}s at >= {:.0}%, grace {:.0}s, sound={} notify={} image={}",
        cfg.confirm_secs,
        cfg.confirm_threshold * 100.0,
        cfg.grace_period_secs,
        cfg.sound_enabled,
        cfg.notify_enabled,
        cfg.notify_with_image
    );

    let pace = frame_interval(cfg.source.target_fps);
    let mut last_health_log = Instant::now();
    let mut confirmed = 0u64;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame capture failed: {:#}", e);
                std::thread::sleep(RECONNECT_BACKOFF);
                if let Err(e) = source.connect() {
                    log::warn!("reconnect failed: {:#}", e);
                }
                continue;
            }
        };

        let detection = match backend.detect(&frame) {
            Ok(detection) => detection,
            Err(e) => {
                log::warn!("detection failed on frame {}: {:#}", frame.sequence, e);
                continue;
            }
        };

        if let Step::Confirmed { average, alert } = sentinel.process(&detection, &frame) {
            confirmed += 1;
            match alert {
                FireOutcome::Dispatched { queued, rejected } => log::info!(
                    "event #{}: avg={:.2} alerts queued={} rejected={}",
                    confirmed,
                    average,
                    queued,
                    rejected
                ),
                FireOutcome::Suppressed { since_last } => log::info!(
                    "event #{}: avg={:.2} alert suppressed ({:.0}s since last)",
                    confirmed,
                    average,
                    since_last.as_secs_f64()
                ),
            }
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source health={} frames={} fps={:.2} window={} pending_alerts={}",
                source.is_healthy(),
                stats.frames_captured,
                sentinel.engine().rate(),
                sentinel.engine().window().capacity(),
                pool.pending()
            );
            last_health_log = Instant::now();
        }

        let spent = started.elapsed();
        if spent < pace {
            std::thread::sleep(pace - spent);
        }
    }

    log::info!("shutting down, waiting for in-flight alerts");
    if !pool.wait_idle(cfg.side_effect_timeout) {
        log::warn!("{} alert(s) still running at exit", pool.pending());
    }
    Ok(())
}

fn build_sinks(cfg: &AlertdConfig, dry_run: bool) -> Result<AlertSinks> {
    let mut sinks = AlertSinks::default();

    if cfg.sound_enabled {
        sinks.audio = Some(build_audio(cfg));
    }

    if cfg.notify_enabled {
        let notifier: Arc<dyn Notifier> = if dry_run {
            Arc::new(LogNotifier)
        } else {
            let key = cfg.pushbullet_api_key.clone().ok_or_else(|| {
                anyhow!("notifications enabled but PUSHBULLET_API_KEY is not set (use --no-notify or --dry-run)")
            })?;
            let mut pushbullet = PushbulletNotifier::new(key, cfg.side_effect_timeout)?;
            if let Some(title) = &cfg.title {
                pushbullet = pushbullet.with_title(title.clone());
            }
            Arc::new(pushbullet)
        };
        sinks.notifier = Some(notifier);

        if cfg.notify_with_image {
            let store = JpegFrameStore::new(cfg.snapshot_dir.clone(), cfg.snapshot_prefix.clone());
            log::info!("snapshots will be written to {}", store.dir().display());
            let store: Arc<dyn FrameStore> = Arc::new(store);
            sinks.frame_store = Some(store);
        }
    }

    Ok(sinks)
}

fn build_audio(cfg: &AlertdConfig) -> Arc<dyn AudioPlayer> {
    if let Some((program, rest)) = cfg.sound_command.split_first() {
        return Arc::new(CommandAudioPlayer::new(
            program.clone(),
            rest.to_vec(),
            cfg.side_effect_timeout,
        ));
    }
    #[cfg(feature = "audio-rodio")]
    {
        Arc::new(detection_alert::alert::RodioAudioPlayer::new(
            cfg.side_effect_timeout,
        ))
    }
    #[cfg(not(feature = "audio-rodio"))]
    {
        Arc::new(CommandAudioPlayer::system_default(cfg.side_effect_timeout))
    }
}
