//! replay - run a recorded detection log through the confirmation engine.
//!
//! Input is JSON lines, one frame per line:
//!
//! ```text
//! {"t": 0.25, "labels": ["dog", "poop"]}
//! {"t": 0.50, "pred": [[12, 40, 80, 96, 0.91, 1]]}
//! ```
//!
//! `t` is seconds since the start of the recording. `pred` rows are decoded
//! with `--labels`. Time is simulated, so a one-hour log replays instantly.
//! Every confirmed event is printed to stdout as a JSON line. Notifications
//! are logged, never sent.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use detection_alert::alert::AlertSinks;
use detection_alert::{
    decode_predictions, AlertDispatcher, AlertdConfig, ConfirmationEngine, DetectionResult,
    FireOutcome, Frame, LogNotifier, ManualClock, Sentinel, Step, TaskPool,
};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a detection log through the confirmation engine")]
struct Args {
    /// Detection log (JSON lines). Use '-' for stdin.
    input: PathBuf,

    /// Config file supplying engine and alert settings.
    #[arg(long, env = "ALERTD_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated class labels, indexed by prediction class id.
    #[arg(long, default_value = "")]
    labels: String,

    /// Ignore prediction rows below this confidence.
    #[arg(long, default_value_t = 0.0)]
    min_confidence: f32,

    #[arg(long)]
    confirm_secs: Option<f64>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    grace_secs: Option<f64>,

    #[arg(long)]
    target_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    t: f64,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    pred: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Serialize)]
struct ConfirmationReport {
    line: usize,
    t: f64,
    average: f64,
    alert: &'static str,
    since_last_secs: Option<f64>,
}

/// Drives the engine from log lines on a simulated clock.
struct Replayer {
    sentinel: Sentinel,
    clock: Arc<ManualClock>,
    pool: Arc<TaskPool>,
    labels: Vec<String>,
    min_confidence: f32,
    frame: Frame,
    last_t: f64,
    frames: usize,
    confirmations: usize,
}

impl Replayer {
    fn new(cfg: &AlertdConfig, labels: Vec<String>, min_confidence: f32) -> Result<Self> {
        let mut alerts = cfg.alert_settings()?;
        alerts.sound_enabled = false;
        alerts.notify_with_image = false;

        let clock = Arc::new(ManualClock::new());
        let pool = Arc::new(TaskPool::new(1, cfg.queue_depth)?);
        let sinks = AlertSinks {
            notifier: Some(Arc::new(LogNotifier)),
            ..AlertSinks::default()
        };
        let dispatcher = AlertDispatcher::new(alerts, clock.clone(), pool.clone(), sinks)?;
        let engine = ConfirmationEngine::new(cfg.engine_settings()?, clock.clone(), dispatcher)?;

        Ok(Self {
            sentinel: Sentinel::new(engine),
            clock,
            pool,
            labels,
            min_confidence,
            frame: Frame::blank(1, 1),
            last_t: 0.0,
            frames: 0,
            confirmations: 0,
        })
    }

    /// Decode one log line. Blank lines yield `None`; `pred` wins over `labels`.
    fn parse_line(
        &mut self,
        line_no: usize,
        line: &str,
    ) -> Result<Option<(Duration, DetectionResult)>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let record: ReplayRecord = serde_json::from_str(line)
            .map_err(|e| anyhow!("line {}: invalid record: {}", line_no, e))?;
        if !record.t.is_finite() || record.t < self.last_t {
            return Err(anyhow!(
                "line {}: timestamp {} is not after the previous frame ({})",
                line_no,
                record.t,
                self.last_t
            ));
        }
        let at = Duration::try_from_secs_f64(record.t)
            .map_err(|e| anyhow!("line {}: timestamp out of range: {}", line_no, e))?;

        let detection = match &record.pred {
            Some(rows) => decode_predictions(rows, &self.labels, self.min_confidence)
                .map_err(|e| anyhow!("line {}: {}", line_no, e))?,
            None => DetectionResult::from_labels(record.labels),
        };
        self.last_t = record.t;
        Ok(Some((at, detection)))
    }

    fn feed_line(&mut self, line_no: usize, line: &str) -> Result<Option<ConfirmationReport>> {
        let Some((at, detection)) = self.parse_line(line_no, line)? else {
            return Ok(None);
        };
        self.clock.set(at);
        self.frames += 1;

        let Step::Confirmed { average, alert } = self.sentinel.process(&detection, &self.frame)
        else {
            return Ok(None);
        };
        self.confirmations += 1;
        let (alert, since_last_secs) = match alert {
            FireOutcome::Dispatched { .. } => ("dispatched", None),
            FireOutcome::Suppressed { since_last } => {
                ("suppressed", Some(since_last.as_secs_f64()))
            }
        };
        Ok(Some(ConfirmationReport {
            line: line_no,
            t: self.last_t,
            average,
            alert,
            since_last_secs,
        }))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut cfg = AlertdConfig::load_from(args.config.as_deref())?;
    if let Some(secs) = args.confirm_secs {
        cfg.confirm_secs = secs;
    }
    if let Some(threshold) = args.threshold {
        cfg.confirm_threshold = threshold;
    }
    if let Some(grace) = args.grace_secs {
        cfg.grace_period_secs = grace;
    }
    if let Some(label) = args.target_label {
        cfg.detector.target_label = label;
    }
    cfg.sound_enabled = false;
    cfg.notify_with_image = false;
    cfg.validate()?;

    let labels: Vec<String> = args
        .labels
        .split(',')
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();
    let mut replayer = Replayer::new(&cfg, labels, args.min_confidence)?;

    let reader: Box<dyn BufRead> = if args.input.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(&args.input)
            .with_context(|| format!("open {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("read line {}", line_no))?;
        if let Some(report) = replayer.feed_line(line_no, &line)? {
            serde_json::to_writer(&mut out, &report)?;
            writeln!(out)?;
        }
    }

    replayer.pool.wait_idle(DRAIN_TIMEOUT);
    eprintln!(
        "replayed {} frames, {} confirmations, final fps estimate {:.2}",
        replayer.frames,
        replayer.confirmations,
        replayer.sentinel.engine().rate()
    );
    Ok(())
}
