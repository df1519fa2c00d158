use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::alert::{AlertSettings, DEFAULT_GRACE_PERIOD, DEFAULT_MESSAGE};
use crate::confirm::{
    EngineSettings, DEFAULT_CONFIRM_SECS, DEFAULT_CONFIRM_THRESHOLD, DEFAULT_MIN_WINDOW_CAPACITY,
    DEFAULT_RATE_REFRESH,
};

const DEFAULT_TARGET_LABEL: &str = "poop";
const DEFAULT_SOUND_PATH: &str = "alert.wav";
const DEFAULT_SNAPSHOT_DIR: &str = "temp";
const DEFAULT_SNAPSHOT_PREFIX: &str = "poop";
const DEFAULT_SIDE_EFFECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WORKERS: usize = 2;
/// Sound and notification each need a worker so neither waits on the other.
const MIN_ALERT_WORKERS: usize = 2;
const DEFAULT_QUEUE_DEPTH: usize = 8;
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR_BACKEND: &str = "scripted";
const DEFAULT_DETECTOR_PATTERN: &str = "0";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertdConfigFile {
    engine: Option<EngineConfigFile>,
    alert: Option<AlertConfigFile>,
    detector: Option<DetectorConfigFile>,
    source: Option<SourceConfigFile>,
    pushbullet: Option<PushbulletConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    confirm_secs: Option<f64>,
    confirm_threshold: Option<f64>,
    min_window_capacity: Option<usize>,
    rate_refresh_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertConfigFile {
    grace_period_secs: Option<f64>,
    sound_enabled: Option<bool>,
    sound_path: Option<PathBuf>,
    sound_command: Option<Vec<String>>,
    notify_enabled: Option<bool>,
    notify_with_image: Option<bool>,
    title: Option<String>,
    message: Option<String>,
    snapshot_dir: Option<PathBuf>,
    snapshot_prefix: Option<String>,
    side_effect_timeout_secs: Option<u64>,
    workers: Option<usize>,
    queue_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    target_label: Option<String>,
    pattern: Option<String>,
    probability: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PushbulletConfigFile {
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AlertdConfig {
    pub confirm_secs: f64,
    pub confirm_threshold: f64,
    pub min_window_capacity: usize,
    pub rate_refresh_secs: f64,
    pub grace_period_secs: f64,
    pub sound_enabled: bool,
    pub sound_path: PathBuf,
    /// External player command; the asset path is appended. Empty = platform default.
    pub sound_command: Vec<String>,
    pub notify_enabled: bool,
    pub notify_with_image: bool,
    pub title: Option<String>,
    pub message: String,
    pub snapshot_dir: PathBuf,
    pub snapshot_prefix: String,
    pub side_effect_timeout: Duration,
    pub workers: usize,
    pub queue_depth: usize,
    pub detector: DetectorSettings,
    pub source: SourceSettings,
    pub pushbullet_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub target_label: String,
    /// Presence pattern for the scripted backend, e.g. `"1110"`.
    pub pattern: String,
    /// Per-frame presence probability for the synthetic backend.
    pub probability: f64,
    pub seed: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR_BACKEND.to_string(),
            target_label: DEFAULT_TARGET_LABEL.to_string(),
            pattern: DEFAULT_DETECTOR_PATTERN.to_string(),
            probability: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            target_fps: DEFAULT_SOURCE_FPS,
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
        }
    }
}

impl Default for AlertdConfig {
    fn default() -> Self {
        // An empty file yields every default.
        Self::from_file(AlertdConfigFile::default())
    }
}

impl AlertdConfig {
    /// Load from `ALERTD_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ALERTD_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit file taking the place of `ALERTD_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => AlertdConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AlertdConfigFile) -> Self {
        let engine = file.engine.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let source = file.source.unwrap_or_default();

        Self {
            confirm_secs: engine.confirm_secs.unwrap_or(DEFAULT_CONFIRM_SECS),
            confirm_threshold: engine.confirm_threshold.unwrap_or(DEFAULT_CONFIRM_THRESHOLD),
            min_window_capacity: engine
                .min_window_capacity
                .unwrap_or(DEFAULT_MIN_WINDOW_CAPACITY),
            rate_refresh_secs: engine
                .rate_refresh_secs
                .unwrap_or(DEFAULT_RATE_REFRESH.as_secs_f64()),
            grace_period_secs: alert
                .grace_period_secs
                .unwrap_or(DEFAULT_GRACE_PERIOD.as_secs_f64()),
            sound_enabled: alert.sound_enabled.unwrap_or(true),
            sound_path: alert
                .sound_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUND_PATH)),
            sound_command: alert.sound_command.unwrap_or_default(),
            notify_enabled: alert.notify_enabled.unwrap_or(true),
            notify_with_image: alert.notify_with_image.unwrap_or(false),
            title: alert.title,
            message: alert.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            snapshot_dir: alert
                .snapshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            snapshot_prefix: alert
                .snapshot_prefix
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_PREFIX.to_string()),
            side_effect_timeout: Duration::from_secs(
                alert
                    .side_effect_timeout_secs
                    .unwrap_or(DEFAULT_SIDE_EFFECT_TIMEOUT_SECS),
            ),
            workers: alert.workers.unwrap_or(DEFAULT_WORKERS),
            queue_depth: alert.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
                target_label: detector
                    .target_label
                    .unwrap_or_else(|| DEFAULT_TARGET_LABEL.to_string()),
                pattern: detector
                    .pattern
                    .unwrap_or_else(|| DEFAULT_DETECTOR_PATTERN.to_string()),
                probability: detector.probability.unwrap_or(0.0),
                seed: detector.seed.unwrap_or(0),
            },
            source: SourceSettings {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            pushbullet_api_key: file.pushbullet.and_then(|pb| pb.api_key),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(secs) = parse_env::<f64>("ALERTD_CONFIRM_SECS", "a number of seconds")? {
            self.confirm_secs = secs;
        }
        if let Some(threshold) =
            parse_env::<f64>("ALERTD_CONFIRM_THRESHOLD", "a fraction between 0 and 1")?
        {
            self.confirm_threshold = threshold;
        }
        if let Some(min) = parse_env::<usize>("ALERTD_MIN_WINDOW", "a whole number of frames")? {
            self.min_window_capacity = min;
        }
        if let Some(grace) = parse_env::<f64>("ALERTD_GRACE_SECS", "a number of seconds")? {
            self.grace_period_secs = grace;
        }
        if let Ok(path) = std::env::var("ALERTD_SOUND_PATH") {
            if !path.trim().is_empty() {
                self.sound_path = PathBuf::from(path);
            }
        }
        if let Ok(label) = std::env::var("ALERTD_TARGET_LABEL") {
            if !label.trim().is_empty() {
                self.detector.target_label = label.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("ALERTD_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(key) = std::env::var("PUSHBULLET_API_KEY") {
            if !key.trim().is_empty() {
                self.pushbullet_api_key = Some(key);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.engine_settings()?.validate()?;
        if !self.grace_period_secs.is_finite() || self.grace_period_secs < 0.0 {
            return Err(anyhow!(
                "grace period must be a non-negative number of seconds, got {}",
                self.grace_period_secs
            ));
        }
        self.alert_settings()?.validate()?;
        validate_snapshot_prefix(&self.snapshot_prefix)?;
        if self.detector.target_label.trim().is_empty() {
            return Err(anyhow!("target label must not be empty"));
        }
        if self.workers < MIN_ALERT_WORKERS {
            return Err(anyhow!(
                "alert workers must be at least {}, got {}",
                MIN_ALERT_WORKERS,
                self.workers
            ));
        }
        if self.queue_depth == 0 {
            return Err(anyhow!("alert queue depth must be greater than zero"));
        }
        if self.side_effect_timeout.is_zero() {
            return Err(anyhow!("side effect timeout must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        if !self.rate_refresh_secs.is_finite() || self.rate_refresh_secs <= 0.0 {
            return Err(anyhow!(
                "rate refresh must be a positive number of seconds, got {}",
                self.rate_refresh_secs
            ));
        }
        let rate_refresh = Duration::try_from_secs_f64(self.rate_refresh_secs)
            .map_err(|e| anyhow!("rate refresh out of range: {}", e))?;
        Ok(EngineSettings {
            confirm_secs: self.confirm_secs,
            threshold: self.confirm_threshold,
            min_window_capacity: self.min_window_capacity,
            rate_refresh,
            target_label: self.detector.target_label.clone(),
        })
    }

    pub fn alert_settings(&self) -> Result<AlertSettings> {
        let grace_period = Duration::try_from_secs_f64(self.grace_period_secs)
            .map_err(|e| anyhow!("grace period out of range: {}", e))?;
        Ok(AlertSettings {
            grace_period,
            sound_enabled: self.sound_enabled,
            sound_path: self.sound_path.clone(),
            notify_enabled: self.notify_enabled,
            notify_with_image: self.notify_with_image,
            title: self.title.clone(),
            message: self.message.clone(),
        })
    }
}

/// Snapshot prefixes become file names, so no separators or dots.
pub fn validate_snapshot_prefix(prefix: &str) -> Result<()> {
    static PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    let re = PREFIX_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("snapshot prefix regex is valid")
    });
    if !re.is_match(prefix) {
        return Err(anyhow!(
            "snapshot prefix '{}' must be 1-64 characters of [A-Za-z0-9_-]",
            prefix
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<AlertdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_env<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        _ => Ok(None),
    }
}
