use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use detection_alert::config::AlertdConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ALERTD_CONFIG",
        "ALERTD_CONFIRM_SECS",
        "ALERTD_CONFIRM_THRESHOLD",
        "ALERTD_MIN_WINDOW",
        "ALERTD_GRACE_SECS",
        "ALERTD_SOUND_PATH",
        "ALERTD_TARGET_LABEL",
        "ALERTD_SOURCE_URL",
        "PUSHBULLET_API_KEY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "engine": {
            "confirm_secs": 5.0,
            "confirm_threshold": 0.6,
            "min_window_capacity": 4,
            "rate_refresh_secs": 20
        },
        "alert": {
            "grace_period_secs": 900,
            "sound_path": "sounds/bark.wav",
            "notify_with_image": true,
            "title": "Back yard",
            "snapshot_dir": "/var/lib/alertd",
            "snapshot_prefix": "yard",
            "workers": 3
        },
        "detector": {
            "backend": "synthetic",
            "target_label": "dog",
            "probability": 0.25,
            "seed": 7
        },
        "source": {
            "url": "http://camera-1/snapshot.jpg",
            "target_fps": 5
        },
        "pushbullet": {
            "api_key": "o.from-file"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ALERTD_CONFIG", file.path());
    std::env::set_var("ALERTD_TARGET_LABEL", "poop");
    std::env::set_var("ALERTD_GRACE_SECS", "120");
    std::env::set_var("PUSHBULLET_API_KEY", "o.from-env");

    let cfg = AlertdConfig::load().expect("load config");

    assert_eq!(cfg.confirm_secs, 5.0);
    assert_eq!(cfg.confirm_threshold, 0.6);
    assert_eq!(cfg.min_window_capacity, 4);
    assert_eq!(cfg.rate_refresh_secs, 20.0);
    assert_eq!(cfg.grace_period_secs, 120.0);
    assert_eq!(cfg.sound_path, PathBuf::from("sounds/bark.wav"));
    assert!(cfg.notify_with_image);
    assert_eq!(cfg.title.as_deref(), Some("Back yard"));
    assert_eq!(cfg.snapshot_dir, PathBuf::from("/var/lib/alertd"));
    assert_eq!(cfg.snapshot_prefix, "yard");
    assert_eq!(cfg.workers, 3);
    assert_eq!(cfg.queue_depth, 8);
    assert_eq!(cfg.detector.backend, "synthetic");
    assert_eq!(cfg.detector.target_label, "poop");
    assert_eq!(cfg.detector.seed, 7);
    assert_eq!(cfg.source.url, "http://camera-1/snapshot.jpg");
    assert_eq!(cfg.source.target_fps, 5);
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.pushbullet_api_key.as_deref(), Some("o.from-env"));

    let engine = cfg.engine_settings().expect("engine settings");
    assert_eq!(engine.target_label, "poop");
    assert_eq!(engine.rate_refresh, Duration::from_secs(20));
    let alerts = cfg.alert_settings().expect("alert settings");
    assert_eq!(alerts.grace_period, Duration::from_secs(120));

    clear_env();
}

#[test]
fn loads_toml_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        [engine]
        confirm_threshold = 0.9

        [alert]
        sound_enabled = false
        sound_command = ["paplay"]
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = AlertdConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.confirm_threshold, 0.9);
    assert!(!cfg.sound_enabled);
    assert_eq!(cfg.sound_command, vec!["paplay".to_string()]);
    assert_eq!(cfg.confirm_secs, 3.0);

    clear_env();
}

#[test]
fn rejects_out_of_range_threshold_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ALERTD_CONFIRM_THRESHOLD", "1.5");
    assert!(AlertdConfig::load().is_err());

    std::env::set_var("ALERTD_CONFIRM_THRESHOLD", "most");
    let err = AlertdConfig::load().unwrap_err();
    assert!(err.to_string().contains("ALERTD_CONFIRM_THRESHOLD"), "{}", err);

    clear_env();
}

#[test]
fn rejects_non_positive_rate_refresh() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for raw in [r#"{"engine": {"rate_refresh_secs": -5.0}}"#, r#"{"engine": {"rate_refresh_secs": 0}}"#] {
        let mut file = NamedTempFile::new().expect("temp config");
        std::io::Write::write_all(&mut file, raw.as_bytes()).expect("write config");
        let err = AlertdConfig::load_from(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("rate refresh"), "{}", err);
    }

    clear_env();
}

#[test]
fn rejects_unknown_fields() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"engine": {"confirm_window": 3}}"#)
        .expect("write config");
    assert!(AlertdConfig::load_from(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn rejects_path_like_snapshot_prefix() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"alert": {"snapshot_prefix": "../etc"}}"#)
        .expect("write config");
    assert!(AlertdConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
