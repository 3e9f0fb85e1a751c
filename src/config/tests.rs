use std::fs;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

use super::settings::Settings;
use super::{load_config, load_config_from};

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.max_retries, 3);
    assert_eq!(settings.broker.retry_delay_ms, 1000);
    assert_eq!(settings.broker.poll_interval_ms, 5);
    assert!(settings.broker.auto_create_topics);
    assert_eq!(settings.broker.dead_letter_suffix, ".dlq");
    assert_eq!(settings.log.file_name, "relaymq.log");
    assert!(!settings.log.verify_checksums_on_open);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_settings_conversions() {
    let settings = Settings::default();
    let reliable = settings.broker.reliable_config();
    assert_eq!(reliable.max_retries, 3);
    assert_eq!(reliable.retry_delay, Duration::from_secs(1));
    assert_eq!(settings.broker.poll_interval(), Duration::from_millis(5));
    assert_eq!(
        settings.log.path(),
        std::path::PathBuf::from("data").join("relaymq.log")
    );
    assert!(!settings.log.options().verify_checksums);
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    temp_env::with_vars_unset(
        [
            "RELAYMQ_BROKER__MAX_RETRIES",
            "RELAYMQ_LOG__DATA_DIR",
            "RELAYMQ_LOGGING__LEVEL",
        ],
        || {
            let dir = TempDir::new().unwrap();
            let missing = dir.path().join("absent");
            let cfg = load_config_from(missing.to_str().unwrap()).unwrap();
            assert_eq!(cfg, Settings::default());
        },
    );
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let toml = r#"
        [broker]
        max_retries = 7
        retry_delay_ms = 250
        dead_letter_suffix = "-dead"

        [log]
        data_dir = "/var/lib/relaymq"
        verify_checksums_on_open = true
    "#;
    let file = dir.path().join("relaymq.toml");
    fs::write(&file, toml).unwrap();

    let base = dir.path().join("relaymq");
    let cfg = load_config_from(base.to_str().unwrap()).unwrap();
    assert_eq!(cfg.broker.max_retries, 7);
    assert_eq!(cfg.broker.retry_delay_ms, 250);
    assert_eq!(cfg.broker.dead_letter_suffix, "-dead");
    // untouched keys keep defaults
    assert_eq!(cfg.broker.poll_interval_ms, 5);
    assert_eq!(cfg.log.data_dir, "/var/lib/relaymq");
    assert_eq!(cfg.log.file_name, "relaymq.log");
    assert!(cfg.log.verify_checksums_on_open);
}

#[test]
#[serial]
fn load_config_from_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("RELAYMQ_BROKER__MAX_RETRIES", Some("9")),
            ("RELAYMQ_BROKER__AUTO_CREATE_TOPICS", Some("false")),
            ("RELAYMQ_LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().unwrap();
            assert_eq!(cfg.broker.max_retries, 9);
            assert!(!cfg.broker.auto_create_topics);
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(cfg.broker.retry_delay_ms, 1000);
        },
    );
}
