// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depthview::Config;
use depthview::backends::BackendType;
use depthview::errors::ConfigError;
use depthview::media::{PixelFormat, StreamKind};
use depthview::pipeline::OverflowPolicy;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.backend, BackendType::Synthetic);
    assert_eq!(config.device_index, 0);
    assert_eq!(config.queue.capacity, 10);
    assert_eq!(config.queue.wait_timeout_ms, 500);
    assert_eq!((config.window.width, config.window.height), (1280, 960));
    assert_eq!(config.max_depth_m, 2.0);
    assert!(config.snapshot_dir.is_none());
}

#[test]
fn test_config_default_streams() {
    let config = Config::default();
    let kinds: Vec<StreamKind> = config.streams.iter().map(|s| s.stream).collect();
    assert_eq!(
        kinds,
        vec![StreamKind::Depth, StreamKind::Infrared, StreamKind::Color]
    );
    assert_eq!(config.streams[0].format, PixelFormat::Z16);
    assert!(config.streams.iter().all(|s| s.width == 640 && s.height == 480 && s.fps == 30));
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.queue.capacity = 3;
    config.queue.overflow = OverflowPolicy::Block;
    config.streams.truncate(1);
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_file_uses_readable_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    Config::default().save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"drop-oldest\""));
    assert!(text.contains("\"depth\""));
    assert!(text.contains("\"Z16\""));
}

#[test]
fn test_load_or_default_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("missing.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_reports_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    match Config::load(&path) {
        Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "queue": { "capacity": 0 } }"#).unwrap();

    assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
}
