use fade_ink::draw::Color;
use fade_ink::settings::InkSettings;
use std::fs;
use tempfile::tempdir;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let settings = InkSettings::load(dir.path().join("absent.json")).unwrap();
    assert_eq!(settings, InkSettings::default());
}

#[test]
fn empty_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, "  \n").unwrap();
    assert_eq!(InkSettings::load(&path).unwrap(), InkSettings::default());
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, "{ \"fade_delay_ms\": ").unwrap();
    assert!(InkSettings::load(&path).is_err());
}

#[test]
fn saved_settings_load_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let settings = InkSettings {
        fade_delay_ms: 1200,
        fade_duration_ms: 0,
        stroke_color: Color::rgba(255, 0, 0, 200),
        stroke_width: 4,
        frame_interval_ms: 33,
        debug_logging: true,
        log_file: Some(dir.path().join("ink.log")),
    };
    settings.save(&path).unwrap();

    assert_eq!(InkSettings::load(&path).unwrap(), settings);
    let config = settings.overlay_config();
    assert_eq!(config.style.width, 4);
    assert!(config.fade.duration.is_zero());
}
