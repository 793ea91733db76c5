use std::{fs, thread, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn info_level_ignores_rust_log_and_keeps_writing_after_init() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ink.log");

    std::env::set_var("RUST_LOG", "trace");
    fade_ink::logging::init(false, Some(path.clone()));

    // Log from another thread once `init` has long returned; the writer must
    // still be alive.
    thread::spawn(|| {
        thread::sleep(Duration::from_millis(20));
        tracing::debug!("debug-line-should-be-filtered");
        tracing::info!("info-line-from-worker");
    })
    .join()
    .unwrap();

    thread::sleep(Duration::from_millis(150));

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("info-line-from-worker"));
    assert!(!contents.contains("debug-line-should-be-filtered"));
}
