use std::fs;

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn path_without_file_name_falls_back_to_stderr() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("logs");
    fs::create_dir(&nested).unwrap();

    // `logs/..` names a directory, not a file.
    fade_ink::logging::init(true, Some(nested.join("..")));
    tracing::info!("still logging");

    assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    assert!(dir.path().join("logs").is_dir());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
