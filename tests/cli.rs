//! CLI smoke tests for the daemon shell.

use assert_cmd::Command;

#[test]
fn help_flag_prints_usage_and_exits_zero() {
    Command::cargo_bin("enforcerd")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("enforcerd"));
}

#[test]
fn version_flag_prints_version_and_exits_zero() {
    Command::cargo_bin("enforcerd")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn info_flag_prints_resolved_config_without_starting_workers() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("enforcerd.toml");
    std::fs::write(&config_path, "worker_threads = 2\n").unwrap();

    Command::cargo_bin("enforcerd")
        .unwrap()
        .arg("--config")
        .arg(&config_path)
        .arg("--info")
        .assert()
        .success()
        .stdout(predicates::str::contains("worker_threads"));
}
