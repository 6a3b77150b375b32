// The cargo_bin! macro requires build script setup that's overkill for simple tests.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;

fn frontsim() -> Command {
    Command::new(cargo_bin("frontsim"))
}

fn checksum_line(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .lines()
        .find(|l| l.starts_with("checksum:"))
        .map(str::to_string)
        .unwrap_or_default()
}

#[test]
fn test_help_flag() {
    frontsim()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--difficulty"));
}

#[test]
fn test_short_match_prints_summary() {
    frontsim()
        .args(["--seed", "4", "--size", "48", "--nations", "2", "--bots", "2", "--humans", "1", "-t", "150"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Human 1"))
        .stdout(predicate::str::contains("checksum:"))
        .stdout(predicate::str::contains("Aurelia"))
        .stdout(predicate::str::contains("Tribe 1"));
}

#[test]
fn test_same_seed_same_checksum() {
    let run = || {
        let out = frontsim()
            .args(["--seed", "9", "--size", "48", "--nations", "2", "--bots", "1", "-t", "200"])
            .output()
            .expect("failed to execute");
        assert!(out.status.success());
        checksum_line(&out.stdout)
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn test_bad_difficulty_rejected() {
    frontsim()
        .args(["--difficulty", "nightmare", "-t", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nightmare"));
}

#[test]
fn test_missing_config_file_fails() {
    frontsim()
        .args(["--config", "/nonexistent/rules.json", "-t", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent"));
}
