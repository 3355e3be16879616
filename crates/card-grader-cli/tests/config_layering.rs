//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: hardcoded defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use card_grader_test_support::SyntheticCardBuilder;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn card_grader(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("card-grader").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg-config"))
        .env("XDG_DATA_HOME", dir.join("xdg-data"));
    cmd
}

/// Temp dir with a project config and one perfect card under `cards/`.
fn project(config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".card-grader.toml"), config).unwrap();
    let cards = dir.path().join("cards");
    fs::create_dir(&cards).unwrap();
    fs::write(cards.join("card.png"), SyntheticCardBuilder::perfect().png_bytes()).unwrap();
    dir
}

fn first_record(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.lines().next().unwrap()).unwrap()
}

#[test]
fn test_project_config_applies_format() {
    let dir = project("[output]\nformat = 'json'\n");
    card_grader(dir.path())
        .arg("cards")
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn test_cli_overrides_project_config() {
    let dir = project("[output]\nformat = 'json'\n");
    card_grader(dir.path())
        .args(["--format", "jsonl", "cards"])
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_project_config_found_from_subdirectory() {
    let dir = project("[grading]\nstandard = 'BGS'\n");
    let record = first_record(card_grader(dir.path()).current_dir(dir.path().join("cards")).arg("."));
    assert_eq!(record["report"]["compliance"]["standard"], "BGS");
}

#[test]
fn test_project_config_overrides_xdg_config() {
    let dir = project("[grading]\ntarget_grade = 8\n");
    let xdg = dir.path().join("xdg-config").join("card-grader");
    fs::create_dir_all(&xdg).unwrap();
    fs::write(
        xdg.join("config.toml"),
        "[grading]\nstandard = 'BGS'\ntarget_grade = 9\n",
    )
    .unwrap();

    let record = first_record(card_grader(dir.path()).arg("cards"));
    let compliance = &record["report"]["compliance"];
    // standard from XDG, target grade from the project file
    assert_eq!(compliance["standard"], "BGS");
    assert_eq!(compliance["target_grade"], 8);
}

#[test]
fn test_invalid_config_value_warns_and_is_ignored() {
    let dir = project("[output]\nformat = 'xml'\n\n[grading]\ntarget_grade = 42\n");
    let output = card_grader(dir.path()).arg("cards").output().unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning: output.format"));
    assert!(stderr.contains("warning: grading.target_grade"));

    // falls back to JSONL and the predicted grade as target
    let stdout = String::from_utf8_lossy(&output.stdout);
    let record: Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(record["report"]["compliance"]["target_grade"], 10);
}

#[test]
fn test_bad_weights_fall_back_to_defaults() {
    let dir = project("[weights]\nedges = 0.9\ncorners = 0.9\nsurface = 0.9\ncentering = 0.9\n");
    let output = card_grader(dir.path()).arg("cards").output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("warning: weights"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let record: Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(record["report"]["components"][1]["weight"], 0.3);
}

#[test]
fn test_config_weights_apply() {
    let dir = project("[weights]\nedges = 0.25\ncorners = 0.25\nsurface = 0.25\ncentering = 0.25\n");
    let record = first_record(card_grader(dir.path()).arg("cards"));
    for component in record["report"]["components"].as_array().unwrap() {
        assert_eq!(component["weight"], 0.25);
    }
}

#[test]
fn test_config_standards_dir() {
    let dir = project("[data]\nstandards_dir = 'my-standards'\n\n[grading]\nstandard = 'house'\n");
    let standards = dir.path().join("my-standards");
    fs::create_dir(&standards).unwrap();
    fs::write(
        standards.join("house.toml"),
        "name = \"HOUSE\"\n[[tier]]\ngrade = 10\nlabel = \"Keeper\"\nmin_overall = 50.0\n",
    )
    .unwrap();

    let record = first_record(card_grader(dir.path()).arg("cards"));
    assert_eq!(record["report"]["compliance"]["standard"], "HOUSE");
}

#[test]
fn test_grade_table_override_from_config() {
    let dir = project("[grading]\ngrade_table = 'table.toml'\n");
    fs::write(
        dir.path().join("table.toml"),
        r#"
name = "two-step"
version = "7"

[[grade]]
grade = 10
min_score = 50.0
max_score = 100.0
label = "Top"

[[grade]]
grade = 1
min_score = 0.0
max_score = 49.0
label = "Bottom"
"#,
    )
    .unwrap();

    let record = first_record(card_grader(dir.path()).arg("cards"));
    assert_eq!(record["report"]["grade_table"]["name"], "two-step");
    assert_eq!(record["report"]["grade_table"]["version"], "7");
    assert_eq!(record["report"]["grade_label"], "Top");
}
