//! CLI argument parsing and offline command tests.
//!
//! Every command loads configuration first, so each test writes a project
//! directory with heron.toml / heron.local.toml and points HOME at it to keep
//! user configuration out of the way. None of these reach a CAS server.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PROJECT: &str = r#"
[cas]
base = "https://cas.kumc.example/cas"

[oversight]
project_id = 34
executives = ["big.wig"]
survey_url = "http://bmidev1/redcap-host/surveys/"

[saa]
survey_id = 11
survey_url = "http://bmidev1/redcap-host/surveys/"
"#;

const LOCAL: &str = "[cas]\napp_secret = \"sekrit-do-not-print\"\n";

const FIXTURES: &str = r#"
[[people]]
id = "john.smith"
given_name = "John"
surname = "Smith"
email = "john.smith@js.example"
faculty = true
training = "2012-06-30"

[[people]]
id = "bill.student"
given_name = "Bill"
surname = "Student"
email = "bill.student@js.example"

[[agreements]]
email = "john.smith@js.example"
survey_id = 11

[[oversight]]
project_id = 34
record = "6373469799195807417"
candidates = ["bill.student"]
approvals = { kuh = "yes", kupi = "yes" }
"#;

// ============================================================================
// Helpers
// ============================================================================

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("heron.toml"), PROJECT).unwrap();
    fs::write(temp.path().join("heron.local.toml"), LOCAL).unwrap();
    fs::write(temp.path().join("fixtures.toml"), FIXTURES).unwrap();
    temp
}

fn heron(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("heron").unwrap();
    cmd.env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("xdg"))
        .env("RUST_LOG", "off")
        .args(["--no-color", "--project"])
        .arg(temp.path());
    cmd
}

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("heron")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("heron"));
}

#[test]
fn help_flag_lists_commands() {
    Command::cargo_bin("heron")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("login-url"));
}

#[test]
fn check_requires_fixtures() {
    let temp = project();
    heron(&temp)
        .args(["check", "john.smith"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--fixtures"));
}

#[test]
fn invalid_date_rejected() {
    let temp = project();
    heron(&temp)
        .args(["decisions", "--fixtures", "fixtures.toml", "--as-of", "yesterday"])
        .assert()
        .failure();
}

// ============================================================================
// Startup validation
// ============================================================================

#[test]
fn missing_secret_fails_before_any_work() {
    let temp = project();
    fs::remove_file(temp.path().join("heron.local.toml")).unwrap();

    heron(&temp)
        .args(["login-url", "https://heron.example.edu/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("app_secret"));
}

#[test]
fn missing_executives_fails_before_any_work() {
    let temp = project();
    fs::write(
        temp.path().join("heron.toml"),
        PROJECT.replace("executives = [\"big.wig\"]\n", ""),
    )
    .unwrap();

    heron(&temp)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("executives"));
}

// ============================================================================
// Offline commands
// ============================================================================

#[test]
fn login_url_points_at_cas() {
    let temp = project();
    heron(&temp)
        .args(["login-url", "https://heron.example.edu/"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://cas.kumc.example/cas/login?service=https%3A%2F%2Fheron.example.edu%2F",
        ));
}

#[test]
fn config_redacts_secret() {
    let temp = project();
    heron(&temp)
        .args(["config", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("sekrit-do-not-print").not());
}

#[test]
fn check_grants_trained_faculty() {
    let temp = project();
    heron(&temp)
        .current_dir(temp.path())
        .args([
            "check",
            "john.smith",
            "--fixtures",
            "fixtures.toml",
            "--as-of",
            "2012-01-01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Faculty"))
        .stdout(predicate::str::contains(
            "Access(Faculty(John Smith <john.smith@js.example>))",
        ));
}

#[test]
fn check_explains_missing_sponsorship() {
    let temp = project();
    heron(&temp)
        .current_dir(temp.path())
        .args([
            "check",
            "bill.student",
            "--fixtures",
            "fixtures.toml",
            "--as-of",
            "2012-01-01",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not sponsored"))
        .stdout(predicate::str::contains("oversight committee"))
        .stderr(predicate::str::contains("bill.student denied"));
}

#[test]
fn check_unknown_user_fails() {
    let temp = project();
    heron(&temp)
        .current_dir(temp.path())
        .args(["check", "nobody", "--fixtures", "fixtures.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("identity not found"));
}

#[test]
fn decisions_lists_incomplete_request() {
    let temp = project();
    heron(&temp)
        .current_dir(temp.path())
        .args(["decisions", "--fixtures", "fixtures.toml", "--as-of", "2012-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bill.student"))
        .stdout(predicate::str::contains("2/3"))
        .stdout(predicate::str::contains("incomplete"));
}
