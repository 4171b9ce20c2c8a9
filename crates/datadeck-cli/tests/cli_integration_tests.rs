//! CLI integration tests
//!
//! Each test runs against its own temporary database and config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn datadeck(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("datadeck").expect("binary exists");
    cmd.env("DATADECK_CONFIG_DIR", tmp.path().join("config"));
    cmd.arg("--database");
    cmd.arg(tmp.path().join("test.db"));
    cmd
}

#[test]
fn test_help() {
    Command::cargo_bin("datadeck")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("student"));
}

#[test]
fn test_doctor_initializes_database() {
    let tmp = TempDir::new().unwrap();
    datadeck(&tmp)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("Health: ok"))
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn test_seed_is_idempotent() {
    let tmp = TempDir::new().unwrap();

    datadeck(&tmp)
        .arg("seed")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo_teacher"));

    datadeck(&tmp)
        .arg("seed")
        .assert()
        .success()
        .stdout(predicate::str::contains("already seeded"));
}

#[test]
fn test_session_commands_require_acting_user() {
    let tmp = TempDir::new().unwrap();
    datadeck(&tmp)
        .args(["session", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as"));
}

#[test]
fn test_unknown_acting_user() {
    let tmp = TempDir::new().unwrap();
    datadeck(&tmp)
        .args(["--as", "nobody", "session", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown user"));
}

#[test]
fn test_session_start_and_conflict_flow() {
    let tmp = TempDir::new().unwrap();

    datadeck(&tmp).arg("seed").assert().success();

    datadeck(&tmp)
        .args(["module", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weather Data"));

    // Start a session with a small roster
    datadeck(&tmp)
        .args([
            "--as",
            "demo_teacher",
            "session",
            "start",
            "Period 1",
            "--section",
            "1",
            "--module",
            "Weather Data",
            "--theme",
            "animals",
            "--students",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Join code:"))
        .stdout(predicate::str::contains("PIN"));

    datadeck(&tmp)
        .args(["--as", "demo_teacher", "session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Period 1"));

    // Same section again is refused with a hint
    datadeck(&tmp)
        .args([
            "--as",
            "demo_teacher",
            "session",
            "start",
            "Period 1 again",
            "--section",
            "1",
            "--module",
            "Weather Data",
            "--students",
            "5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"))
        .stderr(predicate::str::contains("--replace"));

    // --replace archives the previous session and succeeds
    datadeck(&tmp)
        .args([
            "--as",
            "demo_teacher",
            "session",
            "start",
            "Period 1 again",
            "--section",
            "1",
            "--module",
            "Weather Data",
            "--students",
            "5",
            "--replace",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Archived previous session"));

    // The archived session is stamped and listed under the archived filter
    datadeck(&tmp)
        .args([
            "--as",
            "demo_teacher",
            "session",
            "list",
            "--status",
            "archived",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Archived "));
}

#[test]
fn test_invalid_theme_rejected() {
    let tmp = TempDir::new().unwrap();

    datadeck(&tmp).arg("seed").assert().success();

    datadeck(&tmp)
        .args([
            "--as",
            "demo_teacher",
            "session",
            "start",
            "Period 1",
            "--section",
            "1",
            "--module",
            "Weather Data",
            "--theme",
            "pirates",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown theme"));
}

#[test]
fn test_observer_cannot_start_sessions() {
    let tmp = TempDir::new().unwrap();

    datadeck(&tmp).arg("seed").assert().success();

    datadeck(&tmp)
        .args([
            "--as",
            "demo_observer",
            "session",
            "start",
            "Nope",
            "--section",
            "1",
            "--module",
            "Weather Data",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot create sessions"));
}

#[test]
fn test_delete_requires_force() {
    let tmp = TempDir::new().unwrap();

    datadeck(&tmp).arg("seed").assert().success();

    datadeck(&tmp)
        .args([
            "--as",
            "demo_teacher",
            "session",
            "delete",
            "00000000-0000-0000-0000-000000000000",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Use --force"));
}
