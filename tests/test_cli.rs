mod common;

use chrono::{Duration, Utc};

use common::{run_binary, write_file_config};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout should be JSON ({e}): {}", stdout(output)))
}

// ============================================================================
// version command
// ============================================================================

#[test]
fn version_human() {
    let output = run_binary(&["version"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("parcelkeep"), "{out}");
    assert!(out.contains('.'), "{out}");
}

#[test]
fn version_json() {
    let output = run_binary(&["version", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed = json(&output);
    assert_eq!(parsed["name"], "parcelkeep");
    assert!(parsed.get("version").is_some());
}

// ============================================================================
// config validate
// ============================================================================

#[test]
fn config_validate_accepts_file_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file_config(dir.path());

    let output = run_binary(&["config", "validate", config.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("configuration valid"));
}

#[test]
fn config_validate_strict_rejects_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.yaml");
    std::fs::write(
        &path,
        format!("token:\n  secret: {}\n", common::SECRET),
    )
    .unwrap();

    let lenient = run_binary(&["config", "validate", path.to_str().unwrap(), "-f", "json"]);
    assert!(lenient.status.success(), "{}", stderr(&lenient));
    let report = json(&lenient);
    assert_eq!(report["valid"], true);
    assert!(
        report["warnings"]
            .as_array()
            .unwrap()
            .iter()
            .any(|w| w.as_str().unwrap_or_default().contains("store.kind"))
    );

    let strict = run_binary(&["config", "validate", path.to_str().unwrap(), "--strict"]);
    assert_eq!(strict.status.code(), Some(2), "{}", stderr(&strict));
}

#[test]
fn config_validate_reports_errors_and_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.yaml");
    std::fs::write(&path, "token:\n  secret: short\n").unwrap();

    let invalid = run_binary(&["config", "validate", path.to_str().unwrap()]);
    assert_eq!(invalid.status.code(), Some(2));
    assert!(stderr(&invalid).contains("token.secret"), "{}", stderr(&invalid));

    let missing = run_binary(&["config", "validate", "/nonexistent/parcelkeep.yaml"]);
    assert_eq!(missing.status.code(), Some(2));
}

#[test]
fn desk_commands_need_a_config() {
    let output = run_binary(&["slots"]);
    assert_eq!(output.status.code(), Some(64), "{}", stderr(&output));
}

// ============================================================================
// Desk workflow
// ============================================================================

#[test]
fn intake_collect_and_list_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file_config(dir.path());
    let config = config.to_str().unwrap();

    let intake = run_binary(&[
        "-c", config, "intake", "-a", "4B", "--category", "box", "-s", "L5", "-r", "S-1",
        "--resident", "R-100", "-f", "json",
    ]);
    assert!(intake.status.success(), "{}", stderr(&intake));
    let parcel = json(&intake);
    assert_eq!(parcel["id"], "P001");
    assert_eq!(parcel["slotId"], "L5");
    assert_eq!(parcel["status"], "AwaitingPickup");
    let token_url = parcel["token"]["url"].as_str().unwrap().to_owned();

    let conflict = run_binary(&[
        "-c", config, "intake", "-a", "4B", "--category", "box", "-s", "L5", "-r", "S-1",
    ]);
    assert_eq!(conflict.status.code(), Some(5), "{}", stderr(&conflict));

    let slots = run_binary(&["-c", config, "slots", "--summary", "-f", "json"]);
    assert!(slots.status.success(), "{}", stderr(&slots));
    let summary = json(&slots);
    assert_eq!(summary["occupied"], 1);
    assert_eq!(summary["available"], 49);

    let verify = run_binary(&["-c", config, "verify", &token_url]);
    assert!(verify.status.success(), "{}", stderr(&verify));
    assert!(stdout(&verify).contains("P001"));

    let listing = run_binary(&["-c", config, "parcels", "--status", "awaiting-pickup", "-f", "json"]);
    assert!(listing.status.success(), "{}", stderr(&listing));
    let rows = json(&listing);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["escalation"], "AwaitingPickup");

    let collect = run_binary(&["-c", config, "collect", "P001", "--collector", "Ana"]);
    assert!(collect.status.success(), "{}", stderr(&collect));

    let again = run_binary(&["-c", config, "remove", "P001"]);
    assert_eq!(again.status.code(), Some(5), "{}", stderr(&again));

    let grid = run_binary(&["-c", config, "slots"]);
    assert!(grid.status.success());
    assert!(stdout(&grid).contains("L5."), "{}", stdout(&grid));
}

#[test]
fn sweep_at_future_instant_sends_reminder_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file_config(dir.path());
    let config = config.to_str().unwrap();

    let intake = run_binary(&[
        "-c", config, "intake", "-a", "4B", "--category", "envelope", "-s", "L12", "-r", "S-1",
    ]);
    assert!(intake.status.success(), "{}", stderr(&intake));

    let at = (Utc::now() + Duration::days(4) + Duration::hours(1)).to_rfc3339();
    let first = run_binary(&["-c", config, "sweep", "--at", &at, "-f", "json"]);
    assert!(first.status.success(), "{}", stderr(&first));
    let report = json(&first);
    assert_eq!(report["scanned"], 1);
    assert_eq!(report["reminders"], 1);

    let second = run_binary(&["-c", config, "sweep", "--at", &at, "-f", "json"]);
    let report = json(&second);
    assert_eq!(report["reminders"], 0);
    assert_eq!(report["alreadySent"], 1);
}

#[test]
fn rejected_token_exits_with_token_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file_config(dir.path());

    let output = run_binary(&["-c", config.to_str().unwrap(), "verify", "abc.def"]);
    assert_eq!(output.status.code(), Some(6), "{}", stderr(&output));
}

#[test]
fn invalid_intake_exits_with_lifecycle_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file_config(dir.path());

    let output = run_binary(&[
        "-c",
        config.to_str().unwrap(),
        "intake",
        "-a",
        "4B",
        "--category",
        "box",
        "-s",
        "L51",
        "-r",
        "S-1",
    ]);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("slotId"), "{}", stderr(&output));
}
