//! End-to-end test driving the `tt` binary through a race.
//!
//! init → start → ingest → mark → finish → results

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn tt_binary() -> String {
    env!("CARGO_BIN_EXE_tt").to_string()
}

/// A temp home with a config file pointing the event into it.
fn setup() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("tt.toml");
    std::fs::write(
        &config,
        format!(
            "event_path = {:?}\n",
            temp.path().join("race").join("event.json").display().to_string()
        ),
    )
    .unwrap();
    std::fs::write(
        temp.path().join("riders.json"),
        r#"{
            "riders": [
                {"bib": "1", "refid": "101", "first_name": "Ann", "last_name": "Lee", "category": "A", "wall_start": "10:00:00"},
                {"bib": "2", "refid": "102", "first_name": "Bea", "last_name": "King", "category": "A", "wall_start": "10:01:00"},
                {"bib": "3", "refid": "103", "first_name": "Cat", "last_name": "Moss", "category": "A", "wall_start": "10:02:00"}
            ],
            "categories": [{"label": "A"}]
        }"#,
    )
    .unwrap();
    (temp, config)
}

fn tt(home: &Path, config: &Path, args: &[&str]) -> Output {
    let output = Command::new(tt_binary())
        .env("HOME", home)
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run tt");
    assert!(
        output.status.success(),
        "tt {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn ingest(home: &Path, config: &Path, lines: &str) -> Output {
    let mut child = Command::new(tt_binary())
        .env("HOME", home)
        .arg("--config")
        .arg(config)
        .args(["ingest", "--idle-ms", "20"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn tt ingest");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(lines.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "tt ingest should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

#[test]
fn test_full_race_flow() {
    let (temp, config) = setup();
    let home = temp.path();
    let riders = home.join("riders.json");

    let output = tt(
        home,
        &config,
        &["init", "--kind", "individual", "--riders", riders.to_str().unwrap()],
    );
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("Created individual event with 3 riders")
    );
    assert!(home.join("race").join("event.json").is_file());

    tt(home, &config, &["start", "9:59:00"]);

    let output = ingest(
        home,
        &config,
        r#"{"time": "10:00:00.3", "chan": "C0", "refid": "101"}
{"time": "10:01:00.2", "chan": "C0", "refid": "102"}
{"time": "10:20:00.3", "chan": "C1", "refid": "101"}
{"time": "10:21:40.2", "chan": "C1", "refid": "102"}
{"time": "10:21:41", "chan": "C1", "refid": "555"}
"#,
    );
    let announcements = String::from_utf8_lossy(&output.stdout);
    assert_eq!(announcements.lines().count(), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("4 passings applied, 1 ignored"));

    tt(home, &config, &["mark", "dnf", "3"]);
    tt(home, &config, &["finish"]);

    let output = tt(home, &config, &["results", "--json"]);
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results["status"], "final");
    assert_eq!(results["places"], "1 2");
    assert_eq!(results["standings"][0]["name"], "Ann LEE");
    assert_eq!(results["standings"][0]["time"], "20:00.0000");
    assert_eq!(results["standings"][1]["down"], "40.0000");

    let output = tt(home, &config, &["status"]);
    let status = String::from_utf8_lossy(&output.stdout);
    assert!(status.contains("Timer: finished"));
    assert!(status.contains("Riders: 3 (2 finished, 1 out)"));
}

#[test]
fn test_commands_need_an_event() {
    let (temp, config) = setup();
    let output = Command::new(tt_binary())
        .env("HOME", temp.path())
        .arg("--config")
        .arg(&config)
        .args(["start", "10:00:00"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tt init"));
}

#[test]
fn test_env_overrides_event_path() {
    let (temp, config) = setup();
    let event = temp.path().join("elsewhere.json");
    let output = Command::new(tt_binary())
        .env("HOME", temp.path())
        .env("TT_EVENT_PATH", &event)
        .arg("--config")
        .arg(&config)
        .args(["init", "--kind", "team"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(event.is_file());
}
