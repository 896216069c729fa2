use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "questline-cli-{label}-{}.json",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn questline(store: &Path, today: &str, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_questline"))
        .arg("--store")
        .arg(store)
        .args(["--today", today, "--report", "json"])
        .args(args)
        .output()
        .expect("run cli")
}

fn json(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "cli failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json report")
}

#[test]
fn cli_tracks_a_day_and_resets_into_the_next() {
    let store = temp_path("day");
    let day1 = "2024-05-01";

    let init = json(&questline(&store, day1, &["init", "--name", "Robin"]));
    assert_eq!(init[0]["report"], "created");
    assert_eq!(init[1]["data"]["outcome"], "watermark_initialized");

    let added = json(&questline(
        &store,
        day1,
        &["add-path", "Morning Run", "--tasks", "Stretch,Run: Warmup / Sprint"],
    ));
    assert_eq!(added["data"]["id"], "morning-run");

    json(&questline(&store, day1, &["toggle", "--path", "morning-run", "--task", "stretch"]));
    json(&questline(
        &store,
        day1,
        &["toggle", "--path", "morning-run", "--subtask", "run-warmup"],
    ));
    let last = json(&questline(
        &store,
        day1,
        &["toggle", "--path", "morning-run", "--subtask", "run-sprint"],
    ));
    assert_eq!(last["report"], "toggle");
    assert_eq!(last["data"]["entry"]["percentage"], 100);
    assert_eq!(last["data"]["increment"]["state"]["current_streak"], 1);

    let reset = json(&questline(&store, "2024-05-02", &["reset"]));
    assert_eq!(reset["data"]["outcome"], "reset");
    assert_eq!(reset["data"]["success"], true);
    assert_eq!(reset["data"]["streaks_maintained"][0], "morning-run");
    assert_eq!(reset["data"]["streaks_reset"], Value::Array(vec![]));
    assert_eq!(reset["data"]["daily_record"]["date"], day1);

    let status = json(&questline(&store, "2024-05-02", &["status"]));
    let path = &status["data"]["paths"][0]["path"];
    assert_eq!(path["streak"]["current_streak"], 1);
    assert_eq!(path["checklist"]["completed_task_ids"], Value::Array(vec![]));

    let history = json(&questline(&store, "2024-05-02", &["history"]));
    assert_eq!(history["data"]["points"][0]["task_rate"], 100);
    assert_eq!(history["data"]["average_task_rate"], 100);

    let _ = std::fs::remove_file(store);
}

#[test]
fn cli_commands_before_init_fail() {
    let store = temp_path("uninit");
    let output = questline(&store, "2024-05-01", &["status"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("questline init"));
}

#[test]
fn cli_quest_rewards_reach_the_wallet() {
    let store = temp_path("quest");
    let day = "2024-06-10";
    json(&questline(&store, day, &["init"]));
    let created = json(&questline(
        &store,
        day,
        &["add-quest", "File taxes", "--coins", "25", "--stars", "2"],
    ));
    assert_eq!(created["data"]["id"], "file-taxes");

    let done = json(&questline(&store, day, &["complete-quest", "file-taxes"]));
    assert_eq!(done["data"]["rewards"]["coins"], 25);

    let again = questline(&store, day, &["complete-quest", "file-taxes"]);
    assert!(!again.status.success());

    let status = json(&questline(&store, day, &["status"]));
    assert_eq!(status["data"]["wallet"]["coins"], 25);
    assert_eq!(status["data"]["wallet"]["stars"], 2);
    let _ = std::fs::remove_file(store);
}

#[test]
fn cli_simulate_writes_json_output() {
    let output_path = temp_path("simulate");
    let status = Command::new(env!("CARGO_BIN_EXE_questline"))
        .args([
            "simulate",
            "--days",
            "10",
            "--seed",
            "3",
            "--completion-rate",
            "1.0",
            "--today",
            "2024-01-01",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    let report: Value = serde_json::from_str(&content).expect("json report");
    assert_eq!(report["report"], "simulation");
    assert_eq!(report["data"]["streaks_broken"], 0);
    let _ = std::fs::remove_file(output_path);
}
