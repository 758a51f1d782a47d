//! End-to-end tests driving the `tacma` binary.
//!
//! Each test gets its own home directory and config file, so the database,
//! its backup and any archives live in a temp dir.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn tacma_binary() -> String {
    env!("CARGO_BIN_EXE_tacma").to_string()
}

/// Temp home with a config file pointing the database into it.
struct Env {
    temp: TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        let db = temp.path().join("data/tacma.db");
        std::fs::write(
            &config,
            format!("database_path = {:?}\n", db.to_str().unwrap()),
        )
        .unwrap();
        Self { temp, config }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn db(&self) -> PathBuf {
        self.path().join("data/tacma.db")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(tacma_binary())
            .env("HOME", self.path())
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("XDG_DATA_HOME")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run tacma")
    }

    /// Runs a command that must succeed and returns its stdout.
    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "tacma {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

#[test]
fn test_task_flow_persists_between_runs() {
    let env = Env::new();

    assert_eq!(env.ok(&["add", "write", "--priority", "3"]), "Added task 0: write\n");
    assert_eq!(env.ok(&["add", "read"]), "Added task 1: read\n");
    assert_eq!(env.ok(&["start", "0"]), "Started task 0: write\n");
    assert_eq!(env.ok(&["start", "1"]), "Switched from task 0 to 1: read\n");
    assert_eq!(env.ok(&["stop"]), "Stopped task 1: read\n");

    let status: serde_json::Value = serde_json::from_str(&env.ok(&["status", "--json"])).unwrap();
    let activities = status["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0]["title"], "write");
    assert_eq!(activities[0]["state"], "off");
    assert_eq!(activities[0]["weight"], 0.75);
    assert_eq!(activities[1]["weight"], 0.25);

    let export: serde_json::Value = serde_json::from_str(&env.ok(&["export"])).unwrap();
    let records = export["activities"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["onoff"].as_array().unwrap().len(), 2);
    assert_eq!(records[1]["onoff"].as_array().unwrap().len(), 2);
}

#[test]
fn test_finish_and_remove() {
    let env = Env::new();
    env.ok(&["add", "write"]);
    env.ok(&["start", "0"]);

    assert_eq!(env.ok(&["finish", "0"]), "Finished task 0: write\n");
    let output = env.run(&["start", "0"]);
    assert!(!output.status.success(), "finished task must not restart");

    assert_eq!(env.ok(&["remove", "0"]), "Removed task 0: write\n");
    let output = env.run(&["rename", "0", "gone"]);
    assert!(!output.status.success());
}

#[test]
fn test_session_before_creation_is_rejected() {
    let env = Env::new();
    env.ok(&["add", "write"]);

    let output = env.run(&["session", "add", "0", "--start", "2 days ago", "--end", "1 day ago"]);
    assert!(!output.status.success());
    assert_eq!(env.ok(&["session", "list", "0"]), "Sessions of task 0: write\nNo sessions recorded.\n");
}

#[test]
fn test_manual_history_commands() {
    let env = Env::new();
    env.ok(&["add", "write", "--priority", "2"]);

    let listed = env.ok(&["priority-log", "list", "0"]);
    assert!(listed.starts_with("Priority history of task 0: write\n"), "{listed}");
    assert_eq!(listed.lines().count(), 2);

    // Changes before the task existed and negative priorities are refused.
    assert!(!env.run(&["priority-log", "set", "0", "1 day ago=3"]).status.success());
    assert!(!env.run(&["add", "read", "--priority=-1"]).status.success());

    // Toggles before the task existed are refused too.
    assert!(!env.run(&["session", "set", "0", "1 day ago"]).status.success());
    assert_eq!(env.ok(&["session", "list", "0"]), "Sessions of task 0: write\nNo sessions recorded.\n");
}

#[test]
fn test_archive_and_backup_commands() {
    let env = Env::new();
    env.ok(&["add", "write"]);

    assert_eq!(env.ok(&["archive"]), "Nothing to archive.\n");
    assert!(!env.path().join("data/archive1.db").exists());

    let backup = env.ok(&["backup"]);
    assert!(backup.starts_with("Wrote backup to "));
    assert!(env.path().join("data/tacma.db.backup").exists());
}

#[test]
fn test_corrupt_database_falls_back_to_backup() {
    let env = Env::new();
    env.ok(&["add", "write"]);
    env.ok(&["backup"]);

    let conn = rusqlite::Connection::open(env.db()).unwrap();
    conn.execute("DELETE FROM meta", []).unwrap();
    drop(conn);

    let output = env.run(&["status", "--json"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("falling back to backup"), "stderr: {stderr}");

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["activities"][0]["title"], "write");
}

#[test]
fn test_no_subcommand_prints_help() {
    let env = Env::new();
    let stdout = env.ok(&[]);
    assert!(stdout.contains("Usage:"));
}
