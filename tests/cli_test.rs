/// CLI binary integration tests using assert_cmd
///
/// These tests invoke the actual binary against a fixture message store.
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use chat_history_export::service::store::SCHEMA;
use predicates::prelude::*;
use rusqlite::{Connection, params};

fn build_store(dir: &Path) -> PathBuf {
    let path = dir.join("messages.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute(
        "INSERT INTO chats (id, name, formatted_title, is_group) VALUES ('team@g.us', 'Team: Core', NULL, 1)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO chats (id, name, formatted_title, is_group) VALUES ('4915@c.us', NULL, '+49 15', 0)",
        [],
    )
    .unwrap();
    for i in 0..5i64 {
        conn.execute(
            "INSERT INTO messages (id, chat_id, timestamp, author, from_me, body)
             VALUES (?1, 'team@g.us', ?2, ?3, ?4, ?5)",
            params![
                format!("t{}", i),
                1_700_000_000 + i * 3600,
                if i % 2 == 0 { Some("4917@c.us") } else { None },
                i % 2,
                format!("line {}\nwrapped", i)
            ],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO messages (id, chat_id, timestamp, author, from_me, body)
         VALUES ('d1', '4915@c.us', 0, NULL, 0, 'hello')",
        [],
    )
    .unwrap();
    path
}

fn command(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chat-history-export"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_exports_store_to_target_dir() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = build_store(temp.path());
    let out = temp.path().join("out");

    command(temp.path())
        .arg(&out)
        .arg("--store")
        .arg(&store)
        .arg("--utc")
        .assert()
        .success()
        .stderr(predicate::str::contains("Found 2 conversations."))
        .stderr(predicate::str::contains("Done. 2 exported, 6 messages."));

    let team = std::fs::read_to_string(out.join("Team_ Core.csv")).unwrap();
    let lines: Vec<&str> = team.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "Chat,Date,Time,Name,Message");
    assert_eq!(lines[1], "Team: Core,11/14/2023,10:13:20 PM,4917,line 0 wrapped");
    assert_eq!(lines[2], "Team: Core,11/14/2023,11:13:20 PM,Me,line 1 wrapped");
    assert_eq!(lines[5], "Team: Core,11/15/2023,2:13:20 AM,4917,line 4 wrapped");

    let direct = std::fs::read_to_string(out.join("+49 15.csv")).unwrap();
    assert_eq!(
        direct,
        "Chat,Date,Time,Name,Message\n+49 15,1/1/1970,12:00:00 AM,+49 15,hello\n"
    );
}

#[test]
fn test_cli_single_file_from_config() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = build_store(temp.path());
    let out = temp.path().join("combined");
    let config_path = temp.path().join("custom.toml");
    std::fs::write(
        &config_path,
        format!(
            "target_dir = {:?}\nstore_path = {:?}\nsingle_file = true\nutc = true\ndate_format = \"%Y-%m-%d\"\ntime_format = \"%H:%M\"\n",
            out.display().to_string(),
            store.display().to_string()
        ),
    )
    .unwrap();

    command(temp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(predicate::str::contains("Done.").not());

    let combined = std::fs::read_to_string(out.join("all_chats.csv")).unwrap();
    let lines: Vec<&str> = combined.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[1], "Team: Core,2023-11-14,22:13,4917,line 0 wrapped");
    assert_eq!(lines[6], "+49 15,1970-01-01,00:00,+49 15,hello");
}

#[test]
fn test_cli_rerun_is_idempotent() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = build_store(temp.path());
    let out = temp.path().join("out");

    for _ in 0..2 {
        command(temp.path())
            .arg(&out)
            .args(["--utc", "-q", "--store"])
            .arg(&store)
            .assert()
            .success();
    }
    let first = std::fs::read(out.join("Team_ Core.csv")).unwrap();

    command(temp.path())
        .arg(&out)
        .args(["--utc", "-q", "--store"])
        .arg(&store)
        .assert()
        .success();
    assert_eq!(std::fs::read(out.join("Team_ Core.csv")).unwrap(), first);
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);
}

#[test]
fn test_cli_requires_a_source() {
    let temp = tempfile::TempDir::new().unwrap();

    command(temp.path())
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No message source configured"));
}

#[test]
fn test_cli_missing_store_fails() {
    let temp = tempfile::TempDir::new().unwrap();

    command(temp.path())
        .args(["--store"])
        .arg(temp.path().join("absent.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Message store not found"));
}

#[test]
fn test_cli_missing_config_file_fails() {
    let temp = tempfile::TempDir::new().unwrap();

    command(temp.path())
        .arg("--config")
        .arg(temp.path().join("nope.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_cli_store_and_service_url_conflict() {
    let temp = tempfile::TempDir::new().unwrap();

    command(temp.path())
        .args(["--store", "a.db", "--service-url", "http://localhost:1/"])
        .assert()
        .failure();
}

#[test]
fn test_cli_help_flag() {
    let temp = tempfile::TempDir::new().unwrap();

    command(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--single-file"))
        .stdout(predicate::str::contains("--store"));
}
