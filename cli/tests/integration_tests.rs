use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rusqlite::Connection;

const BIN: &str = env!("CARGO_BIN_EXE_tablemap");

/// Creates a database with two tables in `dir`.
fn fixture_db(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.db");
    let conn = Connection::open(&path).expect("failed to open fixture db");
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL DEFAULT 'anon');
         CREATE TABLE visits (id INTEGER PRIMARY KEY, user_id INTEGER, duration REAL);",
    )
    .expect("failed to create fixture tables");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .output()
        .expect("failed to run tablemap")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn tables_lists_sorted_names() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());

    let output = run(&["tables", "--db", db.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "users\nvisits\n");
}

#[test]
fn tables_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());

    let output = run(&["tables", "--db", db.to_str().unwrap(), "--json"]);
    assert!(output.status.success());
    let names: Vec<String> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(names, vec!["users", "visits"]);
}

#[test]
fn info_json_reports_columns() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());

    let output = run(&["info", "users", "--db", db.to_str().unwrap(), "--json"]);
    assert!(output.status.success());
    let columns: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(columns[0]["name"], "id");
    assert_eq!(columns[0]["pk"], 1);
    assert_eq!(columns[1]["type"], "TEXT");
    assert_eq!(columns[1]["not_null"], true);
    assert_eq!(columns[1]["default_value"], "'anon'");
}

#[test]
fn info_text_output() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());

    let output = run(&["info", "visits", "--db", db.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("PRIMARY KEY"), "{text}");
    assert!(text.contains("duration"), "{text}");
}

#[test]
fn info_on_missing_table_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());

    let output = run(&["info", "orders", "--db", db.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Table 'orders' does not exist"), "{stderr}");
}

#[test]
fn exists_reports_both_cases() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());
    let db = db.to_str().unwrap();

    assert_eq!(stdout(&run(&["exists", "users", "--db", db])), "true\n");
    assert_eq!(stdout(&run(&["exists", "orders", "--db", db])), "false\n");

    let output = run(&["exists", "visits", "--db", db, "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["table"], "visits");
    assert_eq!(report["exists"], true);
}

#[test]
fn config_file_selects_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());
    let config = dir.path().join("storage.yml");

    let output = run(&[
        "init-config",
        "--output",
        config.to_str().unwrap(),
        "--db",
        db.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let output = run(&["tables", "--config", config.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "users\nvisits\n");
}

#[test]
fn missing_database_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("absent.db");

    let output = run(&["tables", "--db", db.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(!db.exists());
}

#[test]
fn verbose_logs_sql_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let db = fixture_db(dir.path());

    let output = run(&["--verbose", "tables", "--db", db.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "users\nvisits\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sqlite_master"), "{stderr}");
}
