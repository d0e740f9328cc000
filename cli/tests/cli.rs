use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Workspace {
        let dir = TempDir::new().unwrap();
        let database = dir.path().join("dashboard.db");
        let config = dir.path().join("secrets.toml");
        fs::write(
            &config,
            format!("[database]\nname = '{}'\n", database.display()),
        )
        .unwrap();

        Workspace { dir, config }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("scripture-study").unwrap();
        cmd.current_dir(&self.dir)
            .env_remove("SCRIPTURE_CONFIG")
            .env("RUST_LOG", "warn")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

#[test]
fn queries_are_listed_without_a_database() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("scripture-study").unwrap();
    cmd.current_dir(&dir).env_remove("SCRIPTURE_CONFIG").arg("queries");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Scriptures by Year"))
        .stdout(predicate::str::contains("Window Functions Example"));
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("scripture-study").unwrap();
    cmd.current_dir(&dir).env_remove("SCRIPTURE_CONFIG").arg("scriptures");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error: Invalid configuration"));
}

#[test]
fn add_requires_a_book_or_reference() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["add", "--volume", "Old Testament"])
        .assert()
        .failure();
    ws.cmd()
        .args(["add", "--volume", "Old Testament", "--book", "Genesis", "--year", "4000"])
        .assert()
        .failure();
}

#[test]
fn full_workflow() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 migrations"));

    ws.cmd()
        .args([
            "add",
            "--volume",
            "Old Testament",
            "--book",
            "Genesis",
            "--chapter",
            "1",
            "--verse",
            "1",
            "--year",
            "4000",
            "--age",
            "BC",
            "--doctrine",
            "Creation",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added entry #1"))
        .stdout(predicate::str::contains("with year"))
        .stdout(predicate::str::contains("with doctrine"));

    ws.cmd()
        .args([
            "add",
            "--volume",
            "Book of Mormon",
            "--reference",
            "Alma 32:21",
            "--year",
            "74",
            "--age",
            "BC",
            "--doctrine",
            "Faith",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added entry #2"));

    ws.cmd()
        .args([
            "add",
            "--volume",
            "New Testament",
            "--book",
            "John",
            "--year",
            "not-a-number",
            "--age",
            "AD",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added entry #3"))
        .stdout(predicate::str::contains("without year"));

    ws.cmd()
        .arg("scriptures")
        .assert()
        .success()
        .stdout(predicate::str::contains("Genesis"))
        .stdout(predicate::str::contains("Alma"))
        .stdout(predicate::str::contains("John"));

    ws.cmd()
        .arg("timeline")
        .assert()
        .success()
        .stdout(predicate::str::contains("Genesis 1:1 (4000 BC)"))
        .stdout(predicate::str::contains("Alma 32:21 (74 BC)"))
        .stdout(predicate::str::contains("John").not());

    ws.cmd()
        .args(["query", "Group By Example", "--show-sql"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GROUP BY ss.volume"))
        .stdout(predicate::str::contains("scripture_count"))
        .stdout(predicate::str::contains("(3 rows)"));

    ws.cmd()
        .args(["query", "Group By Example", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 rows)"));

    ws.cmd()
        .args(["query", "DROP TABLE doctrine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a known query"));

    ws.cmd()
        .args(["edit", "1", "--verse", "1-3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 1 rows"));

    ws.cmd()
        .args(["edit", "1", "--verse", "1-3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes to save"));

    ws.cmd()
        .args(["edit", "42", "--verse", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entry #42"));

    ws.cmd()
        .args(["delete", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 entries"));

    ws.cmd()
        .args(["summary", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 1"))
        .stdout(predicate::str::contains("Creation"))
        .stdout(predicate::str::contains("Faith").not());

    ws.cmd()
        .args(["chart", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("per_century"));
}
