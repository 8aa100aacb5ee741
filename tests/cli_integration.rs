//! Integration tests for the vobgraph binary.
//!
//! These tests run the CLI end to end on snapshots written to temporary
//! directories. Commands that need a live tool are only checked for argument
//! handling.

use assert_cmd::Command;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;
use tempfile::TempDir;

use vobgraph::core::model::{Author, Element, Version, VersionGraph};
use vobgraph::core::snapshot::SnapshotStore;
use vobgraph::core::types::{BranchName, Oid};

/// Get a command for running vobgraph with an isolated config.
fn vobgraph(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vobgraph").unwrap();
    cmd.env("VOBGRAPH_CONFIG", dir.path().join("no-such-config.toml"))
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG")
        .arg("--cwd")
        .arg(dir.path());
    cmd
}

fn write_snapshot(dir: &TempDir, file: &str, oid: &str, name: &str) {
    let mut graph = VersionGraph::new();
    let element = graph
        .insert(Element::file(Oid::new(oid).unwrap(), name))
        .unwrap();
    element.add_branch(BranchName::root(), None).unwrap();
    element
        .push_version(
            &BranchName::root(),
            Version::file(
                0,
                Author {
                    name: "Alice".into(),
                    login: "alice".into(),
                },
                Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap(),
                "initial import",
            ),
        )
        .unwrap();
    SnapshotStore::new(dir.path().join(file)).save(&graph).unwrap();
}

#[test]
fn help_flag_works() {
    let dir = TempDir::new().unwrap();
    vobgraph(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("version graphs"));
}

#[test]
fn inspect_summarizes_merged_snapshots() {
    let dir = TempDir::new().unwrap();
    write_snapshot(&dir, "a.json", "f1", "foo.c");
    write_snapshot(&dir, "b.json", "f1", "renamed.c");

    vobgraph(&dir)
        .args(["inspect", "a.json", "b.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elements"))
        .stderr(predicate::str::contains("different names"));
}

#[test]
fn inspect_element_as_json() {
    let dir = TempDir::new().unwrap();
    write_snapshot(&dir, "a.json", "f1", "foo.c");

    let output = vobgraph(&dir)
        .args(["inspect", "a.json", "--element", "f1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["name"], "foo.c");
    assert_eq!(value["branches"][0]["name"], "main");
    assert_eq!(value["branches"][0]["versions"][0]["login"], "alice");
}

#[test]
fn inspect_unknown_element_fails() {
    let dir = TempDir::new().unwrap();
    write_snapshot(&dir, "a.json", "f1", "foo.c");

    vobgraph(&dir)
        .args(["inspect", "a.json", "--element", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn merge_writes_a_loadable_snapshot() {
    let dir = TempDir::new().unwrap();
    write_snapshot(&dir, "a.json", "f1", "foo.c");
    write_snapshot(&dir, "b.json", "f2", "bar.c");

    vobgraph(&dir)
        .args(["merge", "--output", "all.json", "a.json", "b.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 2 elements"));

    let merged = SnapshotStore::new(dir.path().join("all.json")).load().unwrap();
    assert_eq!(merged.len(), 2);
}

#[test]
fn corrupt_snapshot_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

    vobgraph(&dir)
        .args(["inspect", "bad.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad.json"));
}

#[test]
fn read_without_lists_is_rejected() {
    let dir = TempDir::new().unwrap();
    vobgraph(&dir)
        .arg("read")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to read"));
}

#[test]
fn read_reports_a_missing_tool() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("vobgraph.toml"),
        "[tool]\nprogram = \"/definitely/not/a/tool\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("files.txt"), "foo.c\n").unwrap();

    vobgraph(&dir)
        .args(["read", "--elements", "files.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/definitely/not/a/tool"));
}

#[test]
fn invalid_origin_date_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("files.txt"), "foo.c\n").unwrap();
    vobgraph(&dir)
        .args(["read", "--elements", "files.txt", "--origin-date", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("yesterday"));
}
