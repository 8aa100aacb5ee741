//! Integration tests for history discovery.
//!
//! These tests drive the reader against the scripted tool and check the
//! finished graph: bulk and point-in-time reads, the fixup pass, the cutoff,
//! and fatal inconsistencies.

use chrono::{DateTime, TimeZone, Utc};

use vobgraph::core::model::VersionGraph;
use vobgraph::core::snapshot::SnapshotStore;
use vobgraph::core::types::{
    BranchName, BranchVersion, ElementVersionPath, Oid, VersionKey, VersionPath,
};
use vobgraph::history::{
    Diagnostics, ElementOutcome, HistoryError, HistoryReader, VersionOutcome,
};
use vobgraph::tool::mock::{ScriptedTool, ToolCall};
use vobgraph::tool::{DirEntryTarget, VersionInfo};

// =============================================================================
// Fixtures
// =============================================================================

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, day, 12, 0, 0).unwrap()
}

fn info(day: u32) -> VersionInfo {
    VersionInfo {
        author_name: "Alice".into(),
        author_login: "alice".into(),
        date: at(day),
        comment: format!("change on day {day}"),
        ..Default::default()
    }
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

fn oid(raw: &str) -> Oid {
    Oid::new(raw).unwrap()
}

fn key(element: &str, branch_name: &str, number: u32) -> VersionKey {
    VersionKey::new(oid(element), branch(branch_name), number)
}

fn evp(raw: &str) -> ElementVersionPath {
    ElementVersionPath::parse(raw).unwrap()
}

fn reader(tool: &ScriptedTool, cutoff: DateTime<Utc>) -> HistoryReader<ScriptedTool> {
    HistoryReader::new(tool.clone(), VersionGraph::new(), cutoff, Diagnostics::new())
}

/// `foo.txt` with `\main\0`, `\main\1`, `\main\CHANGE\0`, `\main\CHANGE\1`.
fn change_branch_tool() -> ScriptedTool {
    let tool = ScriptedTool::new();
    tool.add_element("foo.txt", "f1", false);
    tool.add_tree_entry("foo.txt", r"\main");
    tool.add_version("foo.txt", r"\main\0", info(1));
    tool.add_version("foo.txt", r"\main\1", info(2));
    tool.add_tree_entry("foo.txt", r"\main\CHANGE");
    tool.add_version("foo.txt", r"\main\CHANGE\0", info(3));
    tool.add_version("foo.txt", r"\main\CHANGE\1", info(4));
    tool
}

fn branch_numbers(graph: &VersionGraph, element: &str, name: &str) -> Vec<u32> {
    graph
        .get(&oid(element))
        .and_then(|e| e.branch(&branch(name)))
        .map(|b| b.versions().iter().map(|v| v.number()).collect())
        .unwrap_or_default()
}

// =============================================================================
// Bulk discovery
// =============================================================================

#[test]
fn bulk_read_builds_branches_and_branching_points() {
    let tool = change_branch_tool();
    let mut reader = reader(&tool, far_future());

    assert_eq!(
        reader.read_element("foo.txt").unwrap(),
        ElementOutcome::Read { versions: 4 }
    );
    reader.resolve_fixups();

    let graph = reader.graph();
    assert_eq!(branch_numbers(graph, "f1", "main"), vec![0, 1]);
    assert_eq!(branch_numbers(graph, "f1", "CHANGE"), vec![0, 1]);

    let element = graph.get(&oid("f1")).unwrap();
    assert_eq!(element.branch(&branch("main")).unwrap().branching_point(), None);
    assert_eq!(
        element.branch(&branch("CHANGE")).unwrap().branching_point(),
        Some(&BranchVersion::new(branch("main"), 1))
    );

    let first = graph.version(&key("f1", "main", 0)).unwrap();
    assert_eq!(first.author().login, "alice");
    assert_eq!(first.comment(), "change on day 1");
    assert!(graph.validate().is_ok());
}

#[test]
fn merge_links_resolve_after_the_target_branch_is_read() {
    let tool = ScriptedTool::new();
    tool.add_element("foo.txt", "f1", false);
    tool.add_version("foo.txt", r"\main\0", info(1));
    tool.add_version(
        "foo.txt",
        r"\main\1",
        VersionInfo {
            merges_to: vec![VersionPath::parse(r"\main\REL1\3").unwrap()],
            ..info(2)
        },
    );
    for (n, day) in [(0, 3), (1, 4), (2, 5), (3, 6)] {
        tool.add_version("foo.txt", &format!(r"\main\REL1\{n}"), info(day));
    }

    let mut reader = reader(&tool, far_future());
    reader.read_element("foo.txt").unwrap();
    assert_eq!(reader.pending_fixups(), 1);
    let summary = reader.resolve_fixups();
    assert_eq!(summary.merges_resolved, 1);
    assert_eq!(reader.pending_fixups(), 0);

    let graph = reader.graph();
    let merged = graph.version(&key("f1", "main", 1)).unwrap();
    let target = BranchVersion::new(branch("REL1"), 3);
    assert_eq!(merged.merges_to(), &[target.clone()]);
    let element = graph.get(&oid("f1")).unwrap();
    assert_eq!(element.version(&target).unwrap().number(), 3);
}

#[test]
fn unresolvable_merge_is_dropped_with_an_issue() {
    let tool = ScriptedTool::new();
    tool.add_element("foo.txt", "f1", false);
    tool.add_version(
        "foo.txt",
        r"\main\0",
        VersionInfo {
            merges_from: vec![VersionPath::parse(r"\main\GONE\7").unwrap()],
            ..info(1)
        },
    );

    let mut reader = reader(&tool, far_future());
    reader.read_element("foo.txt").unwrap();
    let summary = reader.resolve_fixups();
    assert_eq!(summary.merges_dropped, 1);
    assert!(reader
        .graph()
        .version(&key("f1", "main", 0))
        .unwrap()
        .merges_from()
        .is_empty());
    assert_eq!(reader.diagnostics().count("unresolved-merge"), 1);
}

#[test]
fn directory_content_links_files_read_in_any_order() {
    let tool = ScriptedTool::new();
    tool.add_element("src", "d1", true);
    tool.add_element("src/a.txt", "40a1", false);
    tool.add_version("src", r"\main\0", info(1));
    tool.set_directory(
        "src",
        r"\main\0",
        [
            ("a.txt".to_string(), DirEntryTarget::Element(oid("40a1"))),
            ("link".to_string(), DirEntryTarget::Symlink("../target".into())),
        ],
    );
    tool.add_version("src/a.txt", r"\main\0", info(1));

    let mut reader = reader(&tool, far_future());
    // directories are usually listed before their files are read
    reader.read_element("src").unwrap();
    reader.read_element("src/a.txt").unwrap();
    reader.resolve_fixups();

    let graph = reader.graph();
    let content = graph.version(&key("d1", "main", 0)).unwrap().content().unwrap();
    assert_eq!(content.get("a.txt"), Some(&oid("40a1")));
    let link = content.get("link").unwrap();
    assert!(link.is_symlink());
    assert_eq!(graph.get(link).unwrap().symlink_target(), Some("../target"));
    assert!(graph.validate().is_ok());
}

// =============================================================================
// Point-in-time discovery
// =============================================================================

#[test]
fn point_read_is_idempotent() {
    let tool = change_branch_tool();
    let mut reader = reader(&tool, far_future());

    let mut first = Vec::new();
    assert_eq!(
        reader.read_version(&evp(r"foo.txt@@\main\CHANGE\1"), &mut first).unwrap(),
        VersionOutcome::Added
    );
    assert_eq!(first.len(), 4);
    let before = reader.graph().clone();

    tool.clear_calls();
    let mut second = Vec::new();
    assert_eq!(
        reader.read_version(&evp(r"foo.txt@@\main\CHANGE\1"), &mut second).unwrap(),
        VersionOutcome::AlreadyPresent
    );
    assert!(second.is_empty());
    assert_eq!(reader.graph(), &before);
    assert_eq!(tool.calls(), vec![ToolCall::ObjectId("foo.txt".into())]);
}

#[test]
fn point_read_extends_a_bulk_read() {
    let tool = change_branch_tool();
    let mut reader = reader(&tool, at(2));
    reader.read_element("foo.txt").unwrap();
    assert_eq!(branch_numbers(reader.graph(), "f1", "main"), vec![0, 1]);

    // a later run with a later cutoff continues from the saved graph
    let (graph, _, _) = reader.into_parts();
    let mut reader = HistoryReader::new(tool.clone(), graph, far_future(), Diagnostics::new());
    let mut added = Vec::new();
    reader
        .read_version(&evp(r"foo.txt@@\main\CHANGE\1"), &mut added)
        .unwrap();
    assert_eq!(added, vec![key("f1", "CHANGE", 0), key("f1", "CHANGE", 1)]);
}

#[test]
fn branch_first_seen_past_version_zero_is_fatal() {
    let tool = change_branch_tool();
    // OTHER/2 claims to follow main/1 directly, so OTHER has no start
    tool.set_predecessor("foo.txt", r"\main\OTHER\2", Some(r"\main\1"));

    let mut reader = reader(&tool, far_future());
    let err = reader
        .read_version(&evp(r"foo.txt@@\main\OTHER\2"), &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, HistoryError::Inconsistent { .. }));
    // ancestors read before the failure stay valid
    assert_eq!(branch_numbers(reader.graph(), "f1", "main"), vec![0, 1]);
}

#[test]
fn version_without_predecessor_off_the_root_is_fatal() {
    let tool = change_branch_tool();
    tool.set_predecessor("foo.txt", r"\main\CHANGE\0", None);

    let mut reader = reader(&tool, far_future());
    let err = reader
        .read_version(&evp(r"foo.txt@@\main\CHANGE\0"), &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, HistoryError::Inconsistent { ref element, .. } if element == "foo.txt"));
}

#[test]
fn unknown_element_is_recorded_not_fatal() {
    let tool = ScriptedTool::new();
    let mut reader = reader(&tool, far_future());
    assert_eq!(
        reader
            .read_version(&evp(r"ghost.c@@\main\3"), &mut Vec::new())
            .unwrap(),
        VersionOutcome::NotFound
    );
    assert_eq!(reader.diagnostics().count("element-not-found"), 1);
    assert!(reader.graph().is_empty());
}

#[test]
fn nested_branches_fork_from_their_immediate_parent() {
    let tool = ScriptedTool::new();
    tool.add_element("foo.txt", "f1", false);
    tool.add_version("foo.txt", r"\main\0", info(1));
    tool.add_version("foo.txt", r"\main\1", info(2));
    tool.add_version("foo.txt", r"\main\A\0", info(3));
    tool.add_version("foo.txt", r"\main\A\1", info(4));
    tool.add_version("foo.txt", r"\main\A\B\0", info(5));

    let mut bulk = reader(&tool, far_future());
    bulk.read_element("foo.txt").unwrap();
    let mut point = reader(&tool, far_future());
    point
        .read_version(&evp(r"foo.txt@@\main\A\B\0"), &mut Vec::new())
        .unwrap();

    for graph in [bulk.graph(), point.graph()] {
        let element = graph.get(&oid("f1")).unwrap();
        assert_eq!(
            element.branch(&branch("A")).unwrap().branching_point(),
            Some(&BranchVersion::new(branch("main"), 1))
        );
        assert_eq!(
            element.branch(&branch("B")).unwrap().branching_point(),
            Some(&BranchVersion::new(branch("A"), 1))
        );
        assert!(graph.validate().is_ok());
    }
}

// =============================================================================
// Time bound
// =============================================================================

#[test]
fn nothing_after_the_cutoff_is_kept() {
    let tool = change_branch_tool();
    let cutoff = at(3);

    let mut bulk = reader(&tool, cutoff);
    bulk.read_element("foo.txt").unwrap();
    let mut point = reader(&tool, cutoff);
    point
        .read_version(&evp(r"foo.txt@@\main\CHANGE\1"), &mut Vec::new())
        .unwrap();

    for graph in [bulk.graph(), point.graph()] {
        for element in graph.elements() {
            for b in element.branches() {
                assert!(!b.is_empty());
                for version in b.versions() {
                    assert!(version.date() <= cutoff);
                }
            }
        }
        assert_eq!(branch_numbers(graph, "f1", "CHANGE"), vec![0]);
    }
}

// =============================================================================
// Snapshots
// =============================================================================

#[test]
fn discovered_graph_survives_a_snapshot() {
    let tool = change_branch_tool();
    let mut reader = reader(&tool, far_future());
    reader.read_element("foo.txt").unwrap();
    reader.resolve_fixups();
    let (graph, _, _) = reader.into_parts();

    let dir = tempfile::TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("graph.json"));
    store.save(&graph).unwrap();
    assert_eq!(store.load().unwrap(), graph);
}
