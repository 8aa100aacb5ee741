//! tool::parse
//!
//! Parsers for the tool's response lines.
//!
//! Every function takes the lines of one response, as produced by
//! [`super::protocol::PromptFramer`], and returns typed data. An empty
//! response is a normal "nothing there" answer, never an error.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::protocol::FIELD_SEPARATOR;
use crate::core::types::{parse_tool_timestamp, ElementVersionPath, Oid, VersionPath};

/// Kind marker printed by `%m` for directories.
const DIRECTORY_ELEMENT: &str = "directory element";

/// Malformed response, with a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed(pub String);

/// What a directory entry points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEntryTarget {
    /// A cataloged element, by oid.
    Element(Oid),
    /// A symbolic link and its target path.
    Symlink(String),
}

/// Answer of the object id query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub oid: Oid,
    pub is_directory: bool,
}

/// Everything the metadata query reports about one version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionInfo {
    pub author_name: String,
    pub author_login: String,
    pub date: DateTime<Utc>,
    pub comment: String,
    pub labels: Vec<String>,
    /// Versions this one was merged into.
    pub merges_to: Vec<VersionPath>,
    /// Versions merged into this one.
    pub merges_from: Vec<VersionPath>,
}

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^===> name: "([^"]+)""#).expect("static regex is valid"))
}

fn oid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"cataloged oid: (\S+) \(mtype \d+\)").expect("static regex is valid")
    })
}

fn symlink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.+ --> (.+)$").expect("static regex is valid"))
}

fn hyperlink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(->|<-)\s*"([^"]+)""#).expect("static regex is valid"))
}

/// Version suffixes from `lsvtree` output: the text after the last `@@`.
///
/// Branch-only entries (`\main\REL1`) are kept; callers filter them with
/// [`VersionPath::is_full_version`].
pub fn version_tree(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.rfind("@@").map(|i| line[i + 2..].trim().to_string()))
        .filter(|suffix| !suffix.is_empty())
        .collect()
}

/// Entries of an `ls -dump` listing.
///
/// An entry header opens an entry; the following oid or symlink line closes
/// it. Headers that never get a target are dropped.
pub fn directory_dump(lines: &[String]) -> BTreeMap<String, DirEntryTarget> {
    let mut entries = BTreeMap::new();
    let mut name: Option<String> = None;
    let mut target: Option<DirEntryTarget> = None;

    for line in lines {
        if let Some(caps) = entry_regex().captures(line) {
            if let (Some(name), Some(target)) = (name.take(), target.take()) {
                entries.insert(name, target);
            }
            name = Some(caps[1].to_string());
            target = None;
        } else if let Some(caps) = oid_regex().captures(line) {
            match Oid::new(&caps[1]) {
                Ok(oid) => target = Some(DirEntryTarget::Element(oid)),
                Err(e) => tracing::warn!(line = %line, error = %e, "ignoring unreadable oid"),
            }
        } else if let Some(caps) = symlink_regex().captures(line) {
            target = Some(DirEntryTarget::Symlink(caps[1].to_string()));
        }
    }
    if let (Some(name), Some(target)) = (name, target) {
        entries.insert(name, target);
    }
    entries
}

/// `oid§kind` from the object id query; `None` when nothing was printed.
pub fn object_info(lines: &[String]) -> Result<Option<ObjectInfo>, Malformed> {
    let Some(first) = lines.first() else {
        return Ok(None);
    };
    let mut parts = first.split(FIELD_SEPARATOR);
    let oid = parts.next().unwrap_or_default().trim();
    let kind = parts
        .next()
        .ok_or_else(|| Malformed(format!("missing element kind in {first:?}")))?;
    let oid = Oid::new(oid).map_err(|e| Malformed(e.to_string()))?;
    Ok(Some(ObjectInfo {
        oid,
        is_directory: kind.trim() == DIRECTORY_ELEMENT,
    }))
}

/// Predecessor version suffix; `None` when the tool printed nothing.
pub fn predecessor(lines: &[String]) -> Result<Option<VersionPath>, Malformed> {
    lines
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(|line| VersionPath::parse(line).map_err(|e| Malformed(e.to_string())))
        .transpose()
}

/// Fields of the metadata query.
///
/// Comments may span lines, so the response is rejoined with `\r\n`
/// before splitting on the separator.
pub fn version_metadata(lines: &[String]) -> Result<VersionInfo, Malformed> {
    let raw = lines.join("\r\n");
    let parts: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if parts.len() < 5 {
        return Err(Malformed(format!(
            "expected at least 5 fields, found {} in {raw:?}",
            parts.len()
        )));
    }
    let date = parse_tool_timestamp(parts[2]).map_err(|e| Malformed(e.to_string()))?;
    let labels = parts[4].split_whitespace().map(str::to_string).collect();
    let (merges_to, merges_from) = parts.get(5).map(|field| merge_links(field)).unwrap_or_default();

    Ok(VersionInfo {
        author_name: parts[0].to_string(),
        author_login: parts[1].to_string(),
        date,
        comment: parts[3].to_string(),
        labels,
        merges_to,
        merges_from,
    })
}

/// Split the `%[hlink:Merge]p` field into (to, from) version suffixes.
fn merge_links(field: &str) -> (Vec<VersionPath>, Vec<VersionPath>) {
    let mut to = Vec::new();
    let mut from = Vec::new();
    for caps in hyperlink_regex().captures_iter(field) {
        match ElementVersionPath::parse(&caps[2]) {
            Ok(path) if &caps[1] == "->" => to.push(path.version().clone()),
            Ok(path) => from.push(path.version().clone()),
            Err(e) => tracing::debug!(link = &caps[2], error = %e, "ignoring merge hyperlink"),
        }
    }
    (to, from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn version_tree_keeps_suffix_after_last_marker() {
        let out = lines(&[
            r"foo.txt@@\main",
            r"foo.txt@@\main\0",
            r"odd@@name.txt@@\main\CHANGE\1",
            "no marker here",
        ]);
        assert_eq!(
            version_tree(&out),
            vec![r"\main", r"\main\0", r"\main\CHANGE\1"]
        );
    }

    #[test]
    fn directory_dump_with_oid_and_symlink() {
        let out = lines(&[
            r#"===> name: "a.txt""#,
            "cataloged oid: 40a1 (mtype 0)",
            r#"===> name: "link""#,
            "x --> ../target",
        ]);
        let entries = directory_dump(&out);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries["a.txt"],
            DirEntryTarget::Element(Oid::new("40a1").unwrap())
        );
        assert_eq!(entries["link"], DirEntryTarget::Symlink("../target".to_string()));
    }

    #[test]
    fn directory_dump_drops_entries_without_target() {
        let out = lines(&[
            r#"===> name: "ghost""#,
            "some unrelated detail",
            r#"===> name: "real""#,
            "  cataloged oid: 77 (mtype 4)",
        ]);
        let entries = directory_dump(&out);
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["real"]);
    }

    #[test]
    fn object_info_kinds() {
        let dir = object_info(&lines(&["d1§directory element"])).unwrap().unwrap();
        assert!(dir.is_directory);
        assert_eq!(dir.oid.as_str(), "d1");

        let file = object_info(&lines(&["f1§file element"])).unwrap().unwrap();
        assert!(!file.is_directory);

        assert_eq!(object_info(&[]).unwrap(), None);
        assert!(object_info(&lines(&["just-an-oid"])).is_err());
    }

    #[test]
    fn predecessor_parsing() {
        assert_eq!(predecessor(&[]).unwrap(), None);
        let pred = predecessor(&lines(&[r"\main\REL1\2"])).unwrap().unwrap();
        assert_eq!(pred.branch().as_str(), "REL1");
        assert_eq!(pred.number(), 2);
        assert!(predecessor(&lines(&["garbage"])).is_err());
    }

    #[test]
    fn metadata_basic_fields() {
        let info =
            version_metadata(&lines(&["Alice§alice§20230101.120000§a comment§LABEL1 LABEL2"]))
                .unwrap();
        assert_eq!(info.author_name, "Alice");
        assert_eq!(info.author_login, "alice");
        assert_eq!(info.date, Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(info.comment, "a comment");
        assert_eq!(info.labels, vec!["LABEL1", "LABEL2"]);
        assert!(info.merges_to.is_empty());
        assert!(info.merges_from.is_empty());
    }

    #[test]
    fn metadata_multiline_comment() {
        let info = version_metadata(&lines(&[
            "Bob§bob§20200202.020202§first line",
            "second line§§",
        ]))
        .unwrap();
        assert_eq!(info.comment, "first line\r\nsecond line");
        assert!(info.labels.is_empty());
    }

    #[test]
    fn metadata_merge_hyperlinks() {
        let info = version_metadata(&lines(&[
            r#"A§a§20210101.000000§§§Merge@12@\vob -> "M:\v\foo.c@@\main\REL1\3" Merge@13@\vob <- "M:\v\foo.c@@\main\DEV\7""#,
        ]))
        .unwrap();
        assert_eq!(info.merges_to.len(), 1);
        assert_eq!(info.merges_to[0].branch().as_str(), "REL1");
        assert_eq!(info.merges_to[0].number(), 3);
        assert_eq!(info.merges_from.len(), 1);
        assert_eq!(info.merges_from[0].branch().as_str(), "DEV");
        assert_eq!(info.merges_from[0].number(), 7);
    }

    #[test]
    fn metadata_rejects_short_or_bad_dates() {
        assert!(version_metadata(&lines(&["A§a§20210101.000000"])).is_err());
        assert!(version_metadata(&lines(&["A§a§yesterday§c§"])).is_err());
    }
}
