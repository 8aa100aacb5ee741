//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - ClearCase object identifier of an element
//! - [`BranchName`] - Validated branch type name (`main`, `REL1`, ...)
//! - [`BranchVersion`] - A version addressed inside one element
//! - [`VersionKey`] - A version addressed globally (element oid included)
//! - [`VersionPath`] - A version-extended suffix such as `\main\REL1\3`
//! - [`ElementVersionPath`] - A full `element@@\main\...\N` path
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so the graph never has to re-check them.
//!
//! # Examples
//!
//! ```
//! use vobgraph::core::types::{BranchName, ElementVersionPath, VersionPath};
//!
//! let path = VersionPath::parse(r"\main\REL1\3").unwrap();
//! assert_eq!(path.branch().as_str(), "REL1");
//! assert_eq!(path.parent_branch().map(BranchName::as_str), Some("main"));
//! assert_eq!(path.number(), 3);
//!
//! let full = ElementVersionPath::parse(r"src\foo.c@@\main\2").unwrap();
//! assert_eq!(full.element(), r"src\foo.c");
//!
//! assert!(BranchName::new("has space").is_err());
//! ```

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the branch every element starts on.
pub const ROOT_BRANCH: &str = "main";

/// Prefix of synthetic oids minted for symbolic links.
const SYMLINK_PREFIX: &str = "symlink:";

/// Timestamp layout produced by the `%Nd` format directive.
const TOOL_TIMESTAMP_FORMAT: &str = "%Y%m%d.%H%M%S";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid version path: {0}")]
    InvalidVersionPath(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// A ClearCase object identifier.
///
/// The oid is the only identity that survives renames and repeated imports.
/// Symbolic links have no oid of their own; they get a synthetic one built
/// with [`Oid::symlink`].
///
/// # Example
///
/// ```
/// use vobgraph::core::types::Oid;
///
/// let oid = Oid::new("40a1b2c3.d4e5.11d2.b3a4.00104bb1c6f1").unwrap();
/// assert!(!oid.is_symlink());
///
/// let link = Oid::symlink(&oid, "../target");
/// assert!(link.is_symlink());
/// assert!(Oid::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is empty or contains
    /// control characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into();
        if oid.is_empty() {
            return Err(TypeError::InvalidOid("object id cannot be empty".into()));
        }
        if oid.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidOid(format!(
                "object id cannot contain control characters: {oid:?}"
            )));
        }
        Ok(Self(oid))
    }

    /// Synthetic id for a symbolic link found in `directory`.
    ///
    /// Two entries of the same directory pointing at the same target share
    /// one pseudo-element.
    pub fn symlink(directory: &Oid, target: &str) -> Self {
        Self(format!("{SYMLINK_PREFIX}{}:{}", directory.0, target))
    }

    /// Whether this id was minted by [`Oid::symlink`].
    pub fn is_symlink(&self) -> bool {
        self.0.starts_with(SYMLINK_PREFIX)
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated branch type name.
///
/// Branch names are single path segments of a version-extended path:
/// letters, digits, `_`, `.` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` for empty names or names with
    /// characters outside `[A-Za-z0-9_.-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot contain '{c}': {name}"
            )));
        }
        Ok(Self(name))
    }

    /// The root branch (`main`).
    pub fn root() -> Self {
        Self(ROOT_BRANCH.to_string())
    }

    /// Whether this is the root branch.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_BRANCH
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A version addressed relative to its element: branch name plus number.
///
/// This is how merge links and branching points are stored, so the graph
/// holds no pointers between versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchVersion {
    pub branch: BranchName,
    pub number: u32,
}

impl BranchVersion {
    pub fn new(branch: BranchName, number: u32) -> Self {
        Self { branch, number }
    }
}

impl fmt::Display for BranchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.branch, self.number)
    }
}

/// A version addressed globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    pub element: Oid,
    pub branch: BranchName,
    pub number: u32,
}

impl VersionKey {
    pub fn new(element: Oid, branch: BranchName, number: u32) -> Self {
        Self {
            element,
            branch,
            number,
        }
    }

    /// Drop the element part.
    pub fn local(&self) -> BranchVersion {
        BranchVersion::new(self.branch.clone(), self.number)
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.element, self.branch, self.number)
    }
}

/// A version-extended suffix such as `\main\REL1\3`.
///
/// The branch chain is kept in order from the root, so the parent branch of
/// a version is simply the previous segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionPath {
    branches: Vec<BranchName>,
    number: u32,
}

impl VersionPath {
    /// Parse a suffix that ends with a version number.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersionPath` for pseudo branch entries
    /// (`\main\REL1`), missing branches or invalid branch names.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let mut segments: Vec<&str> = raw.split('\\').filter(|s| !s.is_empty()).collect();
        let last = segments
            .pop()
            .ok_or_else(|| TypeError::InvalidVersionPath(raw.to_string()))?;
        let number = last
            .parse::<u32>()
            .map_err(|_| TypeError::InvalidVersionPath(raw.to_string()))?;
        if segments.is_empty() {
            return Err(TypeError::InvalidVersionPath(raw.to_string()));
        }
        let branches = segments
            .into_iter()
            .map(BranchName::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TypeError::InvalidVersionPath(format!("{raw}: {e}")))?;
        Ok(Self { branches, number })
    }

    /// Whether `raw` names an actual version rather than a branch.
    pub fn is_full_version(raw: &str) -> bool {
        raw.rsplit('\\')
            .next()
            .is_some_and(|last| !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()))
    }

    /// The branch this version lives on.
    pub fn branch(&self) -> &BranchName {
        // parse() guarantees at least one branch
        &self.branches[self.branches.len() - 1]
    }

    /// The branch this version's branch forked from, if any.
    pub fn parent_branch(&self) -> Option<&BranchName> {
        self.branches.len().checked_sub(2).map(|i| &self.branches[i])
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Branch chain from the root.
    pub fn branches(&self) -> &[BranchName] {
        &self.branches
    }

    pub fn local(&self) -> BranchVersion {
        BranchVersion::new(self.branch().clone(), self.number)
    }
}

impl fmt::Display for VersionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for branch in &self.branches {
            write!(f, "\\{branch}")?;
        }
        write!(f, "\\{}", self.number)
    }
}

fn element_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*)@@((?:\\[\w.\-]+)+\\\d+)$").expect("static regex is valid")
    })
}

/// A full `element@@\branch\...\N` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementVersionPath {
    element: String,
    version: VersionPath,
}

impl ElementVersionPath {
    /// Parse a fully qualified version path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersionPath` if the line is not of the
    /// form `element@@\branch...\N`.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let caps = element_version_regex()
            .captures(raw.trim())
            .ok_or_else(|| TypeError::InvalidVersionPath(raw.to_string()))?;
        let element = caps[1].to_string();
        if element.is_empty() {
            return Err(TypeError::InvalidVersionPath(raw.to_string()));
        }
        let version = VersionPath::parse(&caps[2])?;
        Ok(Self { element, version })
    }

    pub fn new(element: impl Into<String>, version: VersionPath) -> Self {
        Self {
            element: element.into(),
            version,
        }
    }

    /// Element path without the `@@` suffix.
    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn version(&self) -> &VersionPath {
        &self.version
    }
}

impl fmt::Display for ElementVersionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@@{}", self.element, self.version)
    }
}

/// Canonical element name: the path without a trailing `@@`.
pub fn canonical_element_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_suffix("@@").unwrap_or(trimmed)
}

/// Parse a `%Nd` timestamp (`yyyyMMdd.HHmmss`) as UTC.
pub fn parse_tool_timestamp(raw: &str) -> Result<DateTime<Utc>, TypeError> {
    NaiveDateTime::parse_from_str(raw.trim(), TOOL_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TypeError::InvalidDate(format!("{raw}: {e}")))
}

/// Parse a user supplied cutoff date.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. Dates without an offset are taken as UTC; a bare date means
/// the end of that day.
pub fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>, TypeError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TypeError::InvalidDate(raw.to_string()))
}
