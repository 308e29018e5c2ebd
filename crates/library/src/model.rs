//! The grouped version tree and its records.
//!
//! Artifacts are transient view objects rebuilt from filesystem scans; the
//! tree is an explicit owned structure passed to and from the discovery
//! engine, never ambient state. Views hold read-only projections plus
//! visibility flags keyed by [`NodeId`], so reconciliation can preserve their
//! state for artifacts that survive a scan.

use flipdeck_store::Document;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Well-known document key for the user comment.
pub const COMMENT: &str = "comment";
/// Well-known document key for the captured frame range.
pub const FRAME_RANGE: &str = "frame_range";
/// Well-known document key for the captured resolution.
pub const RESOLUTION: &str = "resolution";

/// Stable artifact identity: the filename stem of its templated path, which
/// doubles as the sidecar document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Derive the id from a path's filename stem (text before the first `.`,
    /// so frame markers and extensions never leak into identity).
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let stem = name.split('.').next()?;
        (!stem.is_empty()).then(|| Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One captured flipbook version.
///
/// `(group, version)` is unique within a tree. Version numbers within a group
/// may have gaps: deletion never renumbers survivors.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    /// The user-chosen flipbook name this version belongs to.
    pub group: String,
    pub version: u32,
    /// Templated location; may carry a frame-sequence marker.
    pub path: PathBuf,
    /// Cached copy of the sidecar document, fetched when the record was
    /// materialized. The store stays the single source of truth.
    pub document: Document,
}

impl ArtifactRecord {
    pub fn comment(&self) -> Option<&str> {
        self.document.get(COMMENT)?.as_str()
    }

    pub fn set_comment(&mut self, text: impl Into<String>) {
        self.document.insert(COMMENT.to_string(), Value::String(text.into()));
    }

    /// Frame range recorded at creation, when present. Informational only.
    pub fn frame_range(&self) -> Option<(u32, u32)> {
        Self::pair(self.document.get(FRAME_RANGE)?)
    }

    /// Resolution recorded at creation, when present. Informational only.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        Self::pair(self.document.get(RESOLUTION)?)
    }

    fn pair(value: &Value) -> Option<(u32, u32)> {
        let items = value.as_array()?;
        match items.as_slice() {
            [a, b] => Some((a.as_u64()? as u32, b.as_u64()? as u32)),
            _ => None,
        }
    }
}

/// All versions sharing one user-given flipbook name, version-ascending.
///
/// Groups exist implicitly: created when their first artifact is inserted,
/// removed when their last one goes.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionGroup {
    pub name: String,
    pub artifacts: Vec<ArtifactRecord>,
}

impl VersionGroup {
    /// Highest version present in this group.
    pub fn latest_version(&self) -> Option<u32> {
        self.artifacts.iter().map(|a| a.version).max()
    }
}

/// Identity of a tree node, usable as a view-state key (selection, expansion)
/// that survives reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    Group(String),
    Artifact(ArtifactId),
}

/// A borrowed view of one tree node, tagged by kind.
///
/// Replaces runtime type inspection of widget items: consumers match on the
/// variant instead of downcasting.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Group(&'a VersionGroup),
    Artifact(&'a ArtifactRecord),
}

impl Node<'_> {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Group(group) => NodeId::Group(group.name.clone()),
            Self::Artifact(artifact) => NodeId::Artifact(artifact.id.clone()),
        }
    }

    /// Display label: the group name, or an artifact's `v`-prefixed version.
    pub fn label(&self) -> String {
        match self {
            Self::Group(group) => group.name.clone(),
            Self::Artifact(artifact) => format!("v{:03}", artifact.version),
        }
    }
}

/// The grouped-by-name, ordered-by-version artifact tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionTree {
    groups: Vec<VersionGroup>,
}

impl VersionTree {
    pub fn groups(&self) -> &[VersionGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&VersionGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn artifact(&self, id: &ArtifactId) -> Option<&ArtifactRecord> {
        self.artifacts().find(|a| &a.id == id)
    }

    pub fn artifact_mut(&mut self, id: &ArtifactId) -> Option<&mut ArtifactRecord> {
        self.groups.iter_mut().flat_map(|g| g.artifacts.iter_mut()).find(|a| &a.id == id)
    }

    /// Every artifact, group by group in tree order.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.groups.iter().flat_map(|g| g.artifacts.iter())
    }

    /// Pre-order traversal: each group followed by its artifacts.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        self.groups
            .iter()
            .flat_map(|g| std::iter::once(Node::Group(g)).chain(g.artifacts.iter().map(Node::Artifact)))
    }

    /// Highest version recorded under `name`, if the group exists.
    pub fn latest_version(&self, name: &str) -> Option<u32> {
        self.group(name)?.latest_version()
    }

    /// Attach a record at the end of its group, creating the group (at the
    /// end of the tree) on its first artifact.
    pub fn insert(&mut self, record: ArtifactRecord) {
        match self.groups.iter_mut().find(|g| g.name == record.group) {
            Some(group) => group.artifacts.push(record),
            None => self.groups.push(VersionGroup {
                name: record.group.clone(),
                artifacts: vec![record],
            }),
        }
    }

    /// Detach an artifact, pruning its group if that was the last one.
    /// Returns the detached record, or `None` if the id is unknown.
    pub fn remove(&mut self, id: &ArtifactId) -> Option<ArtifactRecord> {
        let group_index = self.groups.iter().position(|g| g.artifacts.iter().any(|a| &a.id == id))?;
        let group = &mut self.groups[group_index];
        let artifact_index = group.artifacts.iter().position(|a| &a.id == id)?;
        let record = group.artifacts.remove(artifact_index);
        if group.artifacts.is_empty() {
            self.groups.remove(group_index);
        }
        Some(record)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total artifact count across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.artifacts.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn record(group: &str, version: u32) -> ArtifactRecord {
        let id = format!("{group}_v{version:03}");
        ArtifactRecord {
            id: ArtifactId::from(id.as_str()),
            group: group.to_string(),
            version,
            path: PathBuf::from(format!("/lib/{group}/v{version:03}/{id}.$F4.exr")),
            document: Document::new(),
        }
    }

    #[test]
    fn test_id_from_path_takes_stem_before_first_dot() {
        let id = ArtifactId::from_path(Path::new("/lib/flip/v001/flip_v001.$F4.exr")).unwrap();
        assert_eq!(id.as_str(), "flip_v001");
        assert!(ArtifactId::from_path(Path::new("/")).is_none());
    }

    #[test]
    fn test_insert_groups_by_name_in_arrival_order() {
        let mut tree = VersionTree::default();
        tree.insert(record("flip", 1));
        tree.insert(record("wire", 1));
        tree.insert(record("flip", 2));
        let names: Vec<_> = tree.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["flip", "wire"]);
        assert_eq!(tree.group("flip").unwrap().artifacts.len(), 2);
        assert_eq!(tree.latest_version("flip"), Some(2));
    }

    #[test]
    fn test_remove_prunes_empty_group() {
        let mut tree = VersionTree::default();
        tree.insert(record("flip", 1));
        tree.insert(record("flip", 2));
        tree.insert(record("wire", 1));

        tree.remove(&ArtifactId::from("wire_v001")).unwrap();
        assert!(tree.group("wire").is_none());
        // Sibling removal leaves the group intact.
        tree.remove(&ArtifactId::from("flip_v001")).unwrap();
        assert!(tree.group("flip").is_some());
        assert_eq!(tree.len(), 1);
        // Unknown id is a quiet None.
        assert!(tree.remove(&ArtifactId::from("flip_v001")).is_none());
    }

    #[test]
    fn test_nodes_preorder() {
        let mut tree = VersionTree::default();
        tree.insert(record("flip", 1));
        tree.insert(record("flip", 2));
        let labels: Vec<_> = tree.nodes().map(|n| n.label()).collect();
        assert_eq!(labels, ["flip", "v001", "v002"]);
    }

    #[test]
    fn test_document_accessors() {
        let mut artifact = record("flip", 1);
        assert!(artifact.comment().is_none());
        artifact.set_comment("first pass");
        assert_eq!(artifact.comment(), Some("first pass"));

        artifact.document.insert(FRAME_RANGE.into(), json!([1, 48]));
        artifact.document.insert(RESOLUTION.into(), json!([1280, 720]));
        assert_eq!(artifact.frame_range(), Some((1, 48)));
        assert_eq!(artifact.resolution(), Some((1280, 720)));
    }
}
