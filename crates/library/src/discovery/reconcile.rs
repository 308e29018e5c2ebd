//! Tree reconciliation against a fresh scan.
//!
//! Computes the minimal delta between the current tree and a scan result and
//! applies it: new artifacts are attached, vanished ones pruned, and — the
//! point of the exercise — records for unchanged artifacts are left alone, so
//! any caller-held state keyed by their identity survives the refresh.

use crate::discovery::DiscoveredArtifact;
use crate::discovery::error::Result;
use crate::model::{ArtifactId, ArtifactRecord, VersionTree};
use std::collections::BTreeMap;

/// What a reconciliation pass did, as id lists.
///
/// Views use `added`/`removed` to update themselves and may re-derive
/// per-artifact state (thumbnails, previews) for `confirmed` ids that are
/// currently visible; that refresh policy is theirs, not the tree's.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<ArtifactId>,
    pub removed: Vec<ArtifactId>,
    pub confirmed: Vec<ArtifactId>,
}

/// Diff `scanned` against `tree` and apply the delta.
///
/// 1. Index current artifacts by path, all unconfirmed.
/// 2. Walk the scan in order: known paths are confirmed untouched; unknown
///    paths are materialized and attached at the end of their group (created
///    at the end of the tree if new).
/// 3. Anything still unconfirmed has vanished from disk: prune it, and its
///    group when emptied.
///
/// Running the same scan twice is a no-op the second time: same groups, same
/// record identities, nothing duplicated.
pub(crate) fn reconcile(
    tree: &mut VersionTree,
    scanned: &[DiscoveredArtifact],
    materialize: impl Fn(&DiscoveredArtifact) -> Result<ArtifactRecord>,
) -> Result<ReconcileReport> {
    let mut unconfirmed: BTreeMap<_, _> =
        tree.artifacts().map(|a| (a.path.clone(), a.id.clone())).collect();

    let mut report = ReconcileReport::default();
    for discovered in scanned {
        match unconfirmed.remove(&discovered.path) {
            Some(id) => report.confirmed.push(id),
            None => {
                tree.insert(materialize(discovered)?);
                report.added.push(discovered.id.clone());
            },
        }
    }

    // BTreeMap iteration keeps removals path-ordered for stable logs.
    for (path, id) in unconfirmed {
        tracing::info!(%id, path = %path.display(), "flipbook vanished from disk; pruning");
        tree.remove(&id);
        report.removed.push(id);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipdeck_store::Document;
    use std::path::PathBuf;

    fn discovered(group: &str, version: u32) -> DiscoveredArtifact {
        let id = format!("{group}_v{version:03}");
        DiscoveredArtifact {
            id: ArtifactId::from(id.as_str()),
            group: group.to_string(),
            version,
            path: PathBuf::from(format!("/lib/{group}/v{version:03}/{id}.$F4.exr")),
        }
    }

    fn materialize(d: &DiscoveredArtifact) -> Result<ArtifactRecord> {
        Ok(ArtifactRecord {
            id: d.id.clone(),
            group: d.group.clone(),
            version: d.version,
            path: d.path.clone(),
            document: Document::new(),
        })
    }

    #[test]
    fn test_adds_new_artifacts_and_groups() {
        let mut tree = VersionTree::default();
        let scan = [discovered("flip", 1), discovered("flip", 2), discovered("wire", 1)];
        let report = reconcile(&mut tree, &scan, materialize).unwrap();
        assert_eq!(report.added.len(), 3);
        assert_eq!(tree.groups().len(), 2);
        assert_eq!(tree.group("flip").unwrap().latest_version(), Some(2));
    }

    #[test]
    fn test_is_idempotent() {
        let mut tree = VersionTree::default();
        let scan = [discovered("flip", 1), discovered("wire", 1)];
        reconcile(&mut tree, &scan, materialize).unwrap();
        let before = tree.clone();

        let report = reconcile(&mut tree, &scan, materialize).unwrap();
        assert_eq!(tree, before);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(report.confirmed.len(), 2);
    }

    #[test]
    fn test_prunes_vanished_artifacts() {
        let mut tree = VersionTree::default();
        reconcile(&mut tree, &[discovered("a", 1), discovered("a", 2), discovered("b", 1)], materialize)
            .unwrap();

        // a/v2 removed from disk.
        let second = [discovered("a", 1), discovered("b", 1)];
        let report = reconcile(&mut tree, &second, materialize).unwrap();
        assert_eq!(report.removed, vec![ArtifactId::from("a_v002")]);
        let remaining: Vec<_> = tree.artifacts().map(|a| a.id.as_str().to_string()).collect();
        assert_eq!(remaining, ["a_v001", "b_v001"]);
    }

    #[test]
    fn test_prunes_emptied_group() {
        let mut tree = VersionTree::default();
        reconcile(&mut tree, &[discovered("flip", 1), discovered("wire", 1)], materialize).unwrap();
        reconcile(&mut tree, &[discovered("wire", 1)], materialize).unwrap();
        assert!(tree.group("flip").is_none());
        assert!(tree.group("wire").is_some());
    }

    #[test]
    fn test_confirmed_records_keep_their_state() {
        let mut tree = VersionTree::default();
        reconcile(&mut tree, &[discovered("flip", 1)], materialize).unwrap();
        // A caller mutates cached state on the record (e.g. an edited comment).
        tree.artifact_mut(&ArtifactId::from("flip_v001")).unwrap().set_comment("keep me");

        // Materialization would produce a blank document, but confirmed
        // artifacts must not be rebuilt.
        let report =
            reconcile(&mut tree, &[discovered("flip", 1), discovered("flip", 2)], materialize).unwrap();
        assert_eq!(report.confirmed.len(), 1);
        assert_eq!(tree.artifact(&ArtifactId::from("flip_v001")).unwrap().comment(), Some("keep me"));
    }
}
