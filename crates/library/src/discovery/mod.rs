//! Flipbook discovery and tree synchronization.
//!
//! Turns the flat set of template-matched paths on disk into the grouped
//! [`VersionTree`](crate::model::VersionTree), and keeps the two in sync:
//! [`DiscoveryEngine::fill_tree`] rebuilds from scratch (initial load,
//! navigation to another context) while [`DiscoveryEngine::refresh_tree`]
//! reconciles incrementally so callers keep node identity across scans.
//!
//! Explicit deletion also lives here, since it must cascade across all three
//! stores of truth: the frame files, the sidecar document and the tree.

pub mod error;
mod reconcile;

pub use self::reconcile::ReconcileReport;

use self::error::{ErrorKind, Result};
use crate::model::{ArtifactId, ArtifactRecord, VersionTree};
use exn::ResultExt;
use flipdeck_store::MetadataStore;
use flipdeck_template::{EngineHandle, Fields};
use std::fs;
use std::path::{Path, PathBuf};

/// One template-matched path with its extracted identity, before metadata is
/// attached. The ground truth a scan hands to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredArtifact {
    pub id: ArtifactId,
    pub group: String,
    pub version: u32,
    pub path: PathBuf,
}

/// Produces the current artifact set from disk and (re)builds tree state.
///
/// Owns the template-engine handle, the sidecar store and the context fields
/// (working-file name, frame marker) for the duration of a session. All
/// operations are synchronous; one completes before the next begins.
pub struct DiscoveryEngine {
    engine: EngineHandle,
    store: MetadataStore,
    context: Fields,
}

impl DiscoveryEngine {
    pub fn new(engine: EngineHandle, store: MetadataStore, context: Fields) -> Self {
        Self { engine, store, context }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn context(&self) -> &Fields {
        &self.context
    }

    /// Enumerate and identify every flipbook under the current context.
    ///
    /// The result is path-sorted, which — zero-padded version tokens — is
    /// also version-ascending within each group. Paths whose fields can't be
    /// extracted, or that carry no `node` (group) field, can't be grouped:
    /// they are logged and skipped, never fatal.
    #[tracing::instrument(skip_all)]
    pub fn scan(&self) -> Result<Vec<DiscoveredArtifact>> {
        let mut paths = self.engine.enumerate(&self.context).or_raise(|| ErrorKind::Template)?;
        paths.sort();

        let mut discovered = Vec::with_capacity(paths.len());
        for path in paths {
            let fields = match self.engine.extract(&path) {
                Ok(fields) => fields,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "unreadable fields; skipping");
                    continue;
                },
            };
            let Some(group) = fields.text("node") else {
                tracing::warn!(path = %path.display(), "could not find a flipbook name; skipping");
                continue;
            };
            let Some(version) = fields.number("version") else {
                tracing::warn!(path = %path.display(), "could not find a version number; skipping");
                continue;
            };
            let Some(id) = ArtifactId::from_path(&path) else {
                tracing::warn!(path = %path.display(), "path has no filename stem; skipping");
                continue;
            };
            discovered.push(DiscoveredArtifact { id, group: group.to_string(), version, path });
        }
        Ok(discovered)
    }

    /// Full rebuild: discard all groups and repopulate from a fresh scan.
    ///
    /// Used on initial load and on navigation events, where no caller state
    /// is worth preserving.
    pub fn fill_tree(&self) -> Result<VersionTree> {
        let mut tree = VersionTree::default();
        for discovered in self.scan()? {
            let record = self.materialize(&discovered)?;
            tree.insert(record);
        }
        Ok(tree)
    }

    /// Incremental update: reconcile the tree against a fresh scan, keeping
    /// records (and hence caller-visible identity) for unchanged artifacts.
    pub fn refresh_tree(&self, tree: &mut VersionTree) -> Result<ReconcileReport> {
        let scanned = self.scan()?;
        reconcile::reconcile(tree, &scanned, |discovered| self.materialize(discovered))
    }

    /// Delete one artifact everywhere: frame files, sidecar document, tree.
    ///
    /// Idempotent — an id the tree doesn't know is a no-op, not an error.
    #[tracing::instrument(skip(self, tree))]
    pub fn remove_artifact(&self, tree: &mut VersionTree, id: &ArtifactId) -> Result<()> {
        let Some(record) = tree.artifact(id) else {
            return Ok(());
        };
        delete_frames(&record.path, id)?;
        self.store.remove(id.as_str()).or_raise(|| ErrorKind::Store)?;
        tree.remove(id);
        Ok(())
    }

    /// Delete a selection, sequentially and at-least-effort: a failure on one
    /// artifact neither rolls back prior deletions nor stops later ones. The
    /// sidecar entry of *every* successfully deleted artifact is removed.
    pub fn remove_artifacts(&self, tree: &mut VersionTree, ids: &[ArtifactId]) -> Result<()> {
        let mut failures = 0;
        for id in ids {
            if let Err(err) = self.remove_artifact(tree, id) {
                tracing::warn!(%id, error = %err, "failed to remove flipbook; continuing");
                failures += 1;
            }
        }
        match failures {
            0 => Ok(()),
            n => exn::bail!(ErrorKind::Incomplete(n)),
        }
    }

    /// Attach the sidecar document to a discovered artifact.
    fn materialize(&self, discovered: &DiscoveredArtifact) -> Result<ArtifactRecord> {
        let document = self.store.get(discovered.id.as_str()).or_raise(|| ErrorKind::Store)?;
        Ok(ArtifactRecord {
            id: discovered.id.clone(),
            group: discovered.group.clone(),
            version: discovered.version,
            path: discovered.path.clone(),
            document,
        })
    }
}

/// Remove every frame file belonging to `id` from the artifact's directory,
/// then the directory itself once nothing is left in it.
fn delete_frames(path: &Path, id: &ArtifactId) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        // Already gone: deletion is idempotent.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(exn::Exn::from(ErrorKind::Io(err))),
    };
    for entry in entries {
        let entry = entry.map_err(ErrorKind::Io)?;
        let candidate = entry.path();
        if ArtifactId::from_path(&candidate).as_ref() == Some(id) {
            fs::remove_file(&candidate).map_err(ErrorKind::Io)?;
        }
    }
    // The version directory was reserved for this artifact; drop it when
    // emptied. Failure just means something else still lives there.
    _ = fs::remove_dir(parent);
    Ok(())
}
