//! One open working-file session over the flipbook library.
//!
//! [`Session`] owns the version tree and coordinates the collaborators around
//! it: the discovery engine for disk state, the naming policy for new
//! captures, and the external tools for capture, playback and publishing.
//! Every operation is synchronous and sequential; the tree the caller reads
//! is always the result of the last completed operation.

use crate::dispatch::{CaptureJob, CaptureTool, PublishRecord, Publisher, Viewer};
use crate::discovery::{DiscoveryEngine, ReconcileReport};
use crate::error::{ErrorKind, Result};
use crate::model::{ArtifactId, COMMENT, FRAME_RANGE, RESOLUTION, VersionTree};
use crate::naming::{self, CapturePlan, CaptureSpec, ExpressionExpander};
use exn::ResultExt;
use flipdeck_store::Document;
use flipdeck_template::SEQ;
use serde_json::json;
use std::path::PathBuf;

/// What came out of a create request.
///
/// Capture dispatch succeeding is the only hard requirement; the bookkeeping
/// that follows degrades to warnings carried here, so callers can tell the
/// user without treating a rendered flipbook as a failure.
#[derive(Debug)]
pub struct CreateOutcome {
    pub plan: CapturePlan,
    /// Whether the comment/range/resolution document reached the sidecar.
    pub metadata_saved: bool,
    /// Set when the publish registration was attempted and failed.
    pub publish_warning: Option<String>,
}

/// The library session: one context (working file), one tree, one set of
/// collaborators.
pub struct Session {
    discovery: DiscoveryEngine,
    capture: Box<dyn CaptureTool>,
    viewer: Box<dyn Viewer>,
    /// Publishing is optional; sites without a registry run without one.
    publisher: Option<Box<dyn Publisher>>,
    expander: Box<dyn ExpressionExpander>,
    tree: VersionTree,
}

impl Session {
    /// A session starts empty; call [`Session::reload`] to populate the tree
    /// from disk.
    pub fn new(
        discovery: DiscoveryEngine,
        capture: Box<dyn CaptureTool>,
        viewer: Box<dyn Viewer>,
        publisher: Option<Box<dyn Publisher>>,
        expander: Box<dyn ExpressionExpander>,
    ) -> Self {
        Self { discovery, capture, viewer, publisher, expander, tree: VersionTree::default() }
    }

    pub fn tree(&self) -> &VersionTree {
        &self.tree
    }

    /// Validate, dispatch and record a new capture.
    ///
    /// Order matters: the plan reserves the slot before the capture tool is
    /// told to run, the sidecar document is written before the rescan so the
    /// new record materializes with its metadata attached, and publishing
    /// happens last, against the final path.
    #[tracing::instrument(skip_all, fields(name = %spec.name))]
    pub fn create(&mut self, spec: &CaptureSpec) -> Result<CreateOutcome> {
        let plan = naming::prepare(
            spec,
            &self.tree,
            self.discovery.engine().as_ref(),
            self.expander.as_ref(),
            self.discovery.context(),
            self.discovery.store(),
        )
        .or_raise(|| ErrorKind::Naming)?;

        let job = CaptureJob {
            frame_range: plan.frame_range,
            resolution: plan.resolution,
            output_path: plan.path.clone(),
            background: plan.background,
        };
        self.capture.capture(&job).or_raise(|| ErrorKind::Dispatch)?;

        // The capture tool runs detached; the record below only becomes
        // visible to us through the rescan.
        let metadata_saved = match self.artifact_document(spec, &plan) {
            Some((id, document)) => match self.discovery.store().put(id.as_str(), document) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "flipbook captured but its metadata was not saved");
                    false
                },
            },
            None => false,
        };

        self.refresh()?;

        let publish_warning = self.publisher.as_ref().and_then(|publisher| {
            let record = PublishRecord {
                path: plan.path.clone(),
                display_name: format!("{}_v{:03}", plan.name, plan.version),
                version: plan.version,
                comment: spec.comment.clone(),
                kind: PublishRecord::KIND,
            };
            match publisher.publish(&record) {
                Ok(()) => None,
                Err(err) => {
                    tracing::warn!(error = %err, "flipbook captured but not published");
                    Some(err.to_string())
                },
            }
        });

        Ok(CreateOutcome { plan, metadata_saved, publish_warning })
    }

    /// Reconcile the tree against disk, preserving records for unchanged
    /// artifacts.
    pub fn refresh(&mut self) -> Result<ReconcileReport> {
        self.discovery.refresh_tree(&mut self.tree).or_raise(|| ErrorKind::Discovery)
    }

    /// Rebuild the tree from scratch. For initial load and navigation, where
    /// nothing about the previous tree is worth keeping.
    pub fn reload(&mut self) -> Result<()> {
        self.tree = self.discovery.fill_tree().or_raise(|| ErrorKind::Discovery)?;
        Ok(())
    }

    /// Attach or replace the user comment on one artifact, in the sidecar
    /// store first and the in-memory record second. Unknown ids are a no-op.
    ///
    /// Only the comment key changes: the rest of the artifact's document
    /// (creation-time range and resolution, keys other tooling wrote) is
    /// carried through the write untouched.
    pub fn set_comment(&mut self, id: &ArtifactId, text: &str) -> Result<()> {
        if self.tree.artifact(id).is_none() {
            return Ok(());
        }
        let mut document = self.discovery.store().get(id.as_str()).or_raise(|| ErrorKind::Store)?;
        document.insert(COMMENT.to_string(), json!(text));
        self.discovery.store().put(id.as_str(), document.clone()).or_raise(|| ErrorKind::Store)?;
        if let Some(artifact) = self.tree.artifact_mut(id) {
            artifact.document = document;
        }
        Ok(())
    }

    /// Delete the selected flipbooks everywhere: frames, sidecar entries,
    /// tree. Failures on one selection don't stop the others.
    pub fn remove(&mut self, ids: &[ArtifactId]) -> Result<()> {
        self.discovery.remove_artifacts(&mut self.tree, ids).or_raise(|| ErrorKind::Removal)
    }

    /// Hand the selected sequences to the external viewer at the given frame
    /// rate. Ids the tree doesn't know are skipped.
    pub fn play(&self, ids: &[ArtifactId], rate: f64) -> Result<()> {
        let paths = self.selected_paths(ids);
        self.viewer.play(&paths, rate).or_raise(|| ErrorKind::Dispatch)
    }

    /// The selected artifact paths as one newline-joined string, with the
    /// session's frame marker rewritten to the `####` convention other tools
    /// expect.
    pub fn clipboard_paths(&self, ids: &[ArtifactId]) -> String {
        let marker = self.discovery.context().text(SEQ);
        self.selected_paths(ids)
            .iter()
            .map(|path| {
                let text = path.to_string_lossy();
                match marker {
                    Some(marker) => text.replace(marker, "####"),
                    None => text.into_owned(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn selected_paths(&self, ids: &[ArtifactId]) -> Vec<PathBuf> {
        ids.iter()
            .filter_map(|id| match self.tree.artifact(id) {
                Some(artifact) => Some(artifact.path.clone()),
                None => {
                    tracing::warn!(%id, "selection no longer in the tree; skipping");
                    None
                },
            })
            .collect()
    }

    /// The creation-time document for a fresh capture: comment when given,
    /// plus the frame range and any explicit resolution.
    fn artifact_document(&self, spec: &CaptureSpec, plan: &CapturePlan) -> Option<(ArtifactId, Document)> {
        let id = ArtifactId::from_path(&plan.path)?;
        let mut document = Document::new();
        if let Some(comment) = &spec.comment {
            document.insert(COMMENT.to_string(), json!(comment));
        }
        document.insert(FRAME_RANGE.to_string(), json!([plan.frame_range.0, plan.frame_range.1]));
        if let Some((width, height)) = plan.resolution {
            document.insert(RESOLUTION.to_string(), json!([width, height]));
        }
        Some((id, document))
    }
}
