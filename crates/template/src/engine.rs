//! The engine seam between the core and any concrete template syntax.

use crate::error::Result;
use crate::fields::Fields;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maps semantic fields to and from concrete flipbook paths.
///
/// The core of the system depends only on these three operations and treats
/// template syntax as opaque. [`TokenTemplate`](crate::TokenTemplate) is the
/// built-in implementation; hosts with their own path-resolution machinery
/// can supply theirs instead.
pub trait TemplateEngine {
    /// Renders a complete field map into a concrete path.
    fn resolve(&self, fields: &Fields) -> Result<PathBuf>;

    /// Lists every path on disk matching the template, with the given context
    /// fields bound and all other fields free.
    ///
    /// Frame files are collapsed to a single abstract path carrying the
    /// context's frame-sequence marker. The result is sorted, which — with
    /// zero-padded version tokens — yields version-ascending order within a
    /// group.
    fn enumerate(&self, context: &Fields) -> Result<Vec<PathBuf>>;

    /// Recovers the field map embedded in a concrete (or abstract) path.
    fn extract(&self, path: &Path) -> Result<Fields>;
}

pub type EngineHandle = Arc<dyn TemplateEngine + Send + Sync>;
