//! In-memory template engine for testing.

use crate::engine::TemplateEngine;
use crate::error::Result;
use crate::fields::{Fields, SEQ};
use crate::token::TokenTemplate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory template engine for testing.
///
/// Wraps a [`TokenTemplate`] for resolution and extraction, but enumerates
/// from an explicit path set instead of walking a filesystem. Tests add and
/// remove abstract paths directly to simulate captures and external deletes
/// without touching disk.
///
/// # Examples
///
/// ```
/// use flipdeck_template::{Fields, MockEngine, TemplateEngine};
///
/// let engine = MockEngine::new("/lib/{node}/v{version:03}/{node}_v{version:03}.{SEQ}.exr")
///     .with_paths(["/lib/flip/v001/flip_v001.$F4.exr"]);
/// let paths = engine.enumerate(&Fields::new().with("SEQ", "$F4")).unwrap();
/// assert_eq!(paths.len(), 1);
/// ```
pub struct MockEngine {
    template: TokenTemplate,
    paths: RwLock<BTreeSet<PathBuf>>,
}

impl MockEngine {
    /// Create a mock engine over the given template text.
    ///
    /// Panics on template syntax errors. The panic here is DELIBERATE:
    /// MockEngine is intended to be used in tests, where broken setup should
    /// not pass.
    pub fn new(template: &str) -> Self {
        let template = template.parse().unwrap_or_else(|_| panic!("MockEngine::new: invalid template `{template}`"));
        Self { template, paths: RwLock::new(BTreeSet::new()) }
    }

    /// Pre-populate the engine with abstract paths.
    ///
    /// Panics if a path doesn't match the template; see [`Self::new`].
    pub fn with_paths(self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        for path in paths {
            self.insert(path);
        }
        self
    }

    /// Simulate a capture appearing on disk.
    pub fn insert(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.template.extract(&path).is_err() {
            panic!("MockEngine::insert: path does not match template: {}", path.display());
        }
        self.paths.write().unwrap().insert(path);
    }

    /// Simulate an external delete.
    pub fn remove(&self, path: &Path) {
        self.paths.write().unwrap().remove(path);
    }
}

impl TemplateEngine for MockEngine {
    fn resolve(&self, fields: &Fields) -> Result<PathBuf> {
        self.template.resolve(fields)
    }

    fn enumerate(&self, context: &Fields) -> Result<Vec<PathBuf>> {
        let paths = self.paths.read().unwrap();
        let mut matches = Vec::new();
        for path in paths.iter() {
            let Ok(fields) = self.template.extract(path) else {
                continue;
            };
            // Stored paths are already abstract; a path matches when every
            // bound context field (the frame marker aside) agrees.
            let agrees = context
                .iter()
                .filter(|(key, _)| *key != SEQ)
                .all(|(key, value)| fields.get(key).is_none_or(|found| found == value));
            if agrees {
                matches.push(path.clone());
            }
        }
        Ok(matches)
    }

    fn extract(&self, path: &Path) -> Result<Fields> {
        self.template.extract(path)
    }
}
