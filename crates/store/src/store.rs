//! Sidecar metadata persistence.
//!
//! One JSON object per store root: top-level keys are artifact ids (filename
//! stems), values are free-form JSON documents. The store is the single
//! writer of its backing file and always read-merge-writes the whole object,
//! so keys written by other tooling survive round trips untouched.
//!
//! Writes are atomic with respect to process crash: the updated object is
//! serialized to a temporary file in the same directory and renamed over the
//! original, never patched in place.

use crate::error::{ErrorKind, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single artifact's metadata document.
pub type Document = Map<String, Value>;

/// JSON-backed key-value store mapping artifact ids to documents.
///
/// # Examples
///
/// ```
/// use flipdeck_store::MetadataStore;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::tempdir()?;
/// let store = MetadataStore::open(dir.path(), "shot010");
/// let mut doc = serde_json::Map::new();
/// doc.insert("comment".into(), json!("first pass"));
/// store.put("flipbook_v001", doc.clone())?;
/// assert_eq!(store.get("flipbook_v001")?, doc);
/// # Ok(())
/// # }
/// ```
pub struct MetadataStore {
    /// Backing file, `<root>/<stem>.json`.
    path: PathBuf,
}

impl MetadataStore {
    /// Open a store rooted at `root`, named after the working-file stem.
    ///
    /// No I/O happens here: a missing root or backing file reads as an empty
    /// store, and the first write creates both.
    pub fn open(root: impl AsRef<Path>, stem: impl AsRef<str>) -> Self {
        Self { path: root.as_ref().join(format!("{}.json", stem.as_ref())) }
    }

    /// The document for `id`, or an empty one if absent.
    ///
    /// Absent ids and a missing backing file are both ordinary empty results;
    /// only a malformed backing file is an error.
    pub fn get(&self, id: &str) -> Result<Document> {
        let all = self.load()?;
        Ok(match all.get(id) {
            Some(Value::Object(doc)) => doc.clone(),
            _ => Document::new(),
        })
    }

    /// Insert or overwrite the document for `id`, persisting synchronously.
    #[tracing::instrument(skip_all, fields(id))]
    pub fn put(&self, id: &str, document: Document) -> Result<()> {
        let mut all = self.load()?;
        all.insert(id.to_string(), Value::Object(document));
        self.replace(&all)
    }

    /// Remove the document for `id` if present. Absent ids are a no-op and
    /// don't touch the backing file.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut all = self.load()?;
        if all.remove(id).is_some() {
            self.replace(&all)?;
        }
        Ok(())
    }

    /// Read the whole backing object. Missing file means empty store.
    fn load(&self) -> Result<Map<String, Value>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(exn::Exn::from(ErrorKind::Io(err))),
        };
        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => exn::bail!(ErrorKind::Corrupt(self.path.clone())),
        }
    }

    /// Atomically replace the backing file with the given object.
    fn replace(&self, all: &Map<String, Value>) -> Result<()> {
        // The parent only needs creating on the very first write.
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(ErrorKind::Io)?;
        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(ErrorKind::Io)?;
        let bytes = serde_json::to_vec_pretty(all).map_err(ErrorKind::Json)?;
        staged.write_all(&bytes).map_err(ErrorKind::Io)?;
        // Rename over the original so a crash can never leave a half-written
        // store behind.
        staged.persist(&self.path).map_err(|err| ErrorKind::Io(err.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(comment: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("comment".into(), json!(comment));
        doc
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("never-created"), "shot010");
        assert_eq!(store.get("flip_v001").unwrap(), Document::new());
    }

    #[test]
    fn test_put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path(), "shot010");
        store.put("flip_v001", doc("first pass")).unwrap();
        assert_eq!(store.get("flip_v001").unwrap(), doc("first pass"));
        // Overwrite wins.
        store.put("flip_v001", doc("second pass")).unwrap();
        assert_eq!(store.get("flip_v001").unwrap(), doc("second pass"));
    }

    #[test]
    fn test_unknown_keys_survive_write_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("shot010.json"),
            serde_json::to_vec(&json!({
                "someone_elses_entry": {"approved": true},
            }))
            .unwrap(),
        )
        .unwrap();

        let store = MetadataStore::open(dir.path(), "shot010");
        store.put("flip_v001", doc("mine")).unwrap();
        store.remove("flip_v001").unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(dir.path().join("shot010.json")).unwrap()).unwrap();
        assert_eq!(raw["someone_elses_entry"]["approved"], json!(true));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path(), "shot010");
        store.remove("never-written").unwrap();
        // The no-op didn't create a backing file either.
        assert!(!dir.path().join("shot010.json").exists());
    }

    #[test]
    fn test_remove_deletes_only_named_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path(), "shot010");
        store.put("flip_v001", doc("one")).unwrap();
        store.put("flip_v002", doc("two")).unwrap();
        store.remove("flip_v001").unwrap();
        assert_eq!(store.get("flip_v001").unwrap(), Document::new());
        assert_eq!(store.get("flip_v002").unwrap(), doc("two"));
    }

    #[test]
    fn test_corrupt_file_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shot010.json"), b"[1, 2, 3]").unwrap();
        let store = MetadataStore::open(dir.path(), "shot010");
        assert!(matches!(&*store.get("flip_v001").unwrap_err(), ErrorKind::Corrupt(_)));
        assert!(matches!(&*store.put("flip_v001", doc("x")).unwrap_err(), ErrorKind::Corrupt(_)));
    }

    #[test]
    fn test_first_write_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/review");
        let store = MetadataStore::open(&root, "shot010");
        store.put("flip_v001", doc("first")).unwrap();
        assert!(root.join("shot010.json").is_file());
    }

    #[test]
    fn test_non_object_entry_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("shot010.json"),
            serde_json::to_vec(&json!({"flip_v001": "just a string"})).unwrap(),
        )
        .unwrap();
        let store = MetadataStore::open(dir.path(), "shot010");
        assert_eq!(store.get("flip_v001").unwrap(), Document::new());
    }
}
