//! Semantic field maps exchanged with the template engine.
//!
//! A [`Fields`] value carries the context needed to render a template into a
//! concrete path (or recovered from one): the working-file `name`, the
//! flipbook `node` (group) name, the `version` number and the frame-sequence
//! marker [`SEQ`]. Keys are ordinary strings so hosts can carry extra fields
//! the engine doesn't interpret.

use std::collections::BTreeMap;
use std::fmt;

/// Well-known key for the frame-sequence marker field.
///
/// The value (e.g. `$F4`) is kept verbatim in rendered paths as a placeholder
/// for the external capture tool; on disk it corresponds to a run of frame
/// numbers.
pub const SEQ: &str = "SEQ";

/// A single field value: free text or a version-style number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(u32),
}
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}
impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

/// An ordered map of semantic field names to values.
///
/// Ordering is deterministic (BTreeMap) so that logging and test assertions
/// are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    ///
    /// ```
    /// use flipdeck_template::Fields;
    /// let fields = Fields::new().with("name", "shot010").with("version", 3u32);
    /// assert_eq!(fields.text("name"), Some("shot010"));
    /// assert_eq!(fields.number("version"), Some(3));
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The field as text, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// The field as a number. Textual digits count: `"003"` is `3`.
    pub fn number(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.parse().ok(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
