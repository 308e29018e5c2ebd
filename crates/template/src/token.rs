//! Token-based path templating.
//!
//! Converts semantic field maps into deterministic filesystem paths and back
//! using a small token syntax: literal text interleaved with `{field}` or
//! `{field:03}` tokens, where the latter zero-pads numeric values to the
//! declared width. A template compiles eagerly (via [`FromStr`]) so that
//! syntax errors surface at construction time rather than at render time.
//!
//! The field named [`SEQ`] is the frame-sequence marker: it renders verbatim
//! (e.g. `$F4`) but matches runs of frame numbers on disk, so enumeration
//! collapses a directory full of frames into one abstract path per flipbook.
//!
//! # Example
//!
//! ```
//! use flipdeck_template::{Fields, TokenTemplate, TemplateEngine};
//!
//! let template: TokenTemplate =
//!     "/show/{name}/review/{node}/v{version:03}/{node}_v{version:03}.{SEQ}.exr".parse().unwrap();
//! let fields = Fields::new()
//!     .with("name", "shot010")
//!     .with("node", "flipbook")
//!     .with("version", 2u32)
//!     .with("SEQ", "$F4");
//! let path = template.resolve(&fields).unwrap();
//! assert_eq!(path.to_str().unwrap(), "/show/shot010/review/flipbook/v002/flipbook_v002.$F4.exr");
//!
//! let recovered = template.extract(&path).unwrap();
//! assert_eq!(recovered.text("node"), Some("flipbook"));
//! assert_eq!(recovered.number("version"), Some(2));
//! ```

use crate::engine::TemplateEngine;
use crate::error::{ErrorKind, Result};
use crate::fields::{FieldValue, Fields, SEQ};
use exn::ResultExt;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug)]
enum Segment {
    Literal(String),
    Field {
        key: String,
        pad: Option<usize>,
        /// Regex capture group name. Distinct per occurrence, since a key may
        /// appear several times in one template (directory and filename).
        group: String,
    },
}

/// A compiled path template over `{field}` tokens.
///
/// Constructed via [`FromStr`]; the extraction regex is compiled once and
/// reused across calls. See the [module docs](self) for the syntax.
pub struct TokenTemplate {
    segments: Vec<Segment>,
    /// Full-path matcher with every field as a named capture group.
    matcher: Regex,
}

impl FromStr for TokenTemplate {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let segments = parse_segments(s)?;
        if !segments.iter().any(|seg| matches!(seg, Segment::Field { .. })) {
            exn::bail!(ErrorKind::Syntax("template contains no fields".to_string()));
        }
        let matcher = compile(&segments, None).or_raise(|| ErrorKind::Syntax(s.to_string()))?;
        Ok(Self { segments, matcher })
    }
}

impl TokenTemplate {
    fn render_value(value: &FieldValue, pad: Option<usize>) -> String {
        match (value, pad) {
            (FieldValue::Number(n), Some(width)) => format!("{n:0width$}"),
            (value, _) => value.to_string(),
        }
    }

    /// The longest concrete directory prefix of the template once `context`
    /// is applied: rendering stops at the first free field (or the frame
    /// marker, whose on-disk form differs from its rendered form).
    fn static_root(&self, context: &Fields) -> PathBuf {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => rendered.push_str(lit),
                Segment::Field { key, pad, .. } => {
                    if key == SEQ {
                        break;
                    }
                    match context.get(key) {
                        Some(value) => rendered.push_str(&Self::render_value(value, *pad)),
                        None => break,
                    }
                },
            }
        }
        // Trim back to the last complete directory component.
        match rendered.rfind('/') {
            Some(index) => PathBuf::from(&rendered[..index.max(1)]),
            None => PathBuf::from("."),
        }
    }

    /// Reads the captures for one match into a field map, starting from the
    /// bound context. Returns `None` when repeated occurrences of the same
    /// key disagree (the path only superficially matches the template).
    fn fields_from_captures(&self, context: &Fields, caps: &regex::Captures<'_>) -> Option<Fields> {
        let mut fields = context.clone();
        for segment in &self.segments {
            let Segment::Field { key, pad, group } = segment else {
                continue;
            };
            let Some(captured) = caps.name(group) else {
                continue;
            };
            let value = match pad {
                Some(_) => FieldValue::Number(captured.as_str().parse().ok()?),
                None => FieldValue::Text(captured.as_str().to_string()),
            };
            if key == SEQ {
                // Keep the context's marker so frames collapse to one
                // abstract path. Without a marker in context, fall through
                // and record the raw frame number.
                if context.contains(SEQ) {
                    continue;
                }
            }
            match fields.get(key) {
                None => fields.insert(key.clone(), value),
                Some(existing) if *existing == value => {},
                Some(_) => return None,
            }
        }
        Some(fields)
    }
}

impl TemplateEngine for TokenTemplate {
    fn resolve(&self, fields: &Fields) -> Result<PathBuf> {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => rendered.push_str(lit),
                Segment::Field { key, pad, .. } => {
                    let value =
                        fields.get(key).ok_or_else(|| exn::Exn::from(ErrorKind::MissingField(key.clone())))?;
                    rendered.push_str(&Self::render_value(value, *pad));
                },
            }
        }
        Ok(PathBuf::from(rendered))
    }

    #[tracing::instrument(skip_all)]
    fn enumerate(&self, context: &Fields) -> Result<Vec<PathBuf>> {
        let matcher = compile(&self.segments, Some(context))
            .or_raise(|| ErrorKind::Syntax("context produced an uncompilable matcher".to_string()))?;
        let root = self.static_root(context);
        if !root.is_dir() {
            // Consistent with listing an empty library: no matches, no error.
            return Ok(Vec::new());
        }

        let mut matches = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                // Raced against an external delete; treat as empty.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(ErrorKind::Io(err).into()),
            };
            for entry in entries {
                let entry = entry.map_err(ErrorKind::Io)?;
                let file_type = entry.file_type().map_err(ErrorKind::Io)?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    // Note: silently drop what is most likely a broken symlink.
                    continue;
                }
                let text = path.to_string_lossy();
                let Some(caps) = matcher.captures(&text) else {
                    continue;
                };
                let Some(fields) = self.fields_from_captures(context, &caps) else {
                    tracing::debug!(path = %path.display(), "repeated template fields disagree; skipping");
                    continue;
                };
                matches.insert(self.resolve(&fields)?);
            }
        }
        Ok(matches.into_iter().collect())
    }

    fn extract(&self, path: &Path) -> Result<Fields> {
        let text = path.to_string_lossy();
        let caps = self
            .matcher
            .captures(&text)
            .ok_or_else(|| exn::Exn::from(ErrorKind::Unmatched(path.to_path_buf())))?;
        self.fields_from_captures(&Fields::new(), &caps)
            .ok_or_else(|| exn::Exn::from(ErrorKind::Unmatched(path.to_path_buf())))
    }
}

fn parse_segments(s: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut seen = std::collections::HashMap::<String, usize>::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            if c == '}' {
                exn::bail!(ErrorKind::Syntax(format!("stray `}}` in `{s}`")));
            }
            literal.push(c);
            continue;
        }
        let mut token = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some('{') | None => exn::bail!(ErrorKind::Syntax(format!("unbalanced `{{` in `{s}`"))),
                Some(c) => token.push(c),
            }
        }
        let (key, pad) = match token.split_once(':') {
            Some((key, spec)) => {
                let width: usize = spec
                    .parse()
                    .ok()
                    .filter(|_| spec.starts_with('0'))
                    .ok_or_else(|| exn::Exn::from(ErrorKind::Syntax(format!("bad padding spec `{spec}`"))))?;
                (key, Some(width))
            },
            None => (token.as_str(), None),
        };
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            exn::bail!(ErrorKind::Syntax(format!("bad field name `{key}`")));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        let occurrence = *seen.entry(key.to_string()).and_modify(|n| *n += 1).or_insert(0);
        let group = match occurrence {
            0 => key.to_string(),
            n => format!("{key}_{n}"),
        };
        segments.push(Segment::Field { key: key.to_string(), pad, group });
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Builds the path matcher. With a bound `context`, known fields become
/// escaped literals and the frame marker matches frame numbers, producing the
/// on-disk shape; without one, every field is a generic capture.
fn compile(segments: &[Segment], context: Option<&Fields>) -> std::result::Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    for segment in segments {
        match segment {
            Segment::Literal(lit) => pattern.push_str(&regex::escape(lit)),
            Segment::Field { key, pad, group } => {
                if let Some(ctx) = context {
                    if key == SEQ {
                        pattern.push_str(&format!("(?P<{group}>\\d+)"));
                        continue;
                    }
                    if let Some(value) = ctx.get(key) {
                        pattern.push_str(&regex::escape(&TokenTemplate::render_value(value, *pad)));
                        continue;
                    }
                }
                let field_pattern = if pad.is_some() { "\\d+" } else { "[^/.]+" };
                pattern.push_str(&format!("(?P<{group}>{field_pattern})"));
            },
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}
