//! Validation and naming of new captures.
//!
//! Turns raw user input (a [`CaptureSpec`]) into a validated [`CapturePlan`]:
//! checked frame range and resolution, a vetted flipbook name, the next
//! version number for that name and the templated output path, with the
//! containing directory reserved on disk. Validation failures abort the
//! request before anything is mutated.

pub mod error;

use self::error::{ErrorKind, Result};
use crate::model::VersionTree;
use exn::ResultExt;
use flipdeck_store::MetadataStore;
use flipdeck_template::{Fields, TemplateEngine};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

/// Reserved sidecar key holding the highest version ever assigned per group.
///
/// Versions are never reused, even when the top version of a group is
/// deleted and the surviving files alone would suggest a lower next number.
/// The ledger lives alongside the artifact documents; other tooling
/// preserves it like any key it doesn't know.
pub const VERSION_LEDGER: &str = "_versions";

/// Characters a flipbook name must not contain: they collide with template
/// syntax, shell quoting or frame-marker conventions somewhere downstream.
const RESERVED: &[char] = &[
    '[', '~', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', ' ', '+', '{', '}', '"', ':', ';', '\'',
    ']', '.',
];

/// Smallest width/height the capture tool accepts.
const MIN_RESOLUTION: u32 = 10;

/// Resolves named range expressions (e.g. `$RFSTART`) that the host
/// environment understands. Literal integers never reach the expander.
pub trait ExpressionExpander {
    /// The expansion of `expr`, or `None` if the host can't resolve it.
    fn expand(&self, expr: &str) -> Option<String>;
}

/// Requested capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Defer to whatever the capture tool's viewport currently uses.
    Auto,
    Explicit(u32, u32),
}

/// Raw user input for a new capture, exactly as typed.
///
/// Range endpoints stay strings here because either may be a host expression
/// rather than a literal frame number.
#[derive(Debug, Clone)]
pub struct CaptureSpec {
    pub name: String,
    pub range: (String, String),
    pub resolution: Resolution,
    /// Render background geometry too, not just the beauty pass.
    pub background: bool,
    pub comment: Option<String>,
}

/// A validated capture, ready to hand to the capture tool.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturePlan {
    pub name: String,
    pub version: u32,
    /// Templated output location, frame marker included.
    pub path: PathBuf,
    pub frame_range: (u32, u32),
    /// `None` means automatic.
    pub resolution: Option<(u32, u32)>,
    pub background: bool,
}

/// Validate `spec` against the current tree and compute version and path.
///
/// On success the output path's parent directories exist (created here to
/// reserve the slot; a directory that already exists is fine) and the
/// version ledger records the assigned number. Nothing is created or mutated
/// on any validation failure.
pub fn prepare(
    spec: &CaptureSpec,
    tree: &VersionTree,
    engine: &dyn TemplateEngine,
    expander: &dyn ExpressionExpander,
    context: &Fields,
    store: &MetadataStore,
) -> Result<CapturePlan> {
    let begin = endpoint(&spec.range.0, expander)?;
    let end = endpoint(&spec.range.1, expander)?;
    if begin > end {
        exn::bail!(ErrorKind::InvalidRange(format!("begin {begin} is after end {end}")));
    }

    let resolution = match spec.resolution {
        Resolution::Auto => None,
        Resolution::Explicit(width, height) => {
            if width < MIN_RESOLUTION || height < MIN_RESOLUTION {
                exn::bail!(ErrorKind::InvalidResolution(format!(
                    "{width}x{height} is below the {MIN_RESOLUTION}px minimum"
                )));
            }
            Some((width, height))
        },
    };

    if spec.name.is_empty() || spec.name.contains(RESERVED) {
        exn::bail!(ErrorKind::InvalidName(spec.name.clone()));
    }

    // No renumbering, no reuse: the next version tops both the highest
    // surviving version and the highest the ledger ever saw assigned.
    let mut ledger = store.get(VERSION_LEDGER).or_raise(|| ErrorKind::Store)?;
    let assigned = ledger.get(&spec.name).and_then(|v| v.as_u64()).map(|v| v as u32);
    let version = tree.latest_version(&spec.name).into_iter().chain(assigned).max().map_or(1, |v| v + 1);

    let fields = context.clone().with("node", spec.name.as_str()).with("version", version);
    let path = engine.resolve(&fields).or_raise(|| ErrorKind::PathResolution)?;

    if let Some(parent) = path.parent() {
        // Reserve the slot before the capture tool runs.
        fs::create_dir_all(parent).map_err(ErrorKind::Io)?;
    }

    ledger.insert(spec.name.clone(), json!(version));
    if let Err(err) = store.put(VERSION_LEDGER, ledger) {
        // Not durably saved: the number is still assigned for this attempt,
        // but a later session may see a stale ledger.
        tracing::warn!(error = %err, "could not persist the version ledger");
    }

    Ok(CapturePlan {
        name: spec.name.clone(),
        version,
        path,
        frame_range: (begin, end),
        resolution,
        background: spec.background,
    })
}

/// A range endpoint: literal positive integer, or a host expression expanded
/// to one.
fn endpoint(raw: &str, expander: &dyn ExpressionExpander) -> Result<u32> {
    let literal = raw.trim();
    let expanded;
    let text = if literal.chars().all(|c| c.is_ascii_digit()) && !literal.is_empty() {
        literal
    } else {
        expanded = expander
            .expand(literal)
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidRange(format!("cannot expand `{literal}`"))))?;
        expanded.as_str()
    };
    match text.parse::<u32>() {
        Ok(frame) if frame >= 1 => Ok(frame),
        _ => exn::bail!(ErrorKind::InvalidRange(format!("`{raw}` is not a positive frame number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactId, ArtifactRecord};
    use flipdeck_store::Document;
    use flipdeck_template::TokenTemplate;
    use rstest::rstest;
    use std::path::Path;

    /// Expands the two range variables a host session would define.
    struct FakeHost;
    impl ExpressionExpander for FakeHost {
        fn expand(&self, expr: &str) -> Option<String> {
            match expr {
                "$RFSTART" => Some("1".to_string()),
                "$RFEND" => Some("48".to_string()),
                _ => None,
            }
        }
    }

    fn spec(name: &str) -> CaptureSpec {
        CaptureSpec {
            name: name.to_string(),
            range: ("1".to_string(), "48".to_string()),
            resolution: Resolution::Auto,
            background: false,
            comment: None,
        }
    }

    fn tree_with_versions(name: &str, versions: &[u32]) -> VersionTree {
        let mut tree = VersionTree::default();
        for &version in versions {
            let id = format!("{name}_v{version:03}");
            tree.insert(ArtifactRecord {
                id: ArtifactId::from(id.as_str()),
                group: name.to_string(),
                version,
                path: Path::new("/lib").join(&id),
                document: Document::new(),
            });
        }
        tree
    }

    fn prepare_in(dir: &Path, spec: &CaptureSpec, tree: &VersionTree) -> Result<CapturePlan> {
        let template: TokenTemplate = format!(
            "{}/{{name}}/{{node}}/v{{version:03}}/{{node}}_v{{version:03}}.{{SEQ}}.exr",
            dir.display()
        )
        .parse()
        .unwrap();
        let context = Fields::new().with("name", "shot010").with("SEQ", "$F4");
        let store = MetadataStore::open(dir.join("shot010"), "shot010");
        prepare(spec, tree, &template, &FakeHost, &context, &store)
    }

    #[test]
    fn test_first_version_is_one() {
        let dir = tempfile::tempdir().unwrap();
        let plan = prepare_in(dir.path(), &spec("flipbook"), &VersionTree::default()).unwrap();
        assert_eq!(plan.version, 1);
        assert_eq!(plan.frame_range, (1, 48));
        assert_eq!(plan.resolution, None);
        // The slot was reserved on disk.
        assert!(dir.path().join("shot010/flipbook/v001").is_dir());
        assert!(plan.path.ends_with("flipbook_v001.$F4.exr"));
    }

    #[test]
    fn test_versions_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let tree = tree_with_versions("flipbook", &[1, 2, 3]);
        assert_eq!(prepare_in(dir.path(), &spec("flipbook"), &tree).unwrap().version, 4);

        // Unrelated groups don't influence numbering.
        let other = tempfile::tempdir().unwrap();
        let tree = tree_with_versions("other", &[7]);
        assert_eq!(prepare_in(other.path(), &spec("flipbook"), &tree).unwrap().version, 1);
    }

    #[test]
    fn test_deleted_top_version_is_never_reassigned() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = VersionTree::default();
        // Capture versions 1 through 3 through the policy, so the ledger
        // tracks each assignment.
        for version in 1..=3 {
            let plan = prepare_in(dir.path(), &spec("flipbook"), &tree).unwrap();
            assert_eq!(plan.version, version);
            tree = tree_with_versions("flipbook", &(1..=version).collect::<Vec<_>>());
        }

        // Version 3 is deleted; the surviving files alone would suggest 3,
        // but 3 was already used once.
        tree.remove(&ArtifactId::from("flipbook_v003"));
        assert_eq!(prepare_in(dir.path(), &spec("flipbook"), &tree).unwrap().version, 4);
    }

    #[test]
    fn test_expressions_expand_through_the_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = spec("flipbook");
        request.range = ("$RFSTART".to_string(), "$RFEND".to_string());
        let plan = prepare_in(dir.path(), &request, &VersionTree::default()).unwrap();
        assert_eq!(plan.frame_range, (1, 48));

        request.range.0 = "$UNKNOWN".to_string();
        let err = prepare_in(dir.path(), &request, &VersionTree::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRange(_)));
    }

    #[rstest]
    #[case::reversed("5", "3")]
    #[case::zero_begin("0", "10")]
    #[case::negative("-3", "10")]
    #[case::garbage("abc", "10")]
    fn test_bad_ranges_are_rejected(#[case] begin: &str, #[case] end: &str) {
        let dir = tempfile::tempdir().unwrap();
        let mut request = spec("flipbook");
        request.range = (begin.to_string(), end.to_string());
        let err = prepare_in(dir.path(), &request, &VersionTree::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRange(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_single_frame_range_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = spec("flipbook");
        request.range = ("1".to_string(), "1".to_string());
        assert_eq!(prepare_in(dir.path(), &request, &VersionTree::default()).unwrap().frame_range, (1, 1));
    }

    #[rstest]
    #[case::narrow(9, 720, false)]
    #[case::short(1280, 9, false)]
    #[case::hd(1280, 720, true)]
    #[case::exactly_minimum(10, 10, true)]
    fn test_resolution_minimum(#[case] width: u32, #[case] height: u32, #[case] accepted: bool) {
        let dir = tempfile::tempdir().unwrap();
        let mut request = spec("flipbook");
        request.resolution = Resolution::Explicit(width, height);
        let result = prepare_in(dir.path(), &request, &VersionTree::default());
        match accepted {
            true => assert_eq!(result.unwrap().resolution, Some((width, height))),
            false => {
                assert!(matches!(&*result.unwrap_err(), ErrorKind::InvalidResolution(_)));
            },
        }
    }

    #[rstest]
    #[case::star("flip*book", false)]
    #[case::space("flip book", false)]
    #[case::dot("flip.book", false)]
    #[case::quote("flip'book", false)]
    #[case::empty("", false)]
    #[case::plain("flipbook", true)]
    #[case::underscore("flip_book", true)]
    #[case::hyphen("flip-book", true)]
    fn test_name_charset(#[case] name: &str, #[case] accepted: bool) {
        let dir = tempfile::tempdir().unwrap();
        let result = prepare_in(dir.path(), &spec(name), &VersionTree::default());
        assert_eq!(result.is_ok(), accepted, "name {name:?}");
        if let Err(err) = result {
            assert!(matches!(&*err, ErrorKind::InvalidName(_)));
        }
    }

    #[test]
    fn test_unresolvable_path_is_fatal_and_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // Context is missing `name` (no working-file context), so the
        // template cannot resolve.
        let template: TokenTemplate = format!(
            "{}/{{name}}/{{node}}/v{{version:03}}/file.{{SEQ}}.exr",
            dir.path().display()
        )
        .parse()
        .unwrap();
        let context = Fields::new().with("SEQ", "$F4");
        let store = MetadataStore::open(dir.path(), "shot010");
        let err =
            prepare(&spec("flipbook"), &VersionTree::default(), &template, &FakeHost, &context, &store)
                .unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathResolution));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
