//! One-way dispatch to external collaborators.
//!
//! The capture tool and the frame viewer are detached processes: the core
//! instructs them and returns immediately, never awaiting completion. A new
//! capture only becomes visible through the next scan. The publish registry
//! is also one-way, but its failures are surfaced as warnings rather than
//! silence, since users expect the registration to have happened.

pub mod error;

use self::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Everything the capture tool needs for one flipbook render.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureJob {
    pub frame_range: (u32, u32),
    /// `None` defers to the tool's current viewport resolution.
    pub resolution: Option<(u32, u32)>,
    /// Templated output location, frame marker included.
    pub output_path: PathBuf,
    /// Render only the beauty pass, or background geometry too.
    pub background: bool,
}

/// Instructs the external render tool to capture a flipbook.
///
/// Fire-and-forget: implementations return once the tool is told to run.
pub trait CaptureTool {
    fn capture(&self, job: &CaptureJob) -> Result<()>;
}

/// Plays rendered sequences in an external viewer, detached.
pub trait Viewer {
    fn play(&self, paths: &[PathBuf], rate: f64) -> Result<()>;
}

/// A post-creation registration with the asset-management service.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    pub path: PathBuf,
    pub display_name: String,
    pub version: u32,
    pub comment: Option<String>,
    /// Always `"Playblast"` for flipbooks.
    pub kind: &'static str,
}

impl PublishRecord {
    pub const KIND: &'static str = "Playblast";
}

/// Registers published flipbooks with an external service.
pub trait Publisher {
    fn publish(&self, record: &PublishRecord) -> Result<()>;
}

/// Launches the sequence viewer that ships with the render package as a
/// detached process.
#[derive(Debug)]
pub struct ProcessViewer {
    program: PathBuf,
}

impl ProcessViewer {
    /// Locate the viewer binary under the render package's install root.
    ///
    /// Returns [`ErrorKind::UnsupportedPlatform`] on platforms without a
    /// known binary; callers report that once and abort, nothing crashes.
    pub fn for_platform(install_root: &Path) -> Result<Self> {
        let program = if cfg!(target_os = "linux") {
            install_root.join("bin/mplay-bin")
        } else if cfg!(target_os = "windows") {
            install_root.join("bin/mplay.exe")
        } else {
            exn::bail!(ErrorKind::UnsupportedPlatform(std::env::consts::OS.to_string()));
        };
        Ok(Self { program })
    }
}

impl Viewer for ProcessViewer {
    #[tracing::instrument(skip_all, fields(rate))]
    fn play(&self, paths: &[PathBuf], rate: f64) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut command = Command::new(&self.program);
        // Order of arguments important: rate first, then the sequences.
        command.arg("-r").arg(rate.to_string());
        command.args(paths);
        command.arg("-g").arg("-C");
        // Detached: drop the child handle, never wait on it.
        command.spawn().map_err(ErrorKind::Io)?;
        Ok(())
    }
}
