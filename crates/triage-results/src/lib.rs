//! Reading a browser test run's output directory.
//!
//! Two on-disk layouts are understood:
//! - log-marker: one folder per test; a `steps.log` inside marks a failure
//! - structured: `*-result.json` files with a `status` field, artifacts
//!   tied to them by a uuid embedded in their file names
//!
//! Both produce the same lazy stream of [`FailedTestRecord`]s.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use triage_core::FailedTestRecord;

pub mod log_marker;
pub mod matcher;
pub mod prune;
pub mod step_log;
pub mod structured;

pub use log_marker::LogMarkerReader;
pub use matcher::{ArtifactMatcher, DirectoryMatcher, PatternMatcher};
pub use prune::{prune, PruneOptions, PruneReport};
pub use step_log::StepLog;
pub use structured::StructuredReader;

/// Where a test run leaves its output unless told otherwise.
pub const DEFAULT_RESULTS_DIR: &str = "test-results";

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("results directory not found: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse result file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl ResultsError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io { path: path.to_path_buf(), source }
    }

    pub(crate) fn walk(root: &Path, err: walkdir::Error) -> Self {
        let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
        Self::Io { path, source: std::io::Error::from(err) }
    }
}

/// Lazy, finite stream of failed tests. Calling [`ResultReader::records`]
/// again restarts from the beginning.
pub type Records<'a> = Box<dyn Iterator<Item = Result<FailedTestRecord, ResultsError>> + 'a>;

pub trait ResultReader {
    fn layout(&self) -> Layout;

    fn root(&self) -> &Path;

    /// Errors with [`ResultsError::MissingRoot`] when the run output is absent.
    /// Per-entry failures surface as `Err` items and do not end the stream.
    fn records(&self) -> Result<Records<'_>, ResultsError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    LogMarker,
    Structured,
}

impl Layout {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogMarker => "log-marker",
            Self::Structured => "structured",
        }
    }

    /// Structured when any `*-result.json` exists under `root`, log-marker
    /// otherwise.
    pub fn detect(root: &Path) -> Result<Self, ResultsError> {
        ensure_root(root)?;
        for entry in walkdir::WalkDir::new(root) {
            let entry = entry.map_err(|err| ResultsError::walk(root, err))?;
            if entry.file_type().is_file() && structured::is_result_file(entry.path()) {
                return Ok(Self::Structured);
            }
        }
        Ok(Self::LogMarker)
    }
}

/// Open a reader for `root`, detecting the layout when none is forced.
pub fn open_reader(
    root: &Path,
    layout: Option<Layout>,
) -> Result<Box<dyn ResultReader>, ResultsError> {
    let layout = match layout {
        Some(layout) => layout,
        None => Layout::detect(root)?,
    };
    tracing::debug!(root = %root.display(), layout = layout.as_str(), "opening result store");
    Ok(match layout {
        Layout::LogMarker => Box::new(LogMarkerReader::new(root)),
        Layout::Structured => Box::new(StructuredReader::new(root)),
    })
}

pub(crate) fn ensure_root(root: &Path) -> Result<(), ResultsError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ResultsError::MissingRoot(root.to_path_buf()))
    }
}
