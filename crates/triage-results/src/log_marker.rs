//! Log-marker layout: `<root>/<test>/steps.log` marks a failed test.

use std::fs;
use std::path::{Path, PathBuf};

use triage_core::FailedTestRecord;

use crate::matcher::{ArtifactMatcher, DirectoryMatcher};
use crate::{ensure_root, Layout, Records, ResultReader, ResultsError};

pub const STEP_LOG_FILE: &str = "steps.log";

/// Extensions attached alongside the step log.
pub const ARTIFACT_EXTENSIONS: [&str; 4] = ["png", "webm", "zip", "json"];

#[derive(Debug, Clone)]
pub struct LogMarkerReader {
    root: PathBuf,
    matcher: DirectoryMatcher,
}

impl LogMarkerReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let matcher = DirectoryMatcher::new(&root);
        Self { root, matcher }
    }

    fn read_test_dir(&self, dir: &Path) -> Result<Option<FailedTestRecord>, ResultsError> {
        let Some(name) = dir.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            return Ok(None);
        };

        let log_path = dir.join(STEP_LOG_FILE);
        if !log_path.is_file() {
            tracing::debug!(test = %name, "no step log, treating as passed");
            return Ok(None);
        }

        // filled values are logged raw, so the log is not always valid UTF-8
        let bytes = fs::read(&log_path).map_err(ResultsError::io(&log_path))?;
        let failure_detail = String::from_utf8_lossy(&bytes).into_owned();
        let artifacts = self.matcher.resolve(&name)?;
        tracing::debug!(test = %name, artifacts = artifacts.len(), "step log found");

        Ok(Some(FailedTestRecord::new(name, failure_detail).with_artifacts(artifacts)))
    }
}

impl ResultReader for LogMarkerReader {
    fn layout(&self) -> Layout {
        Layout::LogMarker
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn records(&self) -> Result<Records<'_>, ResultsError> {
        let dirs = test_dirs(&self.root)?;
        Ok(Box::new(dirs.into_iter().filter_map(move |dir| self.read_test_dir(&dir).transpose())))
    }
}

/// Immediate sub-directories of `root`, sorted by name.
pub(crate) fn test_dirs(root: &Path) -> Result<Vec<PathBuf>, ResultsError> {
    ensure_root(root)?;
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(ResultsError::io(root))? {
        let entry = entry.map_err(ResultsError::io(root))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
