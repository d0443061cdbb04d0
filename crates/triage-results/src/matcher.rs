//! Resolving the artifact files that belong to one test.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::log_marker::{ARTIFACT_EXTENSIONS, STEP_LOG_FILE};
use crate::structured::is_result_file;
use crate::ResultsError;

/// Maps a test identifier to its artifact files.
///
/// An empty result is a valid answer (the test produced no artifacts) and is
/// distinct from `Err`, which means the lookup itself failed.
pub trait ArtifactMatcher {
    /// Sorted, de-duplicated artifact paths.
    fn resolve(&self, identifier: &str) -> Result<Vec<PathBuf>, ResultsError>;
}

/// Lists `<root>/<identifier>/` and keeps files with an artifact extension,
/// plus the step log itself.
#[derive(Debug, Clone)]
pub struct DirectoryMatcher {
    root: PathBuf,
}

impl DirectoryMatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactMatcher for DirectoryMatcher {
    fn resolve(&self, identifier: &str) -> Result<Vec<PathBuf>, ResultsError> {
        let dir = self.root.join(identifier);
        let mut found = BTreeSet::new();
        for entry in fs::read_dir(&dir).map_err(ResultsError::io(&dir))? {
            let entry = entry.map_err(ResultsError::io(&dir))?;
            let path = entry.path();
            if path.is_file() && is_artifact(&path) {
                found.insert(path);
            }
        }
        Ok(found.into_iter().collect())
    }
}

/// Walks `root` recursively for files whose name contains the identifier.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    root: PathBuf,
}

impl PatternMatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactMatcher for PatternMatcher {
    fn resolve(&self, identifier: &str) -> Result<Vec<PathBuf>, ResultsError> {
        // an empty identifier would match every file in the run
        if identifier.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = BTreeSet::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|err| ResultsError::walk(&self.root, err))?;
            // result files describe a test, they are not its evidence
            if entry.file_type().is_file()
                && !is_result_file(entry.path())
                && entry.file_name().to_string_lossy().contains(identifier)
            {
                found.insert(entry.into_path());
            }
        }
        Ok(found.into_iter().collect())
    }
}

fn is_artifact(path: &Path) -> bool {
    if path.file_name().is_some_and(|name| name == STEP_LOG_FILE) {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARTIFACT_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
}
