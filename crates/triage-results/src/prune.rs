//! Pruning a log-marker results directory down to its failed tests.
//!
//! A test folder without `trace.zip` belongs to a passed test and is
//! deleted. A failed test's files are copied into a folder named after the
//! test with the browser project suffix cut off, so repeated runs of the same
//! test collect in one place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::log_marker::test_dirs;
use crate::ResultsError;

pub const TRACE_FILE: &str = "trace.zip";
pub const DEFAULT_PROJECT_SUFFIXES: [&str; 3] = ["-chromium", "-firefox", "-webkit"];

#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub dry_run: bool,
    pub project_suffixes: Vec<String>,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            project_suffixes: DEFAULT_PROJECT_SUFFIXES.iter().map(|suffix| (*suffix).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct KeptFolder {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub files_copied: usize,
}

#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq)]
pub struct PruneReport {
    pub dry_run: bool,
    pub removed: Vec<PathBuf>,
    pub kept: Vec<KeptFolder>,
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Cut a runner folder name at the earliest browser project suffix.
#[must_use]
pub fn derive_test_name<'a>(folder: &'a str, project_suffixes: &[String]) -> &'a str {
    project_suffixes
        .iter()
        .filter(|suffix| !suffix.is_empty())
        .filter_map(|suffix| folder.find(suffix.as_str()))
        .min()
        .map_or(folder, |cut| &folder[..cut])
}

pub fn prune(root: &Path, options: &PruneOptions) -> Result<PruneReport, ResultsError> {
    let mut report = PruneReport { dry_run: options.dry_run, ..PruneReport::default() };

    for dir in test_dirs(root)? {
        let Some(folder) = dir.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            continue;
        };

        if !dir.join(TRACE_FILE).is_file() {
            if !options.dry_run {
                fs::remove_dir_all(&dir).map_err(ResultsError::io(&dir))?;
            }
            tracing::debug!(folder = %folder, "removed passed test folder");
            report.removed.push(dir);
            continue;
        }

        let clean_name = sanitize_name(derive_test_name(&folder, &options.project_suffixes));
        let destination = root.join(&clean_name);
        let files_copied = if destination == dir {
            0
        } else {
            copy_files(&dir, &destination, options.dry_run)?
        };
        tracing::info!(
            folder = %folder,
            destination = %destination.display(),
            files = files_copied,
            "kept failed test folder"
        );
        report.kept.push(KeptFolder { source: dir, destination, files_copied });
    }

    Ok(report)
}

fn copy_files(source: &Path, destination: &Path, dry_run: bool) -> Result<usize, ResultsError> {
    if !dry_run {
        fs::create_dir_all(destination).map_err(ResultsError::io(destination))?;
    }

    let mut copied = 0;
    for entry in fs::read_dir(source).map_err(ResultsError::io(source))? {
        let entry = entry.map_err(ResultsError::io(source))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !dry_run {
            let target = destination.join(entry.file_name());
            fs::copy(&path, &target).map_err(ResultsError::io(&target))?;
        }
        copied += 1;
    }
    Ok(copied)
}
