//! Structured layout: Allure-style `<uuid>-result.json` files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use triage_core::FailedTestRecord;
use walkdir::WalkDir;

use crate::matcher::{ArtifactMatcher, PatternMatcher};
use crate::{ensure_root, Layout, Records, ResultReader, ResultsError};

pub const RESULT_SUFFIX: &str = "-result.json";
pub const UNKNOWN_ERROR: &str = "Unknown error";
const FAILED_STATUS: &str = "failed";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultFile {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    status_details: Option<StatusDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusDetails {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    trace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StructuredReader {
    root: PathBuf,
    matcher: PatternMatcher,
}

impl StructuredReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let matcher = PatternMatcher::new(&root);
        Self { root, matcher }
    }

    fn read_result_file(&self, path: &Path) -> Result<Option<FailedTestRecord>, ResultsError> {
        let body = fs::read_to_string(path).map_err(ResultsError::io(path))?;
        let result: ResultFile = serde_json::from_str(&body)
            .map_err(|err| ResultsError::Parse { path: path.to_path_buf(), message: err.to_string() })?;

        if result.status.as_deref() != Some(FAILED_STATUS) {
            return Ok(None);
        }

        let stem = result_stem(path);
        let name = result
            .name
            .filter(|name| !name.trim().is_empty())
            .or(result.full_name.filter(|name| !name.trim().is_empty()))
            .unwrap_or_else(|| stem.clone());
        let identifier = result.uuid.filter(|uuid| !uuid.is_empty()).unwrap_or(stem);

        let failure_detail = failure_detail(result.status_details.unwrap_or_default());
        let artifacts = self.matcher.resolve(&identifier)?;
        if artifacts.is_empty() {
            tracing::warn!(test = %name, uuid = %identifier, "no artifacts matched result uuid");
        }

        Ok(Some(FailedTestRecord::new(name, failure_detail).with_artifacts(artifacts)))
    }
}

impl ResultReader for StructuredReader {
    fn layout(&self) -> Layout {
        Layout::Structured
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn records(&self) -> Result<Records<'_>, ResultsError> {
        let files = result_files(&self.root)?;
        Ok(Box::new(
            files.into_iter().filter_map(move |path| self.read_result_file(&path).transpose()),
        ))
    }
}

pub(crate) fn is_result_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name.to_string_lossy().ends_with(RESULT_SUFFIX))
}

fn result_files(root: &Path) -> Result<Vec<PathBuf>, ResultsError> {
    ensure_root(root)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| ResultsError::walk(root, err))?;
        if entry.file_type().is_file() && is_result_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn result_stem(path: &Path) -> String {
    let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    file_name.strip_suffix(RESULT_SUFFIX).map(str::to_string).unwrap_or(file_name)
}

fn failure_detail(details: StatusDetails) -> String {
    let message = details
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
    match details.trace.filter(|trace| !trace.trim().is_empty()) {
        Some(trace) => format!("{message}\n\n{trace}"),
        None => message,
    }
}
