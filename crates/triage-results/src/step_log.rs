//! Writer for the `steps.log` failure marker.
//!
//! A browser test records each page action as a readable line. When the test
//! fails, the log is left behind and becomes the ticket's reproduction steps.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log_marker::STEP_LOG_FILE;
use crate::ResultsError;

#[derive(Debug, Clone)]
pub struct StepLog {
    path: PathBuf,
}

impl StepLog {
    /// Create `test_folder` if needed and start an empty step log in it.
    pub fn create(test_folder: &Path) -> Result<Self, ResultsError> {
        fs::create_dir_all(test_folder).map_err(ResultsError::io(test_folder))?;
        let path = test_folder.join(STEP_LOG_FILE);
        fs::write(&path, "").map_err(ResultsError::io(&path))?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, step: &str) -> Result<(), ResultsError> {
        let mut file =
            OpenOptions::new().append(true).create(true).open(&self.path).map_err(ResultsError::io(&self.path))?;
        writeln!(file, "{step}").map_err(ResultsError::io(&self.path))
    }

    pub fn navigate(&self, url: &str) -> Result<(), ResultsError> {
        self.log(&format!("Navigate to \"{url}\""))
    }

    pub fn click(&self, selector: &str) -> Result<(), ResultsError> {
        self.log(&format!("Click {}", friendly_label(selector)))
    }

    pub fn fill(&self, selector: &str, value: &str) -> Result<(), ResultsError> {
        self.log(&format!("Fill {} with \"{value}\"", friendly_label(selector)))
    }

    pub fn press(&self, selector: &str, key: &str) -> Result<(), ResultsError> {
        self.log(&format!("Press \"{key}\" in {}", friendly_label(selector)))
    }

    pub fn check(&self, selector: &str) -> Result<(), ResultsError> {
        self.log(&format!("Check {}", friendly_label(selector)))
    }

    pub fn uncheck(&self, selector: &str) -> Result<(), ResultsError> {
        self.log(&format!("Uncheck {}", friendly_label(selector)))
    }

    pub fn select_option(&self, selector: &str, value: &str) -> Result<(), ResultsError> {
        self.log(&format!("Select option \"{value}\" in {}", friendly_label(selector)))
    }

    pub fn set_input_files(&self, selector: &str, files: &str) -> Result<(), ResultsError> {
        self.log(&format!("Upload file \"{files}\" to {}", friendly_label(selector)))
    }
}

/// Turn a CSS selector into a label for humans: `#login-button` reads as
/// `Login Button`.
#[must_use]
pub fn friendly_label(selector: &str) -> String {
    if selector.is_empty() {
        return "element".to_string();
    }

    let stripped = selector.strip_prefix('#').unwrap_or(selector);
    let mut label = String::with_capacity(stripped.len());
    let mut previous_is_word = false;
    for c in stripped.chars() {
        let c = if c == '.' || c == '-' { ' ' } else { c };
        let is_word = c.is_ascii_alphanumeric() || c == '_';
        if is_word && !previous_is_word {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        previous_is_word = is_word;
    }
    label
}
