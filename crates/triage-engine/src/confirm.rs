//! Operator confirmation before a test is filed.

use std::io::{self, BufRead, Write};

use triage_core::FailedTestRecord;

pub trait Confirm {
    /// `Ok(false)` skips the test.
    fn confirm(&mut self, record: &FailedTestRecord) -> io::Result<bool>;
}

/// Unattended runs: every failed test is filed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysYes;

impl Confirm for AlwaysYes {
    fn confirm(&mut self, _record: &FailedTestRecord) -> io::Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysNo;

impl Confirm for AlwaysNo {
    fn confirm(&mut self, _record: &FailedTestRecord) -> io::Result<bool> {
        Ok(false)
    }
}

/// Line-oriented yes/no question per test. Only `y` or `yes` proceeds;
/// anything else, including end of input, declines.
#[derive(Debug)]
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl Prompt<io::StdinLock<'static>, io::Stderr> {
    /// Questions go to stderr so stdout stays free for the run report.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, record: &FailedTestRecord) -> io::Result<bool> {
        write!(self.output, "Create or update ticket for \"{}\"? (y/n) ", record.title())?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
