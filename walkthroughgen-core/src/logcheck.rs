//! Checks that BAML logs were captured inside notebook cell outputs.
//!
//! A notebook passes when some code cell that mentions the log capture helper
//! has stream output containing the parsed-response log line. Code cells
//! count whether or not they have been executed.

use crate::notebook::{Notebook, Output};
use crate::templates::LOG_CAPTURE_HELPER;
use std::fmt;

/// Log line BAML prints when it parses a `DoneForNow` response.
pub const PARSED_RESPONSE_MARKER: &str = "---Parsed Response (class DoneForNow)---";

/// Section header printed when logs were captured.
pub const CAPTURED_MARKER: &str = "Captured BAML Logs";

/// Section header printed when nothing was captured.
pub const NOT_CAPTURED_MARKER: &str = "No BAML Logs Captured";

/// What was found in one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// The cell calls the log capture helper.
    CaptureTest {
        /// Cell index.
        cell: usize,
    },
    /// The parsed-response marker was found in the cell's output.
    LogPattern {
        /// Cell index.
        cell: usize,
        /// First output line mentioning `Parsed Response`.
        excerpt: Option<String>,
    },
    /// The "Captured BAML Logs" header was found.
    CapturedSection {
        /// Cell index.
        cell: usize,
    },
    /// The "No BAML Logs Captured" header was found.
    NotCapturedSection {
        /// Cell index.
        cell: usize,
    },
}

/// Result of checking a notebook.
#[derive(Debug, Clone, Default)]
pub struct LogCaptureReport {
    /// Some cell used the log capture helper.
    pub capture_test_found: bool,
    /// The parsed-response marker was found in such a cell's output.
    pub log_pattern_found: bool,
    /// Everything found, in notebook order.
    pub findings: Vec<Finding>,
}

/// Overall outcome of a log capture check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No cell uses the log capture helper.
    NoCaptureTest,
    /// Logs were captured.
    Captured,
    /// The helper ran but the logs did not show up.
    NotCaptured,
}

/// Scan a notebook for captured BAML logs.
pub fn check_log_capture(notebook: &Notebook) -> LogCaptureReport {
    let mut report = LogCaptureReport::default();

    for (index, cell) in notebook.code_cells() {
        if !cell.source_text().contains(LOG_CAPTURE_HELPER) {
            continue;
        }

        report.capture_test_found = true;
        report.findings.push(Finding::CaptureTest { cell: index });

        for output in cell.outputs() {
            let Output::Stream { text, .. } = output else {
                continue;
            };
            let text = text.as_str();

            if text.contains(PARSED_RESPONSE_MARKER) {
                report.log_pattern_found = true;
                let excerpt = text
                    .split('\n')
                    .find(|line| line.contains("Parsed Response"))
                    .map(String::from);
                report.findings.push(Finding::LogPattern { cell: index, excerpt });
            }
            if text.contains(CAPTURED_MARKER) {
                report.findings.push(Finding::CapturedSection { cell: index });
            }
            if text.contains(NOT_CAPTURED_MARKER) {
                report.findings.push(Finding::NotCapturedSection { cell: index });
            }
        }
    }

    report
}

impl LogCaptureReport {
    /// The overall outcome.
    pub fn verdict(&self) -> Verdict {
        if !self.capture_test_found {
            Verdict::NoCaptureTest
        } else if self.log_pattern_found {
            Verdict::Captured
        } else {
            Verdict::NotCaptured
        }
    }

    /// Whether the check passed.
    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Captured
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::CaptureTest { cell } => write!(f, "Found log capture test in cell {}", cell),
            Finding::LogPattern { cell, excerpt } => {
                write!(f, "✅ FOUND BAML LOG PATTERN in cell {} output!", cell)?;
                if let Some(excerpt) = excerpt {
                    write!(f, "\nLog excerpt: {}", excerpt)?;
                }
                Ok(())
            }
            Finding::CapturedSection { cell } => {
                write!(f, "Found \"{}\" section in cell {}", CAPTURED_MARKER, cell)
            }
            Finding::NotCapturedSection { cell } => {
                write!(f, "Found \"{}\" section in cell {}", NOT_CAPTURED_MARKER, cell)
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoCaptureTest => write!(f, "❌ FAIL: No log capture test found in notebook"),
            Verdict::Captured => {
                write!(f, "✅ PASS: BAML logs successfully captured in notebook output!")
            }
            Verdict::NotCaptured => write!(
                f,
                "❌ FAIL: BAML log pattern not found in captured output\nThis means the log capture method is NOT working"
            ),
        }
    }
}
