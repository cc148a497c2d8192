//! Notebook execution harness.
//!
//! Runs a generated notebook outside Google Colab: cells that need Colab,
//! the BAML CLI, or package installs are dropped, the rest is written to a
//! scratch directory and executed by `jupyter nbconvert`.

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::notebook::{Cell, CellType, Notebook};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;

/// Maximum characters of source kept for a skipped cell.
const SKIPPED_PREVIEW_CHARS: usize = 50;

/// A code cell left out of the execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCell {
    /// Index in the original notebook.
    pub index: usize,
    /// Why it was skipped.
    pub reason: SkipReason,
    /// Start of the cell's source.
    pub preview: String,
}

/// Why a cell was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source mentions something only available in Colab or the BAML CLI.
    Marker(String),
    /// The source starts with a shell prefix such as `!pip`.
    Prefix(String),
}

/// Result of executing a notebook.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// The executor exited with status 0.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured stderr of the executor.
    pub stderr: String,
    /// Wall-clock duration in seconds.
    pub duration_secs: f64,
    /// Cells that were not executed.
    pub skipped: Vec<SkippedCell>,
    /// The executed notebook, when the executor wrote one.
    pub executed: Option<Notebook>,
}

/// Decide whether a cell can run outside Colab.
fn skip_reason(cell: &Cell, config: &ExecutorConfig) -> Option<SkipReason> {
    if cell.cell_type() != CellType::Code {
        return None;
    }
    let source = cell.source_text();

    if let Some(marker) = config.skip_markers.iter().find(|m| source.contains(m.as_str())) {
        return Some(SkipReason::Marker(marker.clone()));
    }

    let trimmed = source.trim();
    config
        .skip_prefixes
        .iter()
        .find(|p| trimmed.starts_with(p.as_str()))
        .map(|p| SkipReason::Prefix(p.clone()))
}

/// Copy of `notebook` without the cells that cannot run outside Colab.
pub fn prepare_for_execution(
    notebook: &Notebook,
    config: &ExecutorConfig,
) -> (Notebook, Vec<SkippedCell>) {
    let mut prepared = Notebook {
        cells: Vec::with_capacity(notebook.cells.len()),
        ..notebook.clone()
    };
    let mut skipped = Vec::new();

    for (index, cell) in notebook.cells.iter().enumerate() {
        match skip_reason(cell, config) {
            Some(reason) => {
                let preview = cell.source_text().chars().take(SKIPPED_PREVIEW_CHARS).collect();
                tracing::debug!(index, ?reason, "skipping cell");
                skipped.push(SkippedCell {
                    index,
                    reason,
                    preview,
                });
            }
            None => prepared.cells.push(cell.clone()),
        }
    }

    (prepared, skipped)
}

/// Runs notebooks through an external executor.
#[derive(Debug, Clone, Default)]
pub struct NotebookExecutor {
    config: ExecutorConfig,
}

impl NotebookExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The executor's configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Command-line arguments for executing `input` into `output_name`
    /// (written next to the input).
    pub fn args(&self, input: &std::path::Path, output_name: &str) -> Vec<String> {
        vec![
            "nbconvert".to_string(),
            "--to".to_string(),
            "notebook".to_string(),
            "--execute".to_string(),
            format!(
                "--ExecutePreprocessor.timeout={}",
                self.config.cell_timeout.as_secs()
            ),
            format!(
                "--ExecutePreprocessor.kernel_name={}",
                self.config.kernel_name
            ),
            "--output".to_string(),
            output_name.to_string(),
            input.display().to_string(),
        ]
    }

    /// Execute a notebook.
    ///
    /// Returns a report whether or not the cells succeeded; a failing cell
    /// shows up as `success == false`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExecutorNotFound` if the executor command is missing,
    /// `Error::ExecutorTimeout` if it runs past the overall timeout, and
    /// `Error::ExecutorError` for other process or I/O failures.
    pub async fn run(&self, notebook: &Notebook) -> Result<ExecutionReport> {
        let (prepared, skipped) = prepare_for_execution(notebook, &self.config);

        let scratch = tempfile::tempdir()
            .map_err(|e| Error::executor_error(format!("failed to create scratch dir: {}", e)))?;
        let input = scratch.path().join("notebook.ipynb");
        prepared.save(&input)?;

        let output_name = "executed.ipynb";
        let start = Instant::now();

        let mut cmd = Command::new(&self.config.command);
        cmd.args(self.args(&input, output_name));
        cmd.current_dir(scratch.path());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(command = %self.config.command, input = %input.display(), "executing notebook");

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::executor_not_found(&self.config.command)
            } else {
                Error::executor_error(format!("failed to spawn executor: {}", e))
            }
        })?;

        let output = match timeout(self.config.overall_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::executor_error(format!("wait failed: {}", e))),
            Err(_) => {
                return Err(Error::ExecutorTimeout {
                    timeout_secs: self.config.overall_timeout.as_secs(),
                })
            }
        };

        let duration_secs = start.elapsed().as_secs_f64();
        let exit_code = output.status.code();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let executed_path = scratch.path().join(output_name);
        let executed = if executed_path.exists() {
            match Notebook::load(&executed_path) {
                Ok(nb) => Some(nb),
                Err(e) => {
                    tracing::warn!(error = %e, "could not read executed notebook");
                    None
                }
            }
        } else {
            None
        };

        Ok(ExecutionReport {
            success: output.status.success(),
            exit_code,
            stderr,
            duration_secs,
            skipped,
            executed,
        })
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Marker(m) => write!(f, "contains '{}'", m),
            SkipReason::Prefix(p) => write!(f, "starts with '{}'", p),
        }
    }
}

impl ExecutionReport {
    /// The last `n` lines of the executor's stderr.
    pub fn stderr_tail(&self, n: usize) -> Vec<&str> {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }
}
