//! Notebook output inspection.
//!
//! Walks the code cells of an executed notebook and summarizes their
//! outputs, for debugging whether logs and errors ended up where expected.

use crate::notebook::{Notebook, Output};
use std::fmt;

/// Maximum source characters shown per cell.
const SOURCE_PREVIEW_CHARS: usize = 300;

/// Number of leading output lines considered for the preview.
const TEXT_PREVIEW_LINES: usize = 5;

/// Maximum characters shown per preview line.
const LINE_PREVIEW_CHARS: usize = 80;

/// Number of trailing traceback lines shown for errors.
const TRACEBACK_TAIL: usize = 3;

/// Substrings reported when found in stream output.
pub const INTERESTING_PATTERNS: [&str; 5] = ["BAML", "Parsed", "Response", "Error", "Exception"];

/// Summary of a whole notebook.
#[derive(Debug, Clone)]
pub struct Inspection {
    /// Number of cells of any type.
    pub total_cells: usize,
    /// The code cells that matched the filter.
    pub cells: Vec<CellInspection>,
}

/// Summary of one code cell.
#[derive(Debug, Clone)]
pub struct CellInspection {
    /// Index of the cell in the notebook.
    pub index: usize,
    /// Truncated source.
    pub source_preview: String,
    /// Output summaries, in order.
    pub outputs: Vec<OutputInspection>,
}

/// Summary of one output.
#[derive(Debug, Clone, Default)]
pub struct OutputInspection {
    /// The `output_type`.
    pub output_type: String,
    /// Length of the stream text in characters.
    pub text_len: Option<usize>,
    /// Leading non-blank lines, truncated.
    pub preview_lines: Vec<String>,
    /// Which [`INTERESTING_PATTERNS`] occur in the text.
    pub patterns: Vec<&'static str>,
    /// Mime types of a rich output.
    pub data_keys: Option<Vec<String>>,
    /// Details of an error output.
    pub error: Option<ErrorSummary>,
}

/// Details of an error output.
#[derive(Debug, Clone)]
pub struct ErrorSummary {
    /// Exception name.
    pub ename: String,
    /// Exception message.
    pub evalue: String,
    /// Total traceback lines.
    pub traceback_len: usize,
    /// Last few traceback lines, trimmed.
    pub traceback_tail: Vec<String>,
}

/// Inspect the code cells of a notebook. With a filter, only cells whose
/// source contains it (case-insensitively) are reported.
pub fn inspect_notebook(notebook: &Notebook, filter: Option<&str>) -> Inspection {
    let filter = filter.map(str::to_lowercase);

    let cells = notebook
        .code_cells()
        .filter(|(_, cell)| match &filter {
            Some(f) => cell.source_text().to_lowercase().contains(f.as_str()),
            None => true,
        })
        .map(|(index, cell)| CellInspection {
            index,
            source_preview: preview(cell.source_text(), SOURCE_PREVIEW_CHARS),
            outputs: cell.outputs().iter().map(inspect_output).collect(),
        })
        .collect();

    Inspection {
        total_cells: notebook.cells.len(),
        cells,
    }
}

fn inspect_output(output: &Output) -> OutputInspection {
    let mut summary = OutputInspection {
        output_type: output.output_type().to_string(),
        ..Default::default()
    };

    if let Some(text) = output.text() {
        summary.text_len = Some(text.chars().count());
        summary.preview_lines = text
            .split('\n')
            .take(TEXT_PREVIEW_LINES)
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.chars().take(LINE_PREVIEW_CHARS).collect())
            .collect();
        summary.patterns = INTERESTING_PATTERNS
            .iter()
            .copied()
            .filter(|p| text.contains(p))
            .collect();
    } else if let Some(keys) = output.data_keys() {
        summary.data_keys = Some(keys.into_iter().map(String::from).collect());
    }

    if let Output::Error {
        ename,
        evalue,
        traceback,
        ..
    } = output
    {
        let start = traceback.len().saturating_sub(TRACEBACK_TAIL);
        summary.error = Some(ErrorSummary {
            ename: if ename.is_empty() { "Unknown".to_string() } else { ename.clone() },
            evalue: if evalue.is_empty() { "No message".to_string() } else { evalue.clone() },
            traceback_len: traceback.len(),
            traceback_tail: traceback[start..].iter().map(|l| l.trim().to_string()).collect(),
        });
    }

    summary
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 Total cells: {}", self.total_cells)?;
        writeln!(f, "{}", "=".repeat(60))?;
        for cell in &self.cells {
            write!(f, "{}", cell)?;
        }
        Ok(())
    }
}

impl fmt::Display for CellInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n🔍 CELL {} (code)", self.index)?;
        writeln!(f, "📝 SOURCE:")?;
        writeln!(f, "{}", self.source_preview)?;

        if self.outputs.is_empty() {
            writeln!(f, "\n📤 No outputs")?;
        } else {
            writeln!(f, "\n📤 OUTPUTS ({} outputs):", self.outputs.len())?;
            for (j, output) in self.outputs.iter().enumerate() {
                writeln!(f, "  Output {}: type={}", j, output.output_type)?;
                write!(f, "{}", output)?;
            }
        }

        writeln!(f, "{}", "-".repeat(40))
    }
}

impl fmt::Display for OutputInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(len) = self.text_len {
            writeln!(f, "    Text length: {} chars", len)?;
            for line in &self.preview_lines {
                writeln!(f, "    > {}...", line)?;
            }
            if !self.patterns.is_empty() {
                writeln!(f, "    🎯 Found patterns: {:?}", self.patterns)?;
            }
        } else if let Some(keys) = &self.data_keys {
            writeln!(f, "    Data keys: {:?}", keys)?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "    ❌ ERROR: {}", error.ename)?;
            writeln!(f, "    💬 Message: {}", error.evalue)?;
            writeln!(f, "    📍 Traceback: {} lines", error.traceback_len)?;
            for line in &error.traceback_tail {
                writeln!(f, "    🔍 {}", line)?;
            }
        }

        Ok(())
    }
}
