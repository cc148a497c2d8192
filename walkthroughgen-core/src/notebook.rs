//! Jupyter notebook (nbformat v4) types.
//!
//! Covers what the walkthrough tools read and write: the cell list, cell
//! sources, and code cell outputs. Multiline text fields are accepted either
//! as one string or as a list of lines, and are always written as a list of
//! lines the way nbformat does. Fields this module does not model are kept
//! and written back unchanged.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::Path;

/// Major format version written by this module.
pub const NBFORMAT: u32 = 4;

/// Minor format version written by this module (cell ids are required from 4.5).
pub const NBFORMAT_MINOR: u32 = 5;

/// A Jupyter notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    /// The cells, in order.
    pub cells: Vec<Cell>,

    /// Notebook-level metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Major format version.
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,

    /// Minor format version.
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,

    /// Other top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_nbformat() -> u32 {
    NBFORMAT
}

fn default_nbformat_minor() -> u32 {
    NBFORMAT_MINOR
}

/// A notebook cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    /// A markdown cell.
    Markdown {
        /// Cell id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Cell metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Markdown source.
        #[serde(default)]
        source: MultilineText,
        /// Other keys, such as `attachments`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// A code cell.
    Code {
        /// Cell id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Cell metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Code source.
        #[serde(default)]
        source: MultilineText,
        /// Outputs captured from the last run.
        #[serde(default)]
        outputs: Vec<Output>,
        /// Execution counter of the last run.
        #[serde(default)]
        execution_count: Option<u64>,
        /// Other keys.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// A raw cell.
    Raw {
        /// Cell id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Cell metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Raw source.
        #[serde(default)]
        source: MultilineText,
        /// Other keys, such as `attachments`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

/// The type of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    /// Markdown.
    Markdown,
    /// Code.
    Code,
    /// Raw.
    Raw,
}

/// An output of a code cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    /// Text written to stdout or stderr.
    Stream {
        /// Stream name (`stdout` or `stderr`).
        name: String,
        /// The text.
        #[serde(default)]
        text: MultilineText,
        /// Other keys.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// The value of the last expression.
    ExecuteResult {
        /// Mime bundle.
        #[serde(default)]
        data: Map<String, Value>,
        /// Output metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Execution counter.
        #[serde(default)]
        execution_count: Option<u64>,
        /// Other keys.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Rich display output.
    DisplayData {
        /// Mime bundle.
        #[serde(default)]
        data: Map<String, Value>,
        /// Output metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
        /// Other keys, such as `transient`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// An exception raised by the cell.
    Error {
        /// Exception name.
        #[serde(default)]
        ename: String,
        /// Exception value.
        #[serde(default)]
        evalue: String,
        /// Formatted traceback lines.
        #[serde(default)]
        traceback: Vec<String>,
        /// Other keys.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Any other output, kept as the raw JSON object.
    #[serde(untagged)]
    Unknown(Map<String, Value>),
}

/// Text stored in a notebook as either a string or a list of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultilineText(String);

impl MultilineText {
    /// Create from a string.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The joined text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lines in nbformat's list form: every line but the last keeps its `\n`.
    pub fn to_lines(&self) -> Vec<&str> {
        self.0.split_inclusive('\n').collect()
    }
}

impl From<&str> for MultilineText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for MultilineText {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl Serialize for MultilineText {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_lines().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MultilineText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(s) => Self(s),
            Repr::Many(lines) => Self(lines.concat()),
        })
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Notebook {
    /// Create an empty notebook.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            extra: Map::new(),
        }
    }

    /// Load a notebook from a `.ipynb` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a notebook.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::NotebookReadError {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| Error::NotebookParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a notebook from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| Error::NotebookParseError {
            path: Default::default(),
            source,
        })
    }

    /// Serialize with one-space indentation and a trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)
            .map_err(|source| Error::NotebookParseError {
                path: Default::default(),
                source,
            })?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| Error::other(e.to_string()))
    }

    /// Save the notebook to a `.ipynb` file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json_string()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::NotebookWriteError {
                path: path.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, content).map_err(|source| Error::NotebookWriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    fn next_id(&self) -> Option<String> {
        Some(format!("cell-{}", self.cells.len() + 1))
    }

    /// Append a markdown cell.
    pub fn push_markdown(&mut self, source: impl Into<String>) {
        let id = self.next_id();
        self.cells.push(Cell::Markdown {
            id,
            metadata: Map::new(),
            source: MultilineText::new(source),
            extra: Map::new(),
        });
    }

    /// Append an unexecuted code cell.
    pub fn push_code(&mut self, source: impl Into<String>) {
        let id = self.next_id();
        self.cells.push(Cell::Code {
            id,
            metadata: Map::new(),
            source: MultilineText::new(source),
            outputs: Vec::new(),
            execution_count: None,
            extra: Map::new(),
        });
    }

    /// Iterate over code cells together with their index in the notebook.
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.cell_type() == CellType::Code)
    }
}

impl Cell {
    /// The type of this cell.
    pub fn cell_type(&self) -> CellType {
        match self {
            Cell::Markdown { .. } => CellType::Markdown,
            Cell::Code { .. } => CellType::Code,
            Cell::Raw { .. } => CellType::Raw,
        }
    }

    /// The cell's source text.
    pub fn source_text(&self) -> &str {
        match self {
            Cell::Markdown { source, .. } | Cell::Code { source, .. } | Cell::Raw { source, .. } => {
                source.as_str()
            }
        }
    }

    /// The cell's outputs; empty for non-code cells.
    pub fn outputs(&self) -> &[Output] {
        match self {
            Cell::Code { outputs, .. } => outputs,
            _ => &[],
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellType::Markdown => write!(f, "markdown"),
            CellType::Code => write!(f, "code"),
            CellType::Raw => write!(f, "raw"),
        }
    }
}

impl Output {
    /// The `output_type` string.
    pub fn output_type(&self) -> &str {
        match self {
            Output::Stream { .. } => "stream",
            Output::ExecuteResult { .. } => "execute_result",
            Output::DisplayData { .. } => "display_data",
            Output::Error { .. } => "error",
            Output::Unknown(raw) => raw
                .get("output_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    /// Text of a stream output.
    pub fn text(&self) -> Option<&str> {
        match self {
            Output::Stream { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    /// Mime types of a rich output.
    pub fn data_keys(&self) -> Option<Vec<&str>> {
        match self {
            Output::ExecuteResult { data, .. } | Output::DisplayData { data, .. } => {
                Some(data.keys().map(String::as_str).collect())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXECUTED: &str = r##"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": "# Title"},
  {
   "cell_type": "code",
   "execution_count": 3,
   "id": "abc",
   "metadata": {"tags": ["x"]},
   "source": ["print('a')\n", "print('b')"],
   "outputs": [
    {"output_type": "stream", "name": "stdout", "text": ["a\n", "b\n"]},
    {"output_type": "execute_result", "execution_count": 3, "data": {"text/plain": "1"}, "metadata": {}},
    {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": ["t1", "t2"]},
    {"output_type": "update_display_data", "data": {}}
   ]
  }
 ],
 "metadata": {"kernelspec": {"name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 2
}"##;

    #[test]
    fn test_parse_executed_notebook() {
        let nb = Notebook::from_json_str(EXECUTED).unwrap();
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.nbformat_minor, 2);

        let code = &nb.cells[1];
        assert_eq!(code.cell_type(), CellType::Code);
        assert_eq!(code.source_text(), "print('a')\nprint('b')");

        let outputs = code.outputs();
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs[0].text(), Some("a\nb\n"));
        assert_eq!(outputs[1].data_keys(), Some(vec!["text/plain"]));
        assert_eq!(outputs[2].output_type(), "error");
        assert!(matches!(outputs[3], Output::Unknown(_)));
        assert_eq!(outputs[3].output_type(), "update_display_data");

        assert!(nb.cells[0].outputs().is_empty());
    }

    #[test]
    fn test_round_trip_keeps_unmodelled_fields() {
        let input = serde_json::json!({
            "cells": [
                {
                    "cell_type": "markdown",
                    "id": "m1",
                    "metadata": {},
                    "source": ["![x](attachment:x.png)"],
                    "attachments": {"x.png": {"image/png": "iVBOR"}}
                },
                {
                    "cell_type": "code",
                    "id": "c1",
                    "metadata": {},
                    "source": ["display(x)"],
                    "execution_count": 1,
                    "outputs": [
                        {"output_type": "weird_future", "foo": 1},
                        {"output_type": "display_data", "data": {}, "metadata": {},
                         "transient": {"display_id": "d1"}}
                    ]
                }
            ],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5,
            "extra_top": {"kept": true}
        });

        let nb = Notebook::from_json_str(&input.to_string()).unwrap();
        assert_eq!(nb.cells[1].outputs()[0].output_type(), "weird_future");

        let written: Value = serde_json::from_str(&nb.to_json_string().unwrap()).unwrap();
        assert_eq!(written, input);
    }

    #[test]
    fn test_code_cells_keep_notebook_index() {
        let nb = Notebook::from_json_str(EXECUTED).unwrap();
        let indices: Vec<usize> = nb.code_cells().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1]);
    }

    #[test]
    fn test_push_cells_assigns_ids() {
        let mut nb = Notebook::new();
        nb.push_markdown("# Hello");
        nb.push_code("main()");

        match &nb.cells[1] {
            Cell::Code {
                id,
                outputs,
                execution_count,
                ..
            } => {
                assert_eq!(id.as_deref(), Some("cell-2"));
                assert!(outputs.is_empty());
                assert!(execution_count.is_none());
            }
            other => panic!("expected code cell, got {:?}", other),
        }
    }

    #[test]
    fn test_written_json_matches_nbformat_layout() {
        let mut nb = Notebook::new();
        nb.push_code("import os\nprint(os.getcwd())");
        let json = nb.to_json_string().unwrap();

        assert!(json.ends_with("}\n"));
        assert!(json.contains("\n \"cells\": ["));

        let value: Value = serde_json::from_str(&json).unwrap();
        let cell = &value["cells"][0];
        assert_eq!(cell["cell_type"], "code");
        assert_eq!(cell["execution_count"], Value::Null);
        assert_eq!(cell["outputs"], serde_json::json!([]));
        assert_eq!(
            cell["source"],
            serde_json::json!(["import os\n", "print(os.getcwd())"])
        );
        assert_eq!(value["nbformat"], 4);
        assert_eq!(value["nbformat_minor"], 5);
    }

    #[test]
    fn test_empty_source_is_empty_list() {
        let text = MultilineText::new("");
        assert!(text.to_lines().is_empty());
        assert_eq!(serde_json::to_string(&text).unwrap(), "[]");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.ipynb");

        let mut nb = Notebook::new();
        nb.push_markdown("# Saved");
        nb.save(&path).unwrap();

        let loaded = Notebook::load(&path).unwrap();
        assert_eq!(loaded.cells.len(), 1);
        assert_eq!(loaded.cells[0].source_text(), "# Saved");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Notebook::load(dir.path().join("nope.ipynb")).unwrap_err();
        assert!(matches!(err, Error::NotebookReadError { .. }));

        let path = dir.path().join("bad.ipynb");
        std::fs::write(&path, "{not json").unwrap();
        let err = Notebook::load(&path).unwrap_err();
        assert!(matches!(err, Error::NotebookParseError { .. }));
    }
}
