//! Walkthrough (YAML) types and parsing.
//!
//! A walkthrough is a tutorial described as ordered sections of steps. This
//! module provides the types for loading one from YAML and for turning a
//! `run_main` step's arguments into a Python call argument list.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// A tutorial walkthrough: a title, an optional intro and ordered sections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Walkthrough {
    /// Notebook title.
    #[serde(default)]
    pub title: Option<String>,

    /// Introductory text shown under the title.
    #[serde(default)]
    pub text: Option<String>,

    /// The sections, in order.
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A section of a walkthrough.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    /// Machine name of the section (e.g. `06-reasoning`).
    #[serde(default)]
    pub name: Option<String>,

    /// Human-facing title.
    #[serde(default)]
    pub title: Option<String>,

    /// Section introduction.
    #[serde(default)]
    pub text: Option<String>,

    /// The steps, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single step. Several keys may be present on one step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step {
    /// Markdown text.
    #[serde(default)]
    pub text: Option<String>,

    /// Emit the BAML setup cells. Only the key's presence matters.
    #[serde(default, deserialize_with = "key_present")]
    pub baml_setup: bool,

    /// Embed a source file.
    #[serde(default)]
    pub file: Option<FileRef>,

    /// Download a file inside the notebook.
    #[serde(default)]
    pub fetch_file: Option<FetchFile>,

    /// Create a directory inside the notebook.
    #[serde(default)]
    pub dir: Option<DirRef>,

    /// Shell command to run inside the notebook.
    #[serde(default)]
    pub command: Option<String>,

    /// Call the tutorial's `main()`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub run_main: Option<RunMain>,
}

/// The kinds of work a step can describe, in handling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Markdown text.
    Text,
    /// BAML setup cells.
    BamlSetup,
    /// Embedded file.
    File,
    /// Remote file fetch.
    FetchFile,
    /// Directory creation.
    Dir,
    /// Shell command.
    Command,
    /// `main()` call.
    RunMain,
}

/// A file embedded into the notebook.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    /// Path of the file, relative to the walkthrough.
    pub src: String,
}

/// A file downloaded by the notebook at run time.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchFile {
    /// Path of the file in the upstream repository.
    pub src: String,
    /// Destination path inside the notebook's working directory.
    pub dest: String,
}

/// A directory created by the notebook at run time.
#[derive(Debug, Clone, Deserialize)]
pub struct DirRef {
    /// Directory path.
    pub path: String,
}

/// Options for a `main()` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunMain {
    /// Regenerate the BAML client before calling `main()`.
    #[serde(default)]
    pub regenerate_baml: bool,

    /// Single positional string argument.
    #[serde(default)]
    pub args: Option<String>,

    /// Keyword arguments, in document order.
    #[serde(default)]
    pub kwargs: Mapping,

    /// Wrap the call in a log-capturing helper.
    #[serde(default)]
    pub show_logs: bool,
}

fn key_present<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|_| true)
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(|v| Some(v.unwrap_or_default()))
}

impl Walkthrough {
    /// Load a walkthrough from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| Error::WalkthroughReadError {
                path: path.to_path_buf(),
                source,
            })?;

        Self::parse(&content).map_err(|source| Error::WalkthroughParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a walkthrough from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::WalkthroughParseError` (with an empty path) on invalid YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse(content).map_err(|source| Error::WalkthroughParseError {
            path: Default::default(),
            source,
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document is a walkthrough with no content.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Total number of steps across all sections.
    pub fn step_count(&self) -> usize {
        self.sections.iter().map(|s| s.steps.len()).sum()
    }
}

impl Section {
    /// Title to show: the title, else the name, else `"Section"`.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Section")
    }

    /// The section name, or an empty string.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Whether `run_main` calls in this section should show model reasoning.
    pub fn is_reasoning(&self) -> bool {
        self.name().to_lowercase().contains("reasoning")
    }
}

impl Step {
    /// The kinds present on this step, in the order they are handled.
    pub fn kinds(&self) -> Vec<StepKind> {
        let mut kinds = Vec::new();
        if self.text.is_some() {
            kinds.push(StepKind::Text);
        }
        if self.baml_setup {
            kinds.push(StepKind::BamlSetup);
        }
        if self.file.is_some() {
            kinds.push(StepKind::File);
        }
        if self.fetch_file.is_some() {
            kinds.push(StepKind::FetchFile);
        }
        if self.dir.is_some() {
            kinds.push(StepKind::Dir);
        }
        if self.command.is_some() {
            kinds.push(StepKind::Command);
        }
        if self.run_main.is_some() {
            kinds.push(StepKind::RunMain);
        }
        kinds
    }
}

impl RunMain {
    /// Python argument list for the call, in order: the positional string
    /// (if non-empty) followed by the keyword arguments.
    pub fn call_args(&self) -> Vec<String> {
        let mut parts = Vec::new();

        if let Some(args) = self.args.as_deref().filter(|a| !a.is_empty()) {
            parts.push(python_string(args));
        }

        for (key, value) in &self.kwargs {
            let key = match key {
                Value::String(s) => s.clone(),
                other => python_literal(other),
            };
            parts.push(format!("{}={}", key, python_literal(value)));
        }

        parts
    }
}

/// Render a string as a double-quoted Python literal.
fn python_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a YAML value as Python source.
fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => python_string(s),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", python_literal(k), python_literal(v)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        Value::Tagged(tagged) => python_literal(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
title: "Building the 12-factor agent template from scratch in Python"
text: "Steps to start from a bare Python repo."
sections:
  - name: hello-world
    title: "Chapter 0 - Hello World"
    text: "Let's start with a basic Python setup."
    steps:
      - text: "Here's our main function"
        file: {src: ./walkthrough/00-main.py}
      - run_main: {}
  - name: cli-and-agent
    steps:
      - baml_setup: true
      - fetch_file: {src: ./walkthrough/01-agent.baml, dest: baml_src/agent.baml}
      - dir: {path: baml_src}
      - command: "baml-cli generate"
      - run_main:
          regenerate_baml: true
          args: "Hello"
          show_logs: true
"#;

    #[test]
    fn test_parse_sample() {
        let wt = Walkthrough::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            wt.title.as_deref(),
            Some("Building the 12-factor agent template from scratch in Python")
        );
        assert_eq!(wt.sections.len(), 2);
        assert_eq!(wt.step_count(), 7);

        let first = &wt.sections[0];
        assert_eq!(first.display_title(), "Chapter 0 - Hello World");
        assert_eq!(
            first.steps[0].kinds(),
            vec![StepKind::Text, StepKind::File]
        );
        assert_eq!(first.steps[1].kinds(), vec![StepKind::RunMain]);

        let second = &wt.sections[1];
        assert_eq!(second.display_title(), "cli-and-agent");
        assert!(second.steps[0].baml_setup);
        let fetch = second.steps[1].fetch_file.as_ref().unwrap();
        assert_eq!(fetch.dest, "baml_src/agent.baml");
        let run = second.steps[4].run_main.as_ref().unwrap();
        assert!(run.regenerate_baml);
        assert!(run.show_logs);
        assert_eq!(run.call_args(), vec!["\"Hello\""]);
    }

    #[test]
    fn test_empty_document() {
        let wt = Walkthrough::from_yaml_str("").unwrap();
        assert!(wt.title.is_none());
        assert!(wt.sections.is_empty());
    }

    #[test]
    fn test_null_keys_count_as_present() {
        let wt = Walkthrough::from_yaml_str(
            "sections:\n  - steps:\n      - baml_setup:\n      - run_main:\n",
        )
        .unwrap();
        let steps = &wt.sections[0].steps;
        assert!(steps[0].baml_setup);
        assert!(steps[1].run_main.is_some());
        assert!(steps[1].run_main.as_ref().unwrap().call_args().is_empty());
    }

    #[test]
    fn test_display_title_fallbacks() {
        let section = Section::default();
        assert_eq!(section.display_title(), "Section");
        assert_eq!(section.name(), "");

        let section = Section {
            name: Some("06-Reasoning".to_string()),
            ..Default::default()
        };
        assert_eq!(section.display_title(), "06-Reasoning");
        assert!(section.is_reasoning());
    }

    #[test]
    fn test_call_args_kwargs_order_and_literals() {
        let wt = Walkthrough::from_yaml_str(
            r#"
sections:
  - steps:
      - run_main:
          args: 'say "hi"'
          kwargs:
            message: "can you multiply 3 and 4"
            retries: 3
            verbose: false
            extra: null
            values: [1, "two"]
"#,
        )
        .unwrap();
        let run = wt.sections[0].steps[0].run_main.as_ref().unwrap();
        assert_eq!(
            run.call_args(),
            vec![
                r#""say \"hi\"""#.to_string(),
                r#"message="can you multiply 3 and 4""#.to_string(),
                "retries=3".to_string(),
                "verbose=False".to_string(),
                "extra=None".to_string(),
                r#"values=[1, "two"]"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_args_are_skipped() {
        let run = RunMain {
            args: Some(String::new()),
            ..Default::default()
        };
        assert!(run.call_args().is_empty());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walkthrough.yaml");
        std::fs::write(&path, "sections: [unclosed").unwrap();

        let err = Walkthrough::load(&path).unwrap_err();
        assert!(matches!(err, Error::WalkthroughParseError { .. }));
        assert!(err.to_string().contains("walkthrough.yaml"));

        let err = Walkthrough::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, Error::WalkthroughReadError { .. }));
    }
}
