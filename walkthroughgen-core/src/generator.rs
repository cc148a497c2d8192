//! Walkthrough-to-notebook generator.
//!
//! Turns a [`Walkthrough`] into a [`Notebook`] by appending cells for each
//! section and step in order. Missing embedded files do not abort the run:
//! they are logged, recorded in [`Generation::warnings`], and replaced by an
//! inline error cell.

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::notebook::Notebook;
use crate::templates;
use crate::walkthrough::{RunMain, Section, Step, Walkthrough};
use serde_json::json;
use std::path::{Path, PathBuf};

/// A problem found while generating that did not stop generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An embedded file does not exist.
    FileNotFound {
        /// The `src` as written in the walkthrough.
        src: String,
        /// The path it resolved to.
        path: PathBuf,
    },
    /// An embedded file exists but could not be read.
    FileUnreadable {
        /// The `src` as written in the walkthrough.
        src: String,
        /// The path it resolved to.
        path: PathBuf,
        /// The I/O error.
        reason: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::FileNotFound { path, .. } => {
                write!(f, "File not found: {}", path.display())
            }
            Warning::FileUnreadable { path, reason, .. } => {
                write!(f, "Could not read {}: {}", path.display(), reason)
            }
        }
    }
}

/// The result of a generation run.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The generated notebook.
    pub notebook: Notebook,
    /// Non-fatal problems encountered.
    pub warnings: Vec<Warning>,
}

/// Builds notebooks from walkthroughs.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

/// Per-notebook state while cells are being appended.
struct Builder<'a> {
    config: &'a GeneratorConfig,
    base_path: &'a Path,
    notebook: Notebook,
    warnings: Vec<Warning>,
    reasoning_helpers_emitted: bool,
}

impl Generator {
    /// Create a generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// The generator's configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a notebook. `base_path` is the directory containing the
    /// walkthrough file; embedded file paths resolve against it.
    pub fn generate(&self, walkthrough: &Walkthrough, base_path: &Path) -> Generation {
        let mut builder = Builder {
            config: &self.config,
            base_path,
            notebook: Notebook::new(),
            warnings: Vec::new(),
            reasoning_helpers_emitted: false,
        };

        builder.notebook.metadata.insert(
            "kernelspec".to_string(),
            json!({"display_name": "Python 3", "language": "python", "name": "python3"}),
        );
        builder
            .notebook
            .metadata
            .insert("language_info".to_string(), json!({"name": "python"}));

        let title = walkthrough
            .title
            .as_deref()
            .unwrap_or(&self.config.default_title);
        builder.notebook.push_markdown(format!("# {}", title));

        if let Some(text) = &walkthrough.text {
            builder.notebook.push_markdown(text.clone());
        }

        for section in &walkthrough.sections {
            builder.section(section);
        }

        Generation {
            notebook: builder.notebook,
            warnings: builder.warnings,
        }
    }

    /// Load a walkthrough, generate its notebook and write it to `output_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the walkthrough cannot be loaded or the notebook
    /// cannot be written. Missing embedded files are only warnings.
    pub fn convert(&self, yaml_path: &Path, output_path: &Path) -> Result<Generation> {
        let walkthrough = Walkthrough::load(yaml_path)?;
        let base_path = yaml_path.parent().unwrap_or_else(|| Path::new(""));

        tracing::debug!(
            path = %yaml_path.display(),
            sections = walkthrough.sections.len(),
            steps = walkthrough.step_count(),
            "loaded walkthrough"
        );

        let generation = self.generate(&walkthrough, base_path);
        generation.notebook.save(output_path)?;

        tracing::debug!(
            cells = generation.notebook.cells.len(),
            warnings = generation.warnings.len(),
            path = %output_path.display(),
            "wrote notebook"
        );

        Ok(generation)
    }
}

impl Builder<'_> {
    fn section(&mut self, section: &Section) {
        self.notebook
            .push_markdown(format!("## {}", section.display_title()));

        if let Some(text) = &section.text {
            self.notebook.push_markdown(text.clone());
        }

        for step in &section.steps {
            self.step(step, section);
        }
    }

    fn step(&mut self, step: &Step, section: &Section) {
        if let Some(text) = &step.text {
            self.notebook.push_markdown(text.clone());
        }

        if step.baml_setup {
            self.baml_setup();
        }

        if let Some(file) = &step.file {
            self.embed_file(&file.src);
        }

        if let Some(fetch) = &step.fetch_file {
            let url = self.config.fetch_url(&fetch.src);
            self.notebook
                .push_code(templates::fetch_file(&url, &fetch.dest));
        }

        if let Some(dir) = &step.dir {
            self.notebook.push_code(templates::make_dir(&dir.path));
        }

        if let Some(command) = &step.command {
            self.notebook.push_code(templates::shell_command(command));
        }

        if let Some(run) = &step.run_main {
            self.run_main(run, section);
        }
    }

    fn baml_setup(&mut self) {
        self.notebook
            .push_markdown(templates::BAML_SETUP_EXPLANATION);
        self.notebook
            .push_code(templates::baml_install(&self.config.baml_version));
        self.notebook.push_code(templates::BAML_CLIENT_HELPERS);
        self.notebook.push_code(templates::BAML_INIT);
        self.notebook.push_code(templates::LOG_CAPTURE_HELPERS);
    }

    /// Resolve an embedded file path. `./x` is relative to the walkthrough
    /// directory's parent, anything else to the walkthrough directory.
    fn resolve(&self, src: &str) -> PathBuf {
        match src.strip_prefix("./") {
            Some(rest) => self
                .base_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(rest),
            None => self.base_path.join(src),
        }
    }

    fn embed_file(&mut self, src: &str) {
        if !src.ends_with(".py") {
            tracing::debug!(src, "skipping non-Python file step");
            return;
        }

        let path = self.resolve(src);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                self.notebook
                    .push_code(templates::embedded_file(src, &content));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "embedded file not found");
                self.notebook.push_markdown(templates::missing_file(src));
                self.warnings.push(Warning::FileNotFound {
                    src: src.to_string(),
                    path,
                });
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "embedded file unreadable");
                let reason = e.to_string();
                self.notebook
                    .push_markdown(templates::unreadable_file(src, &reason));
                self.warnings.push(Warning::FileUnreadable {
                    src: src.to_string(),
                    path,
                    reason,
                });
            }
        }
    }

    fn run_main(&mut self, run: &RunMain, section: &Section) {
        if run.regenerate_baml {
            self.notebook.push_code(templates::BAML_GENERATE_CALL);
        }

        let args = run.call_args();

        if !run.show_logs {
            self.notebook.push_code(templates::main_call(&args));
            return;
        }

        let helper = if section.is_reasoning() {
            if !self.reasoning_helpers_emitted {
                self.notebook.push_code(templates::REASONING_HELPERS);
                self.reasoning_helpers_emitted = true;
            }
            templates::REASONING_HELPER
        } else {
            templates::LOG_CAPTURE_HELPER
        };

        self.notebook
            .push_code(templates::wrapped_main_call(helper, &args));
    }
}
