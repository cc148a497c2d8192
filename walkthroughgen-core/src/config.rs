//! Configuration for the walkthrough tools.
//!
//! This module provides builder-style configuration structs for the
//! notebook generator, the notebook execution harness, and the calculator
//! agent loop.

use crate::agent::ThreadFormat;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default pinned version of `baml-py` installed by the setup cells.
const DEFAULT_BAML_VERSION: &str = "0.202.0";

/// Default base URL that `fetch_file` steps download from.
const DEFAULT_FETCH_BASE_URL: &str =
    "https://raw.githubusercontent.com/humanlayer/12-factor-agents/refs/heads/main/workshops/2025-07-16";

/// Default notebook title when the walkthrough has none.
const DEFAULT_TITLE: &str = "Walkthrough";

/// Default output path of the generator.
const DEFAULT_OUTPUT_PATH: &str = "output.ipynb";

/// Default executor command.
const DEFAULT_EXECUTOR_COMMAND: &str = "jupyter";

/// Default kernel name.
const DEFAULT_KERNEL_NAME: &str = "python3";

/// Default per-cell timeout in seconds.
const DEFAULT_CELL_TIMEOUT_SECS: u64 = 10;

/// Default overall execution timeout in seconds.
const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 300;

/// Default chat completions endpoint.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model name.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default turn limit for the agent loop.
const DEFAULT_MAX_TURNS: u32 = 10;

/// Default HTTP timeout for model requests, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Configuration for the walkthrough-to-notebook generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Version of `baml-py` pinned in the install cell.
    pub baml_version: String,

    /// Base URL prepended to `fetch_file` sources.
    pub fetch_base_url: String,

    /// Title used when the walkthrough does not set one.
    pub default_title: String,

    /// Where the generated notebook is written.
    pub output_path: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            baml_version: DEFAULT_BAML_VERSION.to_string(),
            fetch_base_url: DEFAULT_FETCH_BASE_URL.to_string(),
            default_title: DEFAULT_TITLE.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl GeneratorConfig {
    /// Create a new GeneratorConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pinned `baml-py` version.
    pub fn baml_version(mut self, version: impl Into<String>) -> Self {
        self.baml_version = version.into();
        self
    }

    /// Set the base URL for `fetch_file` steps. A trailing slash is dropped.
    pub fn fetch_base_url(mut self, url: impl Into<String>) -> Self {
        self.fetch_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the fallback notebook title.
    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Set the output notebook path.
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Build the download URL for a `fetch_file` source.
    pub fn fetch_url(&self, src: &str) -> String {
        format!("{}/{}", self.fetch_base_url, src.trim_start_matches("./"))
    }
}

/// Configuration for the notebook execution harness.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// The executor command (normally `jupyter`).
    pub command: String,

    /// Kernel used to run the notebook.
    pub kernel_name: String,

    /// Per-cell timeout passed to the executor.
    pub cell_timeout: Duration,

    /// Timeout for the whole executor process.
    pub overall_timeout: Duration,

    /// Source substrings that cause a code cell to be skipped.
    pub skip_markers: Vec<String>,

    /// Source prefixes (after trimming) that cause a code cell to be skipped.
    pub skip_prefixes: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_EXECUTOR_COMMAND.to_string(),
            kernel_name: DEFAULT_KERNEL_NAME.to_string(),
            cell_timeout: Duration::from_secs(DEFAULT_CELL_TIMEOUT_SECS),
            overall_timeout: Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECS),
            skip_markers: vec!["google.colab".to_string(), "baml-cli".to_string()],
            skip_prefixes: vec!["!pip".to_string()],
        }
    }
}

impl ExecutorConfig {
    /// Create a new ExecutorConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the executor command.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the kernel name.
    pub fn kernel_name(mut self, kernel: impl Into<String>) -> Self {
        self.kernel_name = kernel.into();
        self
    }

    /// Set the per-cell timeout in seconds.
    pub fn cell_timeout_secs(mut self, secs: u64) -> Self {
        self.cell_timeout = Duration::from_secs(secs);
        self
    }

    /// Set the overall timeout in seconds.
    pub fn overall_timeout_secs(mut self, secs: u64) -> Self {
        self.overall_timeout = Duration::from_secs(secs);
        self
    }

    /// Add a source substring that marks a cell as not runnable.
    pub fn add_skip_marker(mut self, marker: impl Into<String>) -> Self {
        self.skip_markers.push(marker.into());
        self
    }

    /// Add a source prefix that marks a cell as not runnable.
    pub fn add_skip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }
}

/// Configuration for the calculator agent loop and its model client.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,

    /// API key; read from `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,

    /// Model name.
    pub model: String,

    /// Maximum number of model calls before giving up.
    pub max_turns: u32,

    /// HTTP request timeout.
    pub request_timeout: Duration,

    /// How the thread is rendered for the model.
    pub thread_format: ThreadFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            thread_format: ThreadFormat::default(),
        }
    }
}

impl AgentConfig {
    /// Create a new AgentConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL. A trailing slash is dropped.
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API key explicitly.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the turn limit.
    pub fn max_turns(mut self, max: u32) -> Self {
        self.max_turns = max;
        self
    }

    /// Set the request timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(secs);
        self
    }

    /// Set the thread serialization format.
    pub fn thread_format(mut self, format: ThreadFormat) -> Self {
        self.thread_format = format;
        self
    }

    /// Resolve the API key, falling back to the `OPENAI_API_KEY` variable.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if no key is configured anywhere.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config_error("OPENAI_API_KEY not set"))
    }

    /// Check the config for values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::config_error("model name must not be empty"));
        }
        if self.max_turns == 0 {
            return Err(Error::config_error("max_turns must be at least 1"));
        }
        Ok(())
    }
}
