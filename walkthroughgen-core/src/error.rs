//! Error types for the walkthrough tooling.
//!
//! This module provides a unified error type for all operations in the
//! walkthroughgen-core library, including walkthrough parsing, notebook
//! reading and writing, notebook execution, and the calculator agent loop.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for walkthroughgen-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read the walkthrough file from disk.
    #[error("failed to read walkthrough file '{path}': {source}")]
    WalkthroughReadError {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the walkthrough YAML content.
    #[error("failed to parse walkthrough YAML from '{path}': {source}")]
    WalkthroughParseError {
        /// The path containing invalid YAML.
        path: PathBuf,
        /// The underlying YAML parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to read a notebook file from disk.
    #[error("failed to read notebook '{path}': {source}")]
    NotebookReadError {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse (or serialize) notebook JSON.
    #[error("failed to parse notebook JSON from '{path}': {source}")]
    NotebookParseError {
        /// The path containing invalid JSON.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write a notebook file to disk.
    #[error("failed to write notebook '{path}': {source}")]
    NotebookWriteError {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configured notebook executor was not found.
    #[error("notebook executor not found: '{command}'")]
    ExecutorNotFound {
        /// The command that was not found.
        command: String,
    },

    /// The notebook executor failed to run.
    #[error("notebook execution failed: {message}")]
    ExecutorError {
        /// Description of what went wrong.
        message: String,
    },

    /// The notebook executor did not finish in time.
    #[error("notebook execution timed out after {timeout_secs} seconds")]
    ExecutorTimeout {
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },

    /// The language model client failed.
    #[error("llm request failed: {message}")]
    LlmError {
        /// Description of what went wrong.
        message: String,
    },

    /// The model answered with something that is not a valid next step.
    #[error("invalid next step from model: {message}")]
    InvalidStep {
        /// Description of the problem.
        message: String,
    },

    /// The calculator was asked to divide by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The agent loop ran out of turns without a final answer.
    #[error("agent did not finish within {max_turns} turns")]
    TurnLimit {
        /// The configured turn limit.
        max_turns: u32,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem.
        message: String,
    },

    /// An error that doesn't fit other categories.
    #[error("{message}")]
    Other {
        /// Description of the error.
        message: String,
    },
}

impl Error {
    /// Create a new `ExecutorError` with the given message.
    pub fn executor_error(message: impl Into<String>) -> Self {
        Self::ExecutorError {
            message: message.into(),
        }
    }

    /// Create a new `ExecutorNotFound` error for the given command.
    pub fn executor_not_found(command: impl Into<String>) -> Self {
        Self::ExecutorNotFound {
            command: command.into(),
        }
    }

    /// Create a new `LlmError` with the given message.
    pub fn llm_error(message: impl Into<String>) -> Self {
        Self::LlmError {
            message: message.into(),
        }
    }

    /// Create a new `InvalidStep` error with the given message.
    pub fn invalid_step(message: impl Into<String>) -> Self {
        Self::InvalidStep {
            message: message.into(),
        }
    }

    /// Create a new `ConfigError` with the given message.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new `Other` error with the given message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Self::llm_error(e.to_string())
    }
}

/// A specialized `Result` type for walkthroughgen-core operations.
pub type Result<T> = std::result::Result<T, Error>;
