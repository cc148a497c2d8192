//! walkthroughgen core library
//!
//! This crate provides the workshop tooling behind the `walkthroughgen` CLI:
//! walkthrough parsing, notebook generation, notebook inspection and log
//! capture checks, notebook execution, and the calculator agent loop.

pub mod agent;
pub mod config;
pub mod error;
pub mod executor;
pub mod generator;
pub mod inspect;
pub mod llm;
pub mod logcheck;
pub mod notebook;
pub mod sample;
pub mod templates;
pub mod walkthrough;

pub use agent::{
    agent_loop, NextStep, ScriptedClient, StepClient, Thread, ThreadEvent, ThreadFormat,
};
pub use config::{AgentConfig, ExecutorConfig, GeneratorConfig};
pub use error::{Error, Result};
pub use executor::{prepare_for_execution, ExecutionReport, NotebookExecutor, SkippedCell};
pub use generator::{Generation, Generator, Warning};
pub use inspect::{inspect_notebook, Inspection};
pub use llm::OpenAiStepClient;
pub use logcheck::{check_log_capture, LogCaptureReport, Verdict};
pub use notebook::{Cell, CellType, Notebook, Output};
pub use walkthrough::{Section, Step, StepKind, Walkthrough};
