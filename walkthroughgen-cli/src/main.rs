//! walkthroughgen CLI - workshop notebook tooling.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use walkthroughgen_core::{
    agent_loop, check_log_capture, inspect_notebook, sample, AgentConfig, ExecutorConfig,
    Generator, GeneratorConfig, Notebook, NotebookExecutor, OpenAiStepClient, Thread,
    ThreadFormat,
};

/// walkthroughgen - Generate, inspect and test workshop notebooks.
///
/// Converts walkthrough YAML files into Jupyter notebooks, checks executed
/// notebooks for captured logs, and runs the calculator agent demo.
#[derive(Parser, Debug)]
#[command(name = "walkthroughgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a walkthrough.yaml into a Jupyter notebook.
    Generate {
        /// Path to walkthrough.yaml.
        #[arg(value_name = "YAML_FILE")]
        yaml_file: PathBuf,

        /// Output notebook file.
        #[arg(short = 'o', long = "output", default_value = "output.ipynb")]
        output: PathBuf,

        /// Version of baml-py pinned in the setup cells.
        #[arg(long = "baml-version", env = "WALKTHROUGHGEN_BAML_VERSION")]
        baml_version: Option<String>,

        /// Base URL that fetch_file steps download from.
        #[arg(long = "fetch-base-url", env = "WALKTHROUGHGEN_FETCH_BASE_URL")]
        fetch_base_url: Option<String>,
    },

    /// Print the code cells and outputs of a notebook.
    Inspect {
        /// Notebook to inspect.
        #[arg(value_name = "NOTEBOOK")]
        notebook: PathBuf,

        /// Only show cells whose source contains this keyword.
        #[arg(value_name = "FILTER_KEYWORD")]
        filter: Option<String>,
    },

    /// Check that BAML logs were captured in an executed notebook.
    CheckLogs {
        /// Executed notebook to check.
        #[arg(value_name = "NOTEBOOK")]
        notebook: PathBuf,
    },

    /// Execute a notebook outside Colab and report pass/fail.
    Test {
        /// Notebook to execute.
        #[arg(value_name = "NOTEBOOK")]
        notebook: PathBuf,

        /// Executor command.
        #[arg(long = "executor", default_value = "jupyter", env = "WALKTHROUGHGEN_EXECUTOR")]
        executor: String,

        /// Kernel to execute with.
        #[arg(long = "kernel", default_value = "python3")]
        kernel: String,

        /// Per-cell timeout in seconds.
        #[arg(long = "cell-timeout", default_value = "10")]
        cell_timeout: u64,
    },

    /// Write the introductory workshop notebook.
    Sample {
        /// Output notebook file (defaults to <date>-workshop.ipynb).
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Workshop date (YYYY-MM-DD), defaults to today.
        #[arg(long = "date")]
        date: Option<NaiveDate>,
    },

    /// Run the calculator agent against an OpenAI-compatible model.
    Agent {
        /// Message for the agent.
        #[arg(value_name = "MESSAGE", num_args = 0.., default_value = "hello from the notebook!")]
        message: Vec<String>,

        /// Model name.
        #[arg(short = 'm', long = "model", default_value = "gpt-4o-mini", env = "WALKTHROUGHGEN_MODEL")]
        model: String,

        /// API base URL.
        #[arg(long = "api-base", default_value = "https://api.openai.com/v1", env = "OPENAI_BASE_URL")]
        api_base: String,

        /// Maximum number of model calls.
        #[arg(long = "max-turns", default_value = "10")]
        max_turns: u32,

        /// Thread serialization sent to the model (xml or json).
        #[arg(long = "thread-format", default_value = "xml", env = "WALKTHROUGHGEN_THREAD_FORMAT")]
        thread_format: ThreadFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn generate(
    yaml_file: PathBuf,
    output: PathBuf,
    baml_version: Option<String>,
    fetch_base_url: Option<String>,
) -> Result<bool> {
    let mut config = GeneratorConfig::new().output_path(&output);
    if let Some(version) = baml_version {
        config = config.baml_version(version);
    }
    if let Some(url) = fetch_base_url {
        config = config.fetch_base_url(url);
    }

    let generator = Generator::new(config);
    let generation = generator
        .convert(&yaml_file, &generator.config().output_path)
        .with_context(|| format!("failed to convert {}", yaml_file.display()))?;

    println!("Generated notebook: {}", output.display());
    for warning in &generation.warnings {
        println!("Warning: {}", warning);
    }
    Ok(true)
}

fn inspect(path: PathBuf, filter: Option<String>) -> Result<bool> {
    if !path.exists() {
        println!("❌ Notebook not found: {}", path.display());
        return Ok(false);
    }
    let nb = Notebook::load(&path)?;
    println!("📓 Inspecting notebook: {}", path.display());
    print!("{}", inspect_notebook(&nb, filter.as_deref()));
    Ok(true)
}

fn check_logs(path: PathBuf) -> Result<bool> {
    if !path.exists() {
        println!("❌ Notebook not found: {}", path.display());
        return Ok(false);
    }
    let nb = Notebook::load(&path)?;
    let report = check_log_capture(&nb);
    for finding in &report.findings {
        println!("{}", finding);
    }
    println!("{}", report.verdict());
    Ok(report.passed())
}

async fn test(path: PathBuf, config: ExecutorConfig) -> Result<bool> {
    println!("Testing notebook: {}", path.display());
    let nb = Notebook::load(&path)?;

    let executor = NotebookExecutor::new(config);
    let report = executor.run(&nb).await?;

    for skipped in &report.skipped {
        println!(
            "Skipping cell {} ({}): {}...",
            skipped.index, skipped.reason, skipped.preview
        );
    }

    if report.success {
        println!(
            "✅ Notebook executed successfully! ({:.1}s)",
            report.duration_secs
        );
    } else {
        println!(
            "❌ Error executing notebook (exit code {:?})",
            report.exit_code
        );
        for line in report.stderr_tail(20) {
            println!("  {}", line);
        }
    }
    Ok(report.success)
}

fn write_sample(output: Option<PathBuf>, date: Option<NaiveDate>) -> Result<bool> {
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let output = output.unwrap_or_else(|| PathBuf::from(sample::sample_file_name(date)));
    sample::sample_notebook(date).save(&output)?;
    println!("Notebook created successfully: {}", output.display());
    Ok(true)
}

/// Ask the user on the terminal.
fn ask_human(question: &str) -> walkthroughgen_core::Result<String> {
    println!("\n🤔 The agent needs clarification: {}", question);
    print!("Your response: ");
    std::io::stdout()
        .flush()
        .map_err(|e| walkthroughgen_core::Error::other(e.to_string()))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| walkthroughgen_core::Error::other(e.to_string()))?;
    Ok(line.trim().to_string())
}

async fn agent(message: Vec<String>, config: AgentConfig) -> Result<bool> {
    let message = message.join(" ");
    println!("🚀 Starting agent with message: '{}'", message);
    println!(
        "📋 Using {} format for thread serialization",
        config.thread_format
    );

    let max_turns = config.max_turns;
    let client = OpenAiStepClient::new(config).context("failed to create model client")?;

    let answer = tokio::task::spawn_blocking(move || {
        let mut thread = Thread::from_user_input(message);
        agent_loop(&client, &mut thread, ask_human, max_turns)
    })
    .await
    .context("agent task panicked")??;

    println!("\n✅ Final response: {}", answer);
    Ok(true)
}

async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Generate {
            yaml_file,
            output,
            baml_version,
            fetch_base_url,
        } => generate(yaml_file, output, baml_version, fetch_base_url),
        Command::Inspect { notebook, filter } => inspect(notebook, filter),
        Command::CheckLogs { notebook } => check_logs(notebook),
        Command::Test {
            notebook,
            executor,
            kernel,
            cell_timeout,
        } => {
            let config = ExecutorConfig::new()
                .command(executor)
                .kernel_name(kernel)
                .cell_timeout_secs(cell_timeout);
            test(notebook, config).await
        }
        Command::Sample { output, date } => write_sample(output, date),
        Command::Agent {
            message,
            model,
            api_base,
            max_turns,
            thread_format,
        } => {
            let config = AgentConfig::new()
                .model(model)
                .api_base(api_base)
                .max_turns(max_turns)
                .thread_format(thread_format);
            agent(message, config).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args() {
        let cli = Cli::parse_from(["walkthroughgen", "generate", "walkthrough.yaml", "-o", "nb.ipynb"]);
        match cli.command {
            Command::Generate {
                yaml_file, output, ..
            } => {
                assert_eq!(yaml_file, PathBuf::from("walkthrough.yaml"));
                assert_eq!(output, PathBuf::from("nb.ipynb"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_generate_default_output() {
        let cli = Cli::parse_from(["walkthroughgen", "generate", "w.yaml"]);
        match cli.command {
            Command::Generate { output, .. } => assert_eq!(output, PathBuf::from("output.ipynb")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_inspect_optional_filter() {
        let cli = Cli::parse_from(["walkthroughgen", "inspect", "nb.ipynb", "BAML"]);
        match cli.command {
            Command::Inspect { filter, .. } => assert_eq!(filter.as_deref(), Some("BAML")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_agent_message_words_and_sample_date() {
        let cli = Cli::parse_from(["walkthroughgen", "agent", "multiply", "3", "and", "4"]);
        match cli.command {
            Command::Agent {
                message,
                max_turns,
                thread_format,
                ..
            } => {
                assert_eq!(message.join(" "), "multiply 3 and 4");
                assert_eq!(max_turns, 10);
                assert_eq!(thread_format, ThreadFormat::Xml);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["walkthroughgen", "sample", "--date", "2025-07-16"]);
        match cli.command {
            Command::Sample { date, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 7, 16));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_agent_thread_format_flag() {
        let cli = Cli::parse_from(["walkthroughgen", "agent", "--thread-format", "json", "hi"]);
        match cli.command {
            Command::Agent { thread_format, .. } => assert_eq!(thread_format, ThreadFormat::Json),
            other => panic!("unexpected command {:?}", other),
        }

        let result = Cli::try_parse_from(["walkthroughgen", "agent", "--thread-format", "yaml", "hi"]);
        assert!(result.is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_generate_reports_only_on_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let hack = dir.path().join("hack");
        std::fs::create_dir_all(&hack).unwrap();
        let yaml = hack.join("walkthrough.yaml");
        std::fs::write(
            &yaml,
            "title: Demo\nsections:\n  - steps:\n      - file: {src: ./walkthrough/missing.py}\n",
        )
        .unwrap();
        let output = dir.path().join("out.ipynb");

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            generate(yaml.clone(), output.clone(), None, None)
        });
        assert!(result.unwrap());
        assert!(output.exists());

        let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logged.is_empty(), "unexpected log output: {}", logged);
    }

    #[test]
    fn test_check_logs_missing_file_fails() {
        let dir = std::env::temp_dir().join(format!("walkthroughgen_cli_{}", std::process::id()));
        let result = check_logs(dir.join("missing.ipynb")).unwrap();
        assert!(!result);
    }
}
