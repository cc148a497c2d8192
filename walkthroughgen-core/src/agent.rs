//! Calculator agent loop.
//!
//! The demo agent from the workshop: a thread of events is sent to a model,
//! which answers with the next step. Arithmetic steps are executed locally
//! and appended to the thread, clarification requests go to a human, and a
//! `done_for_now` step ends the loop.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// Tool name recorded in `tool_call` events.
pub const CALCULATOR_TOOL: &str = "calculator";

/// Result recorded for a division by zero.
pub const DIVISION_BY_ZERO_RESULT: &str = "Error: Division by zero";

/// One entry in a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEvent {
    /// Event type, e.g. `user_input` or `tool_call`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload.
    pub data: Value,
}

impl ThreadEvent {
    /// Create an event.
    pub fn new(kind: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
        }
    }
}

/// The conversation so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Events in order.
    pub events: Vec<ThreadEvent>,
}

impl Thread {
    /// Start a thread with a user message.
    pub fn from_user_input(message: impl Into<String>) -> Self {
        Self {
            events: vec![ThreadEvent::new("user_input", message.into())],
        }
    }

    /// Append an event.
    pub fn push(&mut self, kind: impl Into<String>, data: impl Into<Value>) {
        self.events.push(ThreadEvent::new(kind, data));
    }

    /// Render the thread in the given format.
    pub fn serialize(&self, format: ThreadFormat) -> Result<String> {
        match format {
            ThreadFormat::Xml => self.serialize_as_xml(),
            ThreadFormat::Json => self.serialize_as_json(),
        }
    }

    /// Pretty-printed JSON array of events.
    pub fn serialize_as_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.events).map_err(|e| Error::other(e.to_string()))
    }

    /// Events as XML-ish tags inside `<thread>`, with tool call data as YAML.
    ///
    /// Event types other than user input, tool calls and clarifications are
    /// left out.
    pub fn serialize_as_xml(&self) -> Result<String> {
        let mut parts = vec!["<thread>".to_string()];

        for event in &self.events {
            match event.kind.as_str() {
                kind @ ("user_input" | "clarification_request" | "clarification_response") => {
                    parts.push(format!("  <{kind}>{}</{kind}>", display_value(&event.data)));
                }
                "tool_call" => {
                    let tool = event
                        .data
                        .get("tool")
                        .and_then(Value::as_str)
                        .unwrap_or(CALCULATOR_TOOL);
                    let yaml = serde_yaml::to_string(&event.data)
                        .map_err(|e| Error::other(e.to_string()))?;
                    let body: Vec<&str> = yaml.trim().lines().collect();

                    parts.push(format!("  <{}>", tool));
                    parts.push(format!("    {}", body.join("\n    ")));
                    parts.push(format!("  </{}>", tool));
                }
                _ => {}
            }
        }

        parts.push("</thread>".to_string());
        Ok(parts.join("\n"))
    }
}

/// Strings render bare, anything else as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How a thread is rendered for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThreadFormat {
    /// Compact tags, tool calls as YAML.
    #[default]
    Xml,
    /// Pretty-printed JSON.
    Json,
}

impl fmt::Display for ThreadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadFormat::Xml => write!(f, "XML"),
            ThreadFormat::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for ThreadFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(ThreadFormat::Xml),
            "json" => Ok(ThreadFormat::Json),
            other => Err(Error::config_error(format!(
                "unknown thread format '{}' (expected xml or json)",
                other
            ))),
        }
    }
}

/// The model's decision about what happens next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum NextStep {
    /// Final answer for the user.
    DoneForNow {
        /// Message shown to the user.
        message: String,
    },
    /// The model needs more information from the user.
    RequestMoreInformation {
        /// Question for the user.
        message: String,
    },
    /// `a + b`.
    Add {
        /// Left operand.
        a: f64,
        /// Right operand.
        b: f64,
    },
    /// `a - b`.
    Subtract {
        /// Left operand.
        a: f64,
        /// Right operand.
        b: f64,
    },
    /// `a * b`.
    Multiply {
        /// Left operand.
        a: f64,
        /// Right operand.
        b: f64,
    },
    /// `a / b`.
    Divide {
        /// Left operand.
        a: f64,
        /// Right operand.
        b: f64,
    },
}

/// An arithmetic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Addition.
    Add,
    /// Subtraction.
    Subtract,
    /// Multiplication.
    Multiply,
    /// Division.
    Divide,
}

/// A calculator tool call extracted from a [`NextStep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculatorTool {
    /// The operation.
    pub op: Operation,
    /// Left operand.
    pub a: f64,
    /// Right operand.
    pub b: f64,
}

impl NextStep {
    /// The calculator call, if this step is one.
    pub fn tool(&self) -> Option<CalculatorTool> {
        let (op, a, b) = match *self {
            NextStep::Add { a, b } => (Operation::Add, a, b),
            NextStep::Subtract { a, b } => (Operation::Subtract, a, b),
            NextStep::Multiply { a, b } => (Operation::Multiply, a, b),
            NextStep::Divide { a, b } => (Operation::Divide, a, b),
            NextStep::DoneForNow { .. } | NextStep::RequestMoreInformation { .. } => return None,
        };
        Some(CalculatorTool { op, a, b })
    }
}

impl CalculatorTool {
    /// Run the operation.
    ///
    /// # Errors
    ///
    /// Returns `Error::DivisionByZero` for a division by zero.
    pub fn execute(&self) -> Result<f64> {
        match self.op {
            Operation::Add => Ok(self.a + self.b),
            Operation::Subtract => Ok(self.a - self.b),
            Operation::Multiply => Ok(self.a * self.b),
            Operation::Divide if self.b == 0.0 => Err(Error::DivisionByZero),
            Operation::Divide => Ok(self.a / self.b),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Add => write!(f, "add"),
            Operation::Subtract => write!(f, "subtract"),
            Operation::Multiply => write!(f, "multiply"),
            Operation::Divide => write!(f, "divide"),
        }
    }
}

impl std::fmt::Display for CalculatorTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.op, self.a, self.b)
    }
}

/// Something that can decide the next step for a thread.
pub trait StepClient {
    /// Ask for the next step.
    fn determine_next_step(&self, thread: &Thread) -> Result<NextStep>;
}

/// A client that replays a fixed list of steps. Useful for tests and demos
/// without a model.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<NextStep>>,
    seen: Mutex<Vec<String>>,
    format: ThreadFormat,
}

impl ScriptedClient {
    /// Create a client that returns `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = NextStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
            format: ThreadFormat::default(),
        }
    }

    /// Record threads in `format` instead of the default.
    pub fn with_format(mut self, format: ThreadFormat) -> Self {
        self.format = format;
        self
    }

    /// The serialized threads this client was asked about, in order.
    pub fn seen_threads(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StepClient for ScriptedClient {
    fn determine_next_step(&self, thread: &Thread) -> Result<NextStep> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(thread.serialize(self.format)?);
        }
        self.steps
            .lock()
            .map_err(|_| Error::llm_error("scripted client poisoned"))?
            .pop_front()
            .ok_or_else(|| Error::llm_error("scripted client has no more steps"))
    }
}

/// Run the agent until the model is done.
///
/// Every model call counts as a turn. Each tool call appends one `tool_call`
/// event holding the tool name, the operation and its result. Clarification
/// requests append a `clarification_request` and a `clarification_response`.
///
/// # Errors
///
/// Returns `Error::TurnLimit` if the model has not finished after
/// `max_turns` calls, and propagates client and handler errors.
pub fn agent_loop<C, H>(
    client: &C,
    thread: &mut Thread,
    mut ask_human: H,
    max_turns: u32,
) -> Result<String>
where
    C: StepClient + ?Sized,
    H: FnMut(&str) -> Result<String>,
{
    for turn in 1..=max_turns {
        let next_step = client.determine_next_step(thread)?;
        tracing::debug!(turn, ?next_step, "next step");

        if let Some(tool) = next_step.tool() {
            let result = match tool.execute() {
                Ok(value) => number_value(value),
                Err(Error::DivisionByZero) => json!(DIVISION_BY_ZERO_RESULT),
                Err(e) => return Err(e),
            };
            tracing::info!("🔧 Calling tool: {} = {}", tool, display_value(&result));

            thread.push(
                "tool_call",
                json!({
                    "operation": tool.to_string(),
                    "result": result,
                    "tool": CALCULATOR_TOOL,
                }),
            );
            continue;
        }

        match next_step {
            NextStep::DoneForNow { message } => return Ok(message),
            NextStep::RequestMoreInformation { message } => {
                let answer = ask_human(&message)?;
                thread.push("clarification_request", message);
                thread.push("clarification_response", answer);
            }
            // Tool steps were handled above.
            _ => {}
        }
    }

    Err(Error::TurnLimit { max_turns })
}

/// Whole results are recorded as integers, `7` rather than `7.0`.
fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_human(_: &str) -> Result<String> {
        Err(Error::other("no human available"))
    }

    #[test]
    fn test_next_step_json_shape() {
        let step: NextStep = serde_json::from_str(r#"{"intent": "multiply", "a": 3, "b": 4}"#).unwrap();
        assert_eq!(step, NextStep::Multiply { a: 3.0, b: 4.0 });

        let step: NextStep =
            serde_json::from_str(r#"{"intent": "done_for_now", "message": "12"}"#).unwrap();
        assert_eq!(step.tool(), None);

        assert!(serde_json::from_str::<NextStep>(r#"{"intent": "sqrt", "a": 4}"#).is_err());
    }

    #[test]
    fn test_calculator_execute() {
        let tool = NextStep::Subtract { a: 10.0, b: 4.5 }.tool().unwrap();
        assert_eq!(tool.execute().unwrap(), 5.5);
        assert_eq!(tool.to_string(), "subtract(10, 4.5)");

        let tool = NextStep::Divide { a: 1.0, b: 0.0 }.tool().unwrap();
        assert!(matches!(tool.execute(), Err(Error::DivisionByZero)));

        let tool = NextStep::Divide { a: 9.0, b: 3.0 }.tool().unwrap();
        assert_eq!(tool.execute().unwrap(), 3.0);
    }

    fn calculator_thread() -> Thread {
        let mut thread = Thread::from_user_input("add 3 and 4");
        thread.push(
            "tool_call",
            json!({"tool": "calculator", "operation": "add(3, 4)", "result": 7}),
        );
        thread.push("clarification_request", "Anything else?");
        thread.push("clarification_response", "no");
        thread
    }

    #[test]
    fn test_thread_as_json() {
        let json = calculator_thread().serialize_as_json().unwrap();
        assert!(json.starts_with("[\n  {\n    \"type\": \"user_input\""));

        let parsed: Vec<ThreadEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, calculator_thread().events);
    }

    #[test]
    fn test_thread_as_xml() {
        let mut thread = calculator_thread();
        thread.push("debug_note", "not for the model");

        let xml = thread.serialize(ThreadFormat::Xml).unwrap();
        let lines: Vec<&str> = xml.lines().collect();
        assert_eq!(lines[0], "<thread>");
        assert_eq!(lines[1], "  <user_input>add 3 and 4</user_input>");
        assert_eq!(lines[2], "  <calculator>");
        assert!(lines[3].starts_with("    operation: "));
        assert!(lines[3].contains("add(3, 4)"));
        assert_eq!(lines[4], "    result: 7");
        assert_eq!(lines[5], "    tool: calculator");
        assert_eq!(lines[6], "  </calculator>");
        assert_eq!(lines[7], "  <clarification_request>Anything else?</clarification_request>");
        assert_eq!(lines[8], "  <clarification_response>no</clarification_response>");
        assert_eq!(lines[9], "</thread>");
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_thread_format_parse() {
        assert_eq!("xml".parse::<ThreadFormat>().unwrap(), ThreadFormat::Xml);
        assert_eq!("JSON".parse::<ThreadFormat>().unwrap(), ThreadFormat::Json);
        assert!(matches!(
            "yaml".parse::<ThreadFormat>(),
            Err(Error::ConfigError { .. })
        ));
        assert_eq!(ThreadFormat::default().to_string(), "XML");
    }

    #[test]
    fn test_loop_runs_tools_until_done() {
        let client = ScriptedClient::new(vec![
            NextStep::Add { a: 3.0, b: 4.0 },
            NextStep::Multiply { a: 7.0, b: 2.0 },
            NextStep::DoneForNow {
                message: "The answer is 14".to_string(),
            },
        ]);
        let mut thread = Thread::from_user_input("add 3 and 4, then double it");

        let answer = agent_loop(&client, &mut thread, no_human, 10).unwrap();
        assert_eq!(answer, "The answer is 14");

        let kinds: Vec<&str> = thread.events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["user_input", "tool_call", "tool_call"]);
        assert_eq!(
            thread.events[1].data,
            json!({"tool": "calculator", "operation": "add(3, 4)", "result": 7})
        );
        assert_eq!(
            thread.events[2].data,
            json!({"tool": "calculator", "operation": "multiply(7, 2)", "result": 14})
        );

        // The model saw the thread grow between calls.
        assert_eq!(client.seen_threads().len(), 3);
    }

    #[test]
    fn test_division_by_zero_is_reported_to_the_model() {
        let client = ScriptedClient::new(vec![
            NextStep::Divide { a: 1.0, b: 0.0 },
            NextStep::DoneForNow {
                message: "cannot divide by zero".to_string(),
            },
        ]);
        let mut thread = Thread::from_user_input("1/0");
        agent_loop(&client, &mut thread, no_human, 5).unwrap();
        assert_eq!(thread.events.len(), 2);
        assert_eq!(
            thread.events[1].data,
            json!({"tool": "calculator", "operation": "divide(1, 0)", "result": "Error: Division by zero"})
        );
    }

    #[test]
    fn test_fractional_results_stay_floats() {
        let client = ScriptedClient::new(vec![
            NextStep::Divide { a: 7.0, b: 2.0 },
            NextStep::DoneForNow {
                message: "3.5".to_string(),
            },
        ]);
        let mut thread = Thread::from_user_input("7/2");
        agent_loop(&client, &mut thread, no_human, 5).unwrap();
        assert_eq!(thread.events[1].data["result"], json!(3.5));
    }

    #[test]
    fn test_clarification_goes_to_human() {
        let client = ScriptedClient::new(vec![
            NextStep::RequestMoreInformation {
                message: "Which numbers?".to_string(),
            },
            NextStep::Multiply { a: 3.0, b: 4.0 },
            NextStep::DoneForNow {
                message: "12".to_string(),
            },
        ]);
        let mut thread = Thread::from_user_input("multiply some numbers");
        let mut asked = Vec::new();

        let answer = agent_loop(
            &client,
            &mut thread,
            |q: &str| {
                asked.push(q.to_string());
                Ok("I meant to multiply 3 and 4".to_string())
            },
            10,
        )
        .unwrap();

        assert_eq!(answer, "12");
        assert_eq!(asked, vec!["Which numbers?"]);
        assert_eq!(thread.events[1], ThreadEvent::new("clarification_request", "Which numbers?"));
        assert_eq!(
            thread.events[2],
            ThreadEvent::new("clarification_response", "I meant to multiply 3 and 4")
        );

        // The next model call saw the exchange.
        let seen = client.seen_threads();
        assert!(seen[1].contains("  <clarification_response>I meant to multiply 3 and 4</clarification_response>"));
    }

    #[test]
    fn test_turn_limit() {
        let client = ScriptedClient::new(vec![
            NextStep::Add { a: 1.0, b: 1.0 },
            NextStep::Add { a: 2.0, b: 2.0 },
            NextStep::Add { a: 3.0, b: 3.0 },
        ]);
        let mut thread = Thread::from_user_input("keep adding");
        let result = agent_loop(&client, &mut thread, no_human, 2);
        assert!(matches!(result, Err(Error::TurnLimit { max_turns: 2 })));
    }

    #[test]
    fn test_client_errors_propagate() {
        let client = ScriptedClient::new(vec![]);
        let mut thread = Thread::from_user_input("hi");
        let result = agent_loop(&client, &mut thread, no_human, 3);
        assert!(matches!(result, Err(Error::LlmError { .. })));
    }

    #[test]
    fn test_handler_errors_propagate() {
        let client = ScriptedClient::new(vec![NextStep::RequestMoreInformation {
            message: "?".to_string(),
        }]);
        let mut thread = Thread::from_user_input("hi");
        let result = agent_loop(&client, &mut thread, no_human, 3);
        assert!(matches!(result, Err(Error::Other { .. })));
    }
}
