//! Fixed cell bodies emitted by the notebook generator.
//!
//! The Python helpers here run inside the generated notebook (locally or on
//! Google Colab). They are kept as plain text so the generated cells match
//! what workshop attendees see.

/// Explanation shown above the BAML setup cells.
pub const BAML_SETUP_EXPLANATION: &str = "### BAML Setup

Don't worry too much about this setup code - it will make sense later! For now, just know that:
- BAML is a tool for working with language models
- We need some special setup code to make it work nicely in Google Colab
- The `get_baml_client()` function will be used to interact with AI models";

/// Install cell for the pinned `baml-py` version.
pub fn baml_install(version: &str) -> String {
    format!("!pip install baml-py=={} pydantic", version)
}

/// Defines `baml_generate()` and `get_baml_client()`.
///
/// `get_baml_client()` drops every cached `baml_client` module before
/// importing, so regenerated clients are picked up without a kernel restart.
pub const BAML_CLIENT_HELPERS: &str = r#"import subprocess
import os

# Try to import Google Colab userdata, but don't fail if not in Colab
try:
    from google.colab import userdata
    IN_COLAB = True
except ImportError:
    IN_COLAB = False

def baml_generate():
    try:
        result = subprocess.run(
            ["baml-cli", "generate"],
            check=True,
            capture_output=True,
            text=True
        )
        if result.stdout:
            print("[baml-cli generate]\n", result.stdout)
        if result.stderr:
            print("[baml-cli generate]\n", result.stderr)
    except subprocess.CalledProcessError as e:
        msg = (
            f"`baml-cli generate` failed with exit code {e.returncode}\n"
            f"--- STDOUT ---\n{e.stdout}\n"
            f"--- STDERR ---\n{e.stderr}"
        )
        raise RuntimeError(msg) from None

def get_baml_client():
    """
    a bunch of fun jank to work around the google colab import cache
    """
    # Set API key from Colab secrets or environment
    if IN_COLAB:
        os.environ['OPENAI_API_KEY'] = userdata.get('OPENAI_API_KEY')
    elif 'OPENAI_API_KEY' not in os.environ:
        print("Warning: OPENAI_API_KEY not set. Please set it in your environment.")

    baml_generate()

    # Force delete all baml_client modules from sys.modules
    import sys
    modules_to_delete = [key for key in sys.modules.keys() if key.startswith('baml_client')]
    for module in modules_to_delete:
        del sys.modules[module]

    # Now import fresh
    import baml_client
    return baml_client.sync_client.b
"#;

/// Initializes a BAML project in the notebook's working directory.
pub const BAML_INIT: &str = "!baml-cli init";

/// Regenerates the BAML client before a `main()` call.
pub const BAML_GENERATE_CALL: &str = "baml_generate()";

/// Name of the helper that captures logs and prints them after the call.
pub const LOG_CAPTURE_HELPER: &str = "run_with_baml_logs";

/// Name of the helper that extracts `<reasoning>` blocks from the logs.
pub const REASONING_HELPER: &str = "run_and_show_reasoning";

/// Defines `run_with_baml_logs` and `run_with_baml_logs_redirect`.
pub const LOG_CAPTURE_HELPERS: &str = r#"# Helper function to capture BAML logs in notebook output
import os
import sys
from IPython.utils.capture import capture_output
import contextlib

def run_with_baml_logs(func, *args, **kwargs):
    """Run a function and capture BAML logs in the notebook output."""
    # Ensure BAML_LOG is set
    if 'BAML_LOG' not in os.environ:
        os.environ['BAML_LOG'] = 'info'

    print(f"Running with BAML_LOG={os.environ.get('BAML_LOG')}...")

    # Capture both stdout and stderr
    with capture_output() as captured:
        result = func(*args, **kwargs)

    # Display the result first
    if result is not None:
        print("=== Result ===")
        print(result)

    # Display captured stdout if any
    if captured.stdout:
        print("\n=== Output ===")
        print(captured.stdout)

    # Display BAML logs from stderr
    if captured.stderr:
        print("\n=== BAML Logs ===")
        log_lines = captured.stderr.strip().split('\n')
        for line in log_lines:
            if 'reasoning' in line.lower() or '<reasoning>' in line:
                print(f"🤔 {line}")
            elif 'error' in line.lower():
                print(f"❌ {line}")
            elif 'warn' in line.lower():
                print(f"⚠️  {line}")
            else:
                print(f"   {line}")

    return result

@contextlib.contextmanager
def redirect_stderr_to_stdout():
    """Context manager to redirect stderr to stdout."""
    old_stderr = sys.stderr
    sys.stderr = sys.stdout
    try:
        yield
    finally:
        sys.stderr = old_stderr

def run_with_baml_logs_redirect(func, *args, **kwargs):
    """Run a function with stderr redirected to stdout for immediate display."""
    if 'BAML_LOG' not in os.environ:
        os.environ['BAML_LOG'] = 'info'

    print(f"Running with BAML_LOG={os.environ.get('BAML_LOG')} (stderr→stdout)...")

    with redirect_stderr_to_stdout():
        result = func(*args, **kwargs)

    if result is not None:
        print("\n=== Result ===")
        print(result)

    return result

# Set BAML log level (options: error, warn, info, debug, trace)
os.environ['BAML_LOG'] = 'info'
print("BAML logging helpers loaded!")
print("- Use run_with_baml_logs() to capture and display logs after execution")
print("- Use run_with_baml_logs_redirect() to see logs in real-time as they're generated")
"#;

/// Defines `run_and_show_reasoning`, used by sections about model reasoning.
pub const REASONING_HELPERS: &str = r#"# Special logging setup for reasoning visualization
import os
import re
from IPython.utils.capture import capture_output
from IPython.display import display, HTML

os.environ['BAML_LOG'] = 'info'

def run_and_show_reasoning(func, *args, **kwargs):
    """Run a function and highlight the reasoning steps from BAML logs."""
    with capture_output() as captured:
        result = func(*args, **kwargs)

    if captured.stderr:
        log_text = captured.stderr

        reasoning_matches = re.findall(r'<reasoning>(.*?)</reasoning>', log_text, re.DOTALL)

        if reasoning_matches:
            display(HTML("<h3>🧠 Model Reasoning:</h3>"))
            for reasoning in reasoning_matches:
                body = reasoning.strip().replace('\n', '<br>')
                display(HTML(
                    "<div style='background-color: #f0f8ff; border-left: 4px solid #4169e1; "
                    "padding: 10px; margin: 10px 0; font-family: monospace;'>" + body + "</div>"
                ))

        display(HTML("<h3>📤 Response:</h3>"))
        display(HTML(f"<pre>{str(result)}</pre>"))

        if os.environ.get('SHOW_FULL_LOGS', 'false').lower() == 'true':
            display(HTML("<details><summary>View Full BAML Logs</summary><pre style='font-size: 0.8em;'>"
                         + log_text + "</pre></details>"))

    return result

print("Enhanced reasoning visualization loaded! Use run_and_show_reasoning(main, 'your message') to see reasoning steps.")
"#;

/// Markdown cell shown in place of a file that could not be found.
pub fn missing_file(src: &str) -> String {
    format!("**Error: File not found: {}**", src)
}

/// Markdown cell shown in place of a file that exists but could not be read.
pub fn unreadable_file(src: &str, reason: &str) -> String {
    format!("**Error: Could not read {}: {}**", src, reason)
}

/// Embedded file cell: the source path as a comment, then the content.
pub fn embedded_file(src: &str, content: &str) -> String {
    format!("# {}\n{}", src, content)
}

/// Shell cell that downloads a file and prints it.
pub fn fetch_file(url: &str, dest: &str) -> String {
    format!("!curl -fsSL -o {dest} {url} && cat {dest}")
}

/// Shell cell that creates a directory.
pub fn make_dir(path: &str) -> String {
    format!("!mkdir -p {}", path)
}

/// Notebook shell command: trimmed and prefixed with `!` if needed.
pub fn shell_command(command: &str) -> String {
    let command = command.trim();
    if command.starts_with('!') {
        command.to_string()
    } else {
        format!("!{}", command)
    }
}

/// A direct `main(...)` call.
pub fn main_call(args: &[String]) -> String {
    format!("main({})", args.join(", "))
}

/// A `main` call routed through a logging helper.
pub fn wrapped_main_call(helper: &str, args: &[String]) -> String {
    if args.is_empty() {
        format!("{}(main)", helper)
    } else {
        format!("{}(main, {})", helper, args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_command_prefix() {
        assert_eq!(shell_command("  ls -la \n"), "!ls -la");
        assert_eq!(shell_command("!ls"), "!ls");
    }

    #[test]
    fn test_main_calls() {
        assert_eq!(main_call(&[]), "main()");
        let args = vec!["\"hi\"".to_string(), "n=2".to_string()];
        assert_eq!(main_call(&args), "main(\"hi\", n=2)");
        assert_eq!(
            wrapped_main_call(LOG_CAPTURE_HELPER, &[]),
            "run_with_baml_logs(main)"
        );
        assert_eq!(
            wrapped_main_call(REASONING_HELPER, &args),
            "run_and_show_reasoning(main, \"hi\", n=2)"
        );
    }

    #[test]
    fn test_helper_cells_define_their_functions() {
        assert!(LOG_CAPTURE_HELPERS.contains("def run_with_baml_logs("));
        assert!(LOG_CAPTURE_HELPERS.contains("def run_with_baml_logs_redirect("));
        assert!(REASONING_HELPERS.contains("def run_and_show_reasoning("));
        assert!(BAML_CLIENT_HELPERS.contains("def get_baml_client():"));
        assert_eq!(baml_install("1.2.3"), "!pip install baml-py==1.2.3 pydantic");
    }

    #[test]
    fn test_fetch_and_dir_cells() {
        assert_eq!(
            fetch_file("https://x.test/a.baml", "baml_src/a.baml"),
            "!curl -fsSL -o baml_src/a.baml https://x.test/a.baml && cat baml_src/a.baml"
        );
        assert_eq!(make_dir("baml_src"), "!mkdir -p baml_src");
        assert_eq!(embedded_file("./a.py", "x = 1\n"), "# ./a.py\nx = 1\n");
        assert_eq!(missing_file("./a.py"), "**Error: File not found: ./a.py**");
        assert_eq!(
            unreadable_file("./a.py", "Is a directory"),
            "**Error: Could not read ./a.py: Is a directory**"
        );
    }
}
