//! Pluggable external validation scripts.
//!
//! A script is any executable (or interpreter-backed file) that reads the
//! document on stdin and writes a result payload to stdout. Every failure
//! mode degrades to a warning so broken tooling never blocks a document.
//!
//! # Protocol
//! - stdin: the document content
//! - argv[1]: the document path
//! - env: `PDOCS_ROOT`, `PDOCS_DOC_TYPE`
//! - stdout: JSON (`{"errors": [...], "warnings": [...]}` or a list of
//!   `{"message", "severity", "line"}` issues). Anything else becomes one
//!   warning carrying the raw text.
//!
//! # Interpreter selection
//! `.py` → python3 / python, `.sh` → sh, `.js` / `.mjs` → node,
//! `.ts` → bun / deno / `npx tsx`; anything else is executed directly.

use crate::validate::ValidationIssue;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

pub const RULE_SCRIPT_MISSING: &str = "script-missing";
pub const RULE_SCRIPT_ERROR: &str = "script-error";
pub const RULE_SCRIPT_OUTPUT: &str = "script-output";
const RULE_SCRIPT_DEFAULT: &str = "script";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Input handed to a script run.
pub struct ScriptInput<'a> {
    pub content: &'a str,
    pub doc_path: &'a Path,
    pub doc_type: &'a str,
    pub root: &'a Path,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptOutcome {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ScriptOutcome {
    fn warning(issue: ValidationIssue) -> Self {
        Self {
            errors: Vec::new(),
            warnings: vec![issue],
        }
    }
}

pub trait ValidationScript {
    fn name(&self) -> String;
    fn run(&self, input: &ScriptInput<'_>) -> ScriptOutcome;
}

/// Used when a type has no scripts; contributes nothing.
pub struct NoScript;

impl ValidationScript for NoScript {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn run(&self, _input: &ScriptInput<'_>) -> ScriptOutcome {
        ScriptOutcome::default()
    }
}

/// A configured script whose file does not exist.
pub struct MissingScript {
    pub path: PathBuf,
}

impl ValidationScript for MissingScript {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn run(&self, _input: &ScriptInput<'_>) -> ScriptOutcome {
        ScriptOutcome::warning(ValidationIssue::new(
            RULE_SCRIPT_MISSING,
            format!("Validation script not found: {}", self.path.display()),
        ))
    }
}

/// A script run as a child process with a hard timeout.
pub struct ProcessScript {
    pub path: PathBuf,
    pub timeout: Duration,
}

/// Build the script list for a skill directory: absent files become
/// [`MissingScript`]s, present ones [`ProcessScript`]s.
pub fn load_scripts(
    skill_dir: &Path,
    scripts: &[String],
    timeout: Duration,
) -> Vec<Box<dyn ValidationScript>> {
    scripts
        .iter()
        .map(|rel| {
            let path = skill_dir.join(rel);
            if path.is_file() {
                Box::new(ProcessScript { path, timeout }) as Box<dyn ValidationScript>
            } else {
                Box::new(MissingScript { path })
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ProcessScript
// ---------------------------------------------------------------------------

fn interpreter_for(path: &Path) -> Option<Vec<String>> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let found = |bin: &str| which::which(bin).is_ok();
    let cmd: Vec<&str> = match ext.as_str() {
        "py" => {
            if found("python3") {
                vec!["python3"]
            } else {
                vec!["python"]
            }
        }
        "sh" => vec!["sh"],
        "js" | "mjs" | "cjs" => vec!["node"],
        "ts" => {
            if found("bun") {
                vec!["bun", "run"]
            } else if found("deno") {
                vec!["deno", "run", "--allow-read", "--allow-env"]
            } else {
                vec!["npx", "--yes", "tsx"]
            }
        }
        _ => return None,
    };
    Some(cmd.into_iter().map(String::from).collect())
}

fn build_command(script: &Path) -> Command {
    match interpreter_for(script) {
        Some(parts) => {
            let mut cmd = Command::new(&parts[0]);
            cmd.args(&parts[1..]);
            cmd.arg(script);
            cmd
        }
        None => Command::new(script),
    }
}

/// Wait for `child` up to `timeout`; kill it when the deadline passes.
/// Returns `None` on timeout.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

impl ProcessScript {
    fn error(&self, detail: impl std::fmt::Display) -> ScriptOutcome {
        tracing::warn!(script = %self.path.display(), %detail, "validation script failed");
        ScriptOutcome::warning(
            ValidationIssue::new(
                RULE_SCRIPT_ERROR,
                format!("Validation script {} failed: {detail}", self.path.display()),
            )
            .with_reference(self.path.display().to_string()),
        )
    }
}

impl ValidationScript for ProcessScript {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn run(&self, input: &ScriptInput<'_>) -> ScriptOutcome {
        let mut cmd = build_command(&self.path);
        cmd.arg(input.doc_path)
            .env("PDOCS_ROOT", input.root)
            .env("PDOCS_DOC_TYPE", input.doc_type)
            .current_dir(input.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return self.error(format!("could not start: {e}")),
        };

        // Feed stdin and drain pipes on helper threads so a chatty or
        // stdin-ignoring script cannot deadlock us.
        let stdin_thread = child.stdin.take().map(|mut stdin| {
            let data = input.content.as_bytes().to_vec();
            std::thread::spawn(move || {
                let _ = stdin.write_all(&data);
            })
        });
        let stdout_thread = child.stdout.take().map(|mut out| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_thread = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf);
                buf
            })
        });

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                return self.error(format!("timed out after {}s", self.timeout.as_secs()))
            }
            Err(e) => return self.error(e),
        };

        if let Some(t) = stdin_thread {
            let _ = t.join();
        }
        let stdout = stdout_thread
            .and_then(|t| t.join().ok())
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        let stderr = stderr_thread
            .and_then(|t| t.join().ok())
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();

        // A non-zero exit with a JSON payload is a normal "found problems"
        // result; without one it is a crash.
        if let Some(outcome) = parse_json_outcome(&stdout) {
            return outcome;
        }
        if !status.success() {
            let detail = [captured(&stderr), captured(&stdout)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("\n");
            let detail = if detail.is_empty() {
                format!("exited with {status}")
            } else {
                detail
            };
            return self.error(detail);
        }
        if stdout.trim().is_empty() {
            return ScriptOutcome::default();
        }
        ScriptOutcome::warning(
            ValidationIssue::new(RULE_SCRIPT_OUTPUT, stdout.trim().to_string())
                .with_reference(self.path.display().to_string()),
        )
    }
}

const MAX_CAPTURED_CHARS: usize = 4000;

/// Trimmed stream text, cut at [`MAX_CAPTURED_CHARS`]. `None` when blank.
fn captured(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut text: String = trimmed.chars().take(MAX_CAPTURED_CHARS).collect();
    if text.len() < trimmed.len() {
        text.push_str(" ...");
    }
    Some(text)
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Parse a script's stdout. `None` when it is not JSON of a known shape.
pub fn parse_json_outcome(stdout: &str) -> Option<ScriptOutcome> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    let mut outcome = ScriptOutcome::default();
    match value {
        Value::Object(map) => {
            if !map.contains_key("errors") && !map.contains_key("warnings") {
                return None;
            }
            for v in map.get("errors").and_then(Value::as_array).into_iter().flatten() {
                if let Some(issue) = issue_from_value(v) {
                    outcome.errors.push(issue);
                }
            }
            for v in map.get("warnings").and_then(Value::as_array).into_iter().flatten() {
                if let Some(issue) = issue_from_value(v) {
                    outcome.warnings.push(issue);
                }
            }
        }
        Value::Array(items) => {
            for v in &items {
                let Some(issue) = issue_from_value(v) else {
                    continue;
                };
                let severity = v.get("severity").and_then(Value::as_str).unwrap_or("error");
                if severity.eq_ignore_ascii_case("warning") || severity.eq_ignore_ascii_case("info") {
                    outcome.warnings.push(issue);
                } else {
                    outcome.errors.push(issue);
                }
            }
        }
        _ => return None,
    }
    Some(outcome)
}

fn issue_from_value(v: &Value) -> Option<ValidationIssue> {
    match v {
        Value::String(s) => Some(ValidationIssue::new(RULE_SCRIPT_DEFAULT, s.clone())),
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str)?;
            let rule = map
                .get("rule")
                .and_then(Value::as_str)
                .unwrap_or(RULE_SCRIPT_DEFAULT);
            let mut issue = ValidationIssue::new(rule, message);
            if let Some(line) = map.get("line").and_then(Value::as_u64) {
                issue = issue.at_line(line as usize);
            }
            if let Some(s) = map.get("suggestion").and_then(Value::as_str) {
                issue = issue.with_suggestion(s);
            }
            if let Some(r) = map.get("reference").and_then(Value::as_str) {
                issue = issue.with_reference(r);
            }
            Some(issue)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
