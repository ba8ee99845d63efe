//! Command execution behind an injectable trait.
//!
//! Commands are argument vectors handed to the OS directly - values with
//! spaces or shell metacharacters need no quoting and cannot be
//! reinterpreted. [`SystemRunner`] spawns real processes;
//! [`ScriptedRunner`] replays canned output for tests.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::process::Command;
use std::sync::Mutex;
use thiserror::Error;

/// A command line: a program plus discrete arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    merge_stderr: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            merge_stderr: false,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Capture stderr into the output stream as well. Some subcommands
    /// write their listing or status text to stderr.
    pub fn merge_stderr(mut self) -> Self {
        self.merge_stderr = true;
        self
    }

    pub fn wants_stderr(&self) -> bool {
        self.merge_stderr
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Errors from running a command. Failures carry the command's own
/// output verbatim - no classification of why it failed.
#[derive(Debug, Error)]
pub enum RunError {
    /// The process could not be spawned at all (binary missing, etc.)
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited non-zero.
    #[error("command failed ({status}): {command}: {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    text: String,
}

impl Captured {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_text(String::from_utf8_lossy(bytes))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let mut text = text.into();
        while text.ends_with('\n') {
            text.pop();
        }
        Self { text }
    }

    /// The raw output with the trailing newline trimmed. Used for
    /// structured formats such as JSON where line splitting would be
    /// destructive.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Non-blank lines, each trimmed, in output order. Order is the
    /// output order and is meaningful for listings.
    pub fn lines(&self) -> Vec<String> {
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Executes commands. The single seam between reconciliation logic and
/// the system: production code uses [`SystemRunner`], tests script the
/// responses.
pub trait CommandRunner {
    fn run(&self, cmd: &Cmd) -> Result<Captured, RunError>;

    /// Run for the exit status only, discarding output.
    fn run_ok(&self, cmd: &Cmd) -> Result<(), RunError> {
        self.run(cmd).map(|_| ())
    }
}

/// Runs commands against the real system, one blocking process at a
/// time. No timeout is enforced: a hung command hangs the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<Captured, RunError> {
        let output = Command::new(cmd.program())
            .args(cmd.arguments())
            .output()
            .map_err(|source| RunError::Spawn {
                command: cmd.to_string(),
                source,
            })?;

        let mut captured = output.stdout;
        if cmd.wants_stderr() {
            captured.extend_from_slice(&output.stderr);
        }

        if !output.status.success() {
            let mut text = captured;
            if !cmd.wants_stderr() {
                text.extend_from_slice(&output.stderr);
            }
            return Err(RunError::CommandFailed {
                command: cmd.to_string(),
                status: output.status.to_string(),
                output: String::from_utf8_lossy(&text).trim().to_string(),
            });
        }

        Ok(Captured::from_bytes(&captured))
    }
}

type ScriptedResponse = Result<String, String>;

/// Test double that replays queued responses keyed by the rendered
/// command line. A command with no queued response fails loudly, so a
/// test that scripts only read commands also proves no mutating command
/// was issued.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for a command line.
    pub fn ok(self, command: &str, stdout: &str) -> Self {
        self.push(command, Ok(stdout.to_string()));
        self
    }

    /// Queue a non-zero exit for a command line.
    pub fn fail(self, command: &str, output: &str) -> Self {
        self.push(command, Err(output.to_string()));
        self
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock_or_recover(&self.calls).clone()
    }

    fn push(&self, command: &str, response: ScriptedResponse) {
        lock_or_recover(&self.responses)
            .entry(command.to_string())
            .or_default()
            .push_back(response);
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &Cmd) -> Result<Captured, RunError> {
        let key = cmd.to_string();
        lock_or_recover(&self.calls).push(key.clone());

        let response = lock_or_recover(&self.responses)
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match response {
            Some(Ok(stdout)) => Ok(Captured::from_text(stdout)),
            Some(Err(output)) => Err(RunError::CommandFailed {
                command: key,
                status: "exit status: 1".to_string(),
                output,
            }),
            None => Err(RunError::CommandFailed {
                command: key.clone(),
                status: "exit status: 127".to_string(),
                output: format!("no scripted response for: {key}"),
            }),
        }
    }
}
