//! Command execution layer
//!
//! This is the ONLY sanctioned way for the orchestrator to reach the OS.
//! A [`CommandSpec`] preserves the caller's choice between a literal argument
//! vector and a shell line - an argument vector is never re-split. Execution
//! either captures the combined output for programmatic use (reading a
//! PARTUUID) or streams it line-by-line to a [`LogSink`] as it is produced.
//!
//! # Simulation mode
//!
//! A simulated [`Runner`] short-circuits before spawning anything: it emits
//! one sink line of the form `[DRY RUN] Would execute: <command>` and returns
//! a synthetic success. No filesystem or device state changes.
//!
//! # Secrets
//!
//! Secrets ride in environment variables attached to the spec, never in the
//! argument vector, and a spec can carry a display override so neither the
//! dry-run line nor a `CommandFailed` message ever reproduces them.

use crate::error::{InstallerError, Result};
use crate::sink::LogSink;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use tracing::debug;

/// How a command's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Block, buffer stdout/stderr, return them for inspection.
    Capture,
    /// Spawn, forward each output line to the sink in arrival order,
    /// return only the final status.
    Stream,
}

#[derive(Debug, Clone)]
enum SpecKind {
    /// Literal argument vector, executed directly.
    Argv(Vec<String>),
    /// A shell line, executed via `sh -c`.
    Shell(String),
}

/// A command to execute, plus its environment and display form.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    kind: SpecKind,
    env: Vec<(String, String)>,
    display: Option<String>,
}

impl CommandSpec {
    /// A literal argument vector. The first element is the program.
    pub fn argv<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: SpecKind::Argv(parts.into_iter().map(Into::into).collect()),
            env: Vec::new(),
            display: None,
        }
    }

    /// A shell line, run through `sh -c`.
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            kind: SpecKind::Shell(line.into()),
            env: Vec::new(),
            display: None,
        }
    }

    /// Attach an environment variable. Secrets go here, never in argv.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Override the display form used in sink lines and error messages.
    pub fn display_as(mut self, text: impl Into<String>) -> Self {
        self.display = Some(text.into());
        self
    }

    fn build(&self) -> Result<Command> {
        let mut cmd = match &self.kind {
            SpecKind::Argv(parts) => {
                let (program, args) = parts.split_first().ok_or_else(|| {
                    InstallerError::config("empty argument vector in command spec")
                })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            SpecKind::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
        };
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        Ok(cmd)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(display) = &self.display {
            return write!(f, "{display}");
        }
        match &self.kind {
            SpecKind::Argv(parts) => write!(f, "{}", parts.join(" ")),
            SpecKind::Shell(line) => write!(f, "{line}"),
        }
    }
}

/// The result of executing a command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code (-1 if terminated by signal).
    pub code: i32,
    /// Captured stdout (empty when streamed).
    pub stdout: String,
    /// Captured stderr (empty when streamed).
    pub stderr: String,
}

impl CommandOutcome {
    /// The synthetic success returned by simulation mode.
    pub fn simulated() -> Self {
        Self {
            success: true,
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// The seam between the orchestrator and the OS.
///
/// Production code uses [`Runner`]; tests substitute a scripted fake to drive
/// the orchestrator through failure and recovery paths without touching real
/// devices.
pub trait CommandHost {
    /// Execute `spec`. Streamed output (and the dry-run line, in simulation
    /// mode) goes to `sink`; captured output is returned in the outcome.
    fn run(&self, spec: &CommandSpec, mode: ExecMode, sink: &dyn LogSink) -> Result<CommandOutcome>;

    /// Execute under `check` semantics: a non-zero exit becomes
    /// [`InstallerError::CommandFailed`] before any dependent step can run.
    fn run_checked(
        &self,
        spec: &CommandSpec,
        mode: ExecMode,
        sink: &dyn LogSink,
    ) -> Result<CommandOutcome> {
        let outcome = self.run(spec, mode, sink)?;
        if outcome.success {
            Ok(outcome)
        } else {
            Err(InstallerError::CommandFailed {
                command: spec.to_string(),
                code: outcome.code,
                stderr: outcome.stderr.trim().to_string(),
            })
        }
    }

    /// Checked capture, returning trimmed stdout.
    fn capture(&self, spec: &CommandSpec, sink: &dyn LogSink) -> Result<String> {
        self.run_checked(spec, ExecMode::Capture, sink)
            .map(|outcome| outcome.stdout.trim().to_string())
    }

    /// Checked streaming execution.
    fn stream_checked(&self, spec: &CommandSpec, sink: &dyn LogSink) -> Result<()> {
        self.run_checked(spec, ExecMode::Stream, sink).map(|_| ())
    }
}

/// Real command execution against the host OS.
///
/// A thin, fully synchronous wrapper: no retries, no special process
/// isolation. Long-running work belongs on the orchestration worker thread,
/// which may block freely.
pub struct Runner {
    dry_run: bool,
}

impl Runner {
    /// A runner that really executes commands.
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    /// A runner in simulation mode: narrates, never spawns.
    pub fn simulated() -> Self {
        Self { dry_run: true }
    }

    pub fn with_dry_run(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHost for Runner {
    fn run(&self, spec: &CommandSpec, mode: ExecMode, sink: &dyn LogSink) -> Result<CommandOutcome> {
        if self.dry_run {
            sink.line(&format!("[DRY RUN] Would execute: {spec}"));
            return Ok(CommandOutcome::simulated());
        }

        debug!(command = %spec, ?mode, "executing");
        let mut cmd = spec.build()?;
        cmd.stdin(Stdio::null());

        match mode {
            ExecMode::Capture => {
                let output = cmd.output()?;
                Ok(CommandOutcome {
                    success: output.status.success(),
                    code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            ExecMode::Stream => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                let mut child = cmd.spawn()?;
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();

                std::thread::scope(|scope| {
                    if let Some(out) = stdout {
                        scope.spawn(move || forward_lines(out, sink));
                    }
                    if let Some(err) = stderr {
                        scope.spawn(move || forward_lines(err, sink));
                    }
                });

                let status = child.wait()?;
                Ok(CommandOutcome {
                    success: status.success(),
                    code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }
}

fn forward_lines<R: Read>(reader: R, sink: &dyn LogSink) {
    for line in BufReader::new(reader).lines().map_while(std::result::Result::ok) {
        sink.line(&line);
    }
}
