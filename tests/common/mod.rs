//! Shared test doubles
//!
//! `FakeHost` is a scripted [`CommandHost`]: it records every command the
//! orchestrator issues, optionally failing commands matching a substring a
//! fixed number of times and answering canned stdout. This drives the
//! installer and the mount recovery manager through failure and escalation
//! paths without touching real devices.

// Not every test binary uses every helper.
#![allow(dead_code)]

use seedling::{CommandHost, CommandOutcome, CommandSpec, ExecMode, LogSink};
use std::sync::Mutex;

pub struct FakeHost {
    calls: Mutex<Vec<String>>,
    /// (needle, remaining failures) - commands containing `needle` fail
    /// until the counter runs out.
    failures: Mutex<Vec<(String, u32)>>,
    /// (needle, canned stdout) - first match wins.
    stdout: Vec<(String, String)>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            stdout: Vec::new(),
        }
    }

    /// Fail commands containing `needle` the next `times` times.
    pub fn with_failures(self, needle: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), times));
        self
    }

    /// Answer commands containing `needle` with `stdout`.
    pub fn with_stdout(mut self, needle: &str, stdout: &str) -> Self {
        self.stdout.push((needle.to_string(), stdout.to_string()));
        self
    }

    /// Every command issued so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Index of the first recorded command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.contains(needle))
    }

    /// Number of recorded commands containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHost for FakeHost {
    fn run(
        &self,
        spec: &CommandSpec,
        _mode: ExecMode,
        _sink: &dyn LogSink,
    ) -> seedling::Result<CommandOutcome> {
        let command = spec.to_string();
        self.calls.lock().unwrap().push(command.clone());

        let mut failures = self.failures.lock().unwrap();
        for (needle, remaining) in failures.iter_mut() {
            if command.contains(needle.as_str()) && *remaining > 0 {
                *remaining -= 1;
                return Ok(CommandOutcome {
                    success: false,
                    code: 32,
                    stdout: String::new(),
                    stderr: format!("{needle}: simulated failure"),
                });
            }
        }

        let stdout = self
            .stdout
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, canned)| canned.clone())
            .unwrap_or_default();

        Ok(CommandOutcome {
            success: true,
            code: 0,
            stdout,
            stderr: String::new(),
        })
    }
}
