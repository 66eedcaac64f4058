//! Error handling for seedling
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the library should use these types for consistency.
//!
//! The taxonomy mirrors the failure modes of an installation run:
//! `MissingDependency` and `Validation` fire before anything is mutated,
//! `CommandFailed` aborts a running phase, and `Phase` guards the
//! forward-only phase machine.

use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum InstallerError {
    /// IO errors (file operations, terminal, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required external tool is not installed on the live system
    #[error("missing required tool: {tool}")]
    MissingDependency { tool: String },

    /// An external command exited non-zero under `check` semantics.
    /// `code` is -1 when the process was terminated by a signal.
    #[error("command `{command}` exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Validation errors (malformed configuration, caught before a run starts)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file errors (loading, saving)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid phase transition (internal invariant of the orchestrator)
    #[error("Phase error: {0}")]
    Phase(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallerError>;

impl InstallerError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a phase transition error
    pub fn phase(msg: impl Into<String>) -> Self {
        Self::Phase(msg.into())
    }
}
