//! Error types for `Phantasm`
//!
//! One `thiserror` enum per concern, aggregated into [`PhantasmError`] for the
//! binary and the administrative surface. Effect dispatch never surfaces these
//! to the tick driver; it reports a [`TriggerOutcome`](crate::dispatch::TriggerOutcome)
//! instead.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `phantasm` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, invalid value)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Scheduler or driver failure
    pub const SCHEDULER_ERROR: i32 = 5;

    /// Usage error (invalid arguments, unknown effect key)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Phantasm` operations.
///
/// Aggregates all domain-specific errors and maps them onto exit codes.
#[derive(Debug, Error)]
pub enum PhantasmError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Effect precondition or execution error
    #[error(transparent)]
    Effect(#[from] EffectError),

    /// Render channel error
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Scheduler or driver error
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PhantasmError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Scheduler(_) => ExitCode::SCHEDULER_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Effect(_) | Self::Channel(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Channel Errors
// ============================================================================

/// Errors reported by a [`RenderChannel`](crate::channel::RenderChannel).
///
/// The engine logs these and never retries; despawn bookkeeping proceeds
/// regardless of delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The viewer is no longer reachable
    #[error("viewer {0} is not connected")]
    ViewerGone(String),

    /// The transport rejected the send
    #[error("send rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// Effect Errors
// ============================================================================

/// Errors raised by an effect's precondition check or execution.
#[derive(Debug, Error)]
pub enum EffectError {
    /// The owning actor could not be resolved in the world
    #[error("actor {0} is not available")]
    ActorUnavailable(String),

    /// Execution failed after preconditions passed
    #[error("effect execution failed: {0}")]
    ExecutionFailed(String),

    /// A phantom of this family is already active for the actor
    #[error("a {family} phantom is already active for actor {actor}")]
    AlreadyActive {
        /// Phantom family name
        family: &'static str,
        /// Owning actor
        actor: String,
    },

    /// A render call failed
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

// ============================================================================
// Scheduler Errors
// ============================================================================

/// Driver task errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The driver task panicked or was aborted
    #[error("driver task failed: {0}")]
    DriverFailed(String),

    /// The driver was started twice
    #[error("driver already running")]
    AlreadyRunning,

    /// The engine was shut down and cannot be started again
    #[error("engine has been shut down")]
    ShutDown,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `Phantasm` operations.
pub type Result<T> = std::result::Result<T, PhantasmError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::SCHEDULER_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: PhantasmError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_scheduler_error_exit_code() {
        let err: PhantasmError = SchedulerError::AlreadyRunning.into();
        assert_eq!(err.exit_code(), ExitCode::SCHEDULER_ERROR);
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = PhantasmError::Usage("unknown effect".to_string());
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: PhantasmError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_channel_error_converts_into_effect_error() {
        let err: EffectError = ChannelError::Rejected("closed".to_string()).into();
        assert!(matches!(err, EffectError::Channel(_)));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("config.yaml"),
            line: Some(42),
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("config.yaml"));
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_already_active_display() {
        let err = EffectError::AlreadyActive {
            family: "stalker",
            actor: "a1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "a stalker phantom is already active for actor a1"
        );
    }
}
