//! Error handling for askpass invocation
//!
//! This module provides the error types recorded while running an askpass
//! helper and while loading configuration, using the thiserror crate.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use thiserror::Error;

/// Captured output stream of the askpass helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure recorded while running an askpass helper
///
/// Every caller waiting on the same invocation receives a clone of the same
/// error, so io sources are shared behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum AskError {
    /// The interpreter could not be spawned
    #[error("failed to start askpass helper via {shell}: {source}")]
    Start {
        shell: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// The helper ran but reported failure
    #[error("askpass helper exited unsuccessfully: {status}")]
    Exit { status: ExitStatus },

    /// Waiting for the helper to exit failed
    #[error("failed to wait for askpass helper: {source}")]
    Wait {
        #[source]
        source: Arc<io::Error>,
    },

    /// Reading one of the captured streams failed, or its pipe was unavailable
    #[error("failed to read askpass {stream}: {source}")]
    StreamRead {
        stream: Stream,
        #[source]
        source: Arc<io::Error>,
    },
}

impl AskError {
    pub(crate) fn start(shell: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Start {
            shell: shell.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn wait(source: io::Error) -> Self {
        Self::Wait {
            source: Arc::new(source),
        }
    }

    pub(crate) fn stream_read(stream: Stream, source: io::Error) -> Self {
        Self::StreamRead {
            stream,
            source: Arc::new(source),
        }
    }

    /// Exit code of the helper, if it exited normally with a failure status
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { status } => status.code(),
            _ => None,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Start { .. } => vec![
                "Check that the configured shell exists and is executable",
                "Set PASSASK_SHELL or the `shell` config key to a valid interpreter",
            ],
            Self::Exit { .. } => vec![
                "Review the helper's diagnostic output above",
                "Run the askpass command by hand to reproduce the failure",
            ],
            Self::Wait { .. } => vec!["Check system process limits and retry"],
            Self::StreamRead { .. } => vec![
                "The helper's output could not be captured",
                "Check that the helper does not close its output early",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Start { .. } => "START_FAILED",
            Self::Exit { .. } => "EXIT_FAILED",
            Self::Wait { .. } => "WAIT_FAILED",
            Self::StreamRead {
                stream: Stream::Stdout,
                ..
            } => "STDOUT_READ_FAILED",
            Self::StreamRead {
                stream: Stream::Stderr,
                ..
            } => "STDERR_READ_FAILED",
        }
    }
}

/// Errors raised while loading configuration or resolving the askpass command
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse YAML config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Neither an explicit command nor any of the listed variables was set
    #[error("no askpass command configured (checked: {})", .checked.join(", "))]
    NoCommand { checked: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn failed_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn test_start_error() {
        let error = AskError::start(
            "/nonexistent/sh",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );

        assert_eq!(error.code(), "START_FAILED");
        assert!(error.to_string().contains("/nonexistent/sh"));
        assert!(error.exit_code().is_none());
        assert!(!error.suggested_actions().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_error_reports_code() {
        let error = AskError::Exit {
            status: failed_status(3),
        };

        assert_eq!(error.code(), "EXIT_FAILED");
        assert_eq!(error.exit_code(), Some(3));
    }

    #[test]
    fn test_stream_read_codes_are_distinct() {
        let stdout = AskError::stream_read(Stream::Stdout, io::Error::other("closed"));
        let stderr = AskError::stream_read(Stream::Stderr, io::Error::other("closed"));

        assert_eq!(stdout.code(), "STDOUT_READ_FAILED");
        assert_eq!(stderr.code(), "STDERR_READ_FAILED");
        assert!(stdout.to_string().contains("stdout"));
        assert!(stderr.to_string().contains("stderr"));
    }

    #[test]
    fn test_clone_shares_source() {
        let error = AskError::wait(io::Error::other("interrupted"));
        let cloned = error.clone();

        match (&error, &cloned) {
            (AskError::Wait { source: a }, AskError::Wait { source: b }) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected Wait errors"),
        }
    }

    #[test]
    fn test_no_command_lists_checked_vars() {
        let error = ConfigError::NoCommand {
            checked: vec!["SUDO_ASKPASS".to_string(), "GIT_ASKPASS".to_string()],
        };

        let display = error.to_string();
        assert!(display.contains("SUDO_ASKPASS, GIT_ASKPASS"));
    }
}
