use std::fmt;
use std::time::Duration;

/// Structured error type for docker / docker-compose subprocesses.
#[derive(Debug)]
pub enum ComposeError {
    /// Command did not finish within its timeout.
    Timeout { command: String, timeout: Duration },

    /// Command ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Binary couldn't be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// Neither `docker compose` nor `docker-compose` is installed.
    ComposeNotFound,
}

impl ComposeError {
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        ComposeError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Create a command-failed error from an `std::process::Output`.
    pub fn failed(cmd: impl Into<String>, output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        ComposeError::CommandFailed {
            command: cmd.into(),
            stderr,
            exit_code: output.status.code(),
        }
    }

    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        ComposeError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Timeout { command, timeout } => {
                write!(
                    f,
                    "Timed out running '{}' (exceeded {} seconds)",
                    command,
                    timeout.as_secs()
                )
            }
            ComposeError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            ComposeError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
            ComposeError::ComposeNotFound => write!(
                f,
                "Neither 'docker compose' (v2) nor 'docker-compose' (v1) found. Please install Docker Compose."
            ),
        }
    }
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComposeError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
