//! Error type shared by every fallible operation in the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a count run.
///
/// Source failures are not retried; they surface to the caller and end the
/// run. [`CountError::Interrupted`] is the one variant that is not a failure:
/// it reports that the user asked to stop during a sleep.
#[derive(Error, Debug)]
pub enum CountError {
    #[error("boinccmd not found at {}", .0.display())]
    CommandNotFound(PathBuf),

    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("BOINC client is not running ({0})")]
    ClientNotRunning(String),

    #[error("malformed boinccmd output: {0}")]
    Malformed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted by user")]
    Interrupted,
}

impl CountError {
    /// True when the run ended because the user asked it to.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, CountError>;
