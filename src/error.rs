use std::io;

use thiserror::Error;

/// Everything that can go wrong while handling one input line.
///
/// None of these end the shell; the dispatcher prints the diagnostic and
/// reads the next line.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A pipe or a process could not be created.
    #[error("{op} failed: {source}")]
    ResourceCreation {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// A child could not start its program (or open its redirect file).
    #[error("{program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },

    /// `kill(2)` refused to deliver the signal.
    #[error("kill {pid} failed: {source}")]
    SignalDelivery {
        pid: libc::pid_t,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl ShellError {
    pub fn resource(op: &'static str, source: io::Error) -> Self {
        ShellError::ResourceCreation { op, source }
    }
}

/// Commands rejected before any process is spawned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("{command}: missing process ID")]
    MissingArgument { command: String },

    #[error("{command}: invalid process ID: {arg}")]
    InvalidPid { command: String, arg: String },

    #[error("output redirection on left side of pipe forbidden")]
    OutputRedirectBeforePipe,

    #[error("input redirection on right side of pipe forbidden")]
    InputRedirectAfterPipe,

    #[error("only two-stage pipelines are supported")]
    TooManyStages,

    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),

    #[error("syntax error: missing command")]
    MissingCommand,

    #[error("syntax error: expected filename after '{0}'")]
    MissingRedirectTarget(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history is empty")]
    Empty,

    #[error("no such command in history (index {0})")]
    NoSuchEntry(usize),

    #[error("{0}: invalid history index")]
    InvalidIndex(String),
}
