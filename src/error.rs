//! Typed failures for the polling engine.
//!
//! None of these abort a run once polling has started: transport and line
//! errors cost at most one cycle's data for one node, export errors cost one
//! file. Only [`DiscoveryError`] stops a run, and it does so before any cycle.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("bad discovery command {0:?}")]
    BadCommand(String),
    #[error("failed to run discovery command {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("discovery command {command:?} exited with {status}")]
    Status { command: String, status: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to start {program:?} for {node}: {source}")]
    Spawn {
        program: String,
        node: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {node} failed: {stderr}")]
    Connection { node: String, stderr: String },
    #[error("remote command on {node} terminated by signal")]
    Killed { node: String },
    #[error("remote command on {node} timed out after {timeout:?}")]
    Timeout { node: String, timeout: Duration },
}

/// Why a single line of process-table output was not turned into a sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    #[error("expected 5 fields, found {0}")]
    TooFewFields(usize),
    #[error("invalid {field} {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("command {0:?} does not contain the process name")]
    NameMismatch(String),
}

impl LineError {
    /// Mismatched names are expected noise from a loose remote filter, not
    /// malformed output.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, LineError::NameMismatch(_))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot create {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot flush {path:?}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
