//! Error types for loading inputs and writing outputs.
//!
//! Problems in the declaration graph itself are not errors: they are
//! [`Diagnostic`](crate::Diagnostic)s accumulated against the compile.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading the graph or the options file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// Failures of the host collaborator (file system or in-memory).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort an emission run.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("failed to serialize document for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EmitError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EmitError::Host(_) => 3,
            EmitError::Serialize { .. } => 2,
        }
    }
}
