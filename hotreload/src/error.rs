//! Error types for the hot-reloader.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by a [`Loader`](crate::loader::Loader).
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A manifest file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest document could not be decoded.
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// A watch on a manifest directory could not be installed.
    #[error("failed to watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    /// The source of truth is not reachable right now.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by a [`Processor`](crate::processor::Processor).
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("failed to init {name}: {reason}")]
    Init { name: String, reason: String },

    #[error("failed to close {name}: {reason}")]
    Close { name: String, reason: String },
}

/// Fatal reconciler errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The push stream for a resource kind could not be established.
    #[error("error running {kind} stream: {source}")]
    Stream {
        kind: &'static str,
        #[source]
        source: LoaderError,
    },
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;
