//! Classified error taxonomy for resolution and staging.
//!
//! Per-dependency misses are *not* errors — they are collected as
//! [`UnresolvedDependency`](crate::search::UnresolvedDependency) records and
//! reported alongside the result. Everything here is a failure that stops at
//! least one node or one copy entry.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("cannot read '{path}': {source}")]
    NotReadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unrecognized binary format in '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("no introspection backend available for {format} (looked for: {tools})")]
    NoBackendAvailable { format: String, tools: String },

    #[error("tool '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("tool '{tool}' timed out after {timeout:?}")]
    ToolTimedOut { tool: String, timeout: Duration },

    #[error("tool '{tool}' terminated abnormally (signal: {signal:?})")]
    ToolCrashed { tool: String, signal: Option<i32> },

    #[error("tool '{tool}' exited with status {exit_code}: {excerpt}")]
    ToolReportedError {
        tool: String,
        exit_code: i32,
        excerpt: String,
    },

    #[error("no dependency records could be extracted from {tool} output for '{path}'")]
    UnparsableOutput { tool: String, path: PathBuf },

    #[error("cannot create directory '{path}': {reason}")]
    DirectoryCreateFailed { path: PathBuf, reason: String },

    #[error("copy failed for '{src}' -> '{dest}': {source}")]
    CopyIo {
        src: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },

    #[error("checksum mismatch after copying '{src}' to '{dest}'")]
    VerificationMismatch { src: PathBuf, dest: PathBuf },

    #[error("duplicate destination name '{name}' in copy plan")]
    DuplicateDestination { name: String },

    #[error("invalid config '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
