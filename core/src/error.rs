use std::{io, path::PathBuf};

/// Detected before any testcase runs. Aborts the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown compare mode '{0}' (expected one of: exact-match, crlf-insensitive-exact-match, ignore-spaces, ignore-spaces-and-newlines)")]
    UnknownCompareMode(String),

    #[error("Tolerance must be 0 or greater than 1e-28 (got {0:e})")]
    TooSmallTolerance(f64),

    #[error("Tolerance must be a finite non-negative number (got {0})")]
    InvalidTolerance(f64),

    #[error("Time limit must be positive (got {0}ms)")]
    InvalidTimeLimit(f64),

    #[error("Memory limit must be positive (got {0}MB)")]
    InvalidMemoryLimit(f64),

    #[error("Number of jobs must be at least 1")]
    ZeroJobs,

    #[error("Memory limit is set but memory measurement with '{0}' is unavailable")]
    MemoryMeasurementUnavailable(PathBuf),

    #[error("Invalid testcase filename format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },
}

/// A single testcase could not produce any judge result.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open input file '{0}': {1}")]
    OpenInput(PathBuf, #[source] io::Error),

    #[error("Failed to read expected output '{0}': {1}")]
    ReadExpected(PathBuf, #[source] io::Error),

    #[error("Failed to communicate with subprocess: {0}")]
    Communicate(#[source] io::Error),

    #[error("Failed to prepare temporary file: {0}")]
    TempFile(#[source] io::Error),

    #[error("Failed to run special judge '{command}': {source}")]
    SpecialJudge {
        command: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot list testcases: {0}")]
    Fs(#[from] fsutil::Error),

    #[error("Unrecognizable file found in testcase dir: '{0}' (expected extension 'in' or 'out')")]
    UnrecognizedFile(PathBuf),
}
