use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the requested cache geometry or simulation mode. These are detected before any
/// trace is touched
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{cache} must have at least one entry")]
    ZeroCapacity { cache: &'static str },

    #[error("{cache} must have at least one way")]
    ZeroWays { cache: &'static str },

    #[error("{cache} has {ways} ways but only {capacity} entries")]
    WaysExceedCapacity { cache: &'static str, capacity: u32, ways: u32 },

    #[error("{cache} capacity {capacity} is not a multiple of its {ways} ways")]
    UnevenWays { cache: &'static str, capacity: u32, ways: u32 },

    #[error("unknown simulation mode '{0}', expected 0-3 or one of ntlb, pwc-ept, pwc-noept, full")]
    UnknownMode(String),
}

/// Failures while opening or reading a single trace file
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("couldn't open the trace file at path {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("couldn't memory map the trace file at path {}: {source}", path.display())]
    Map { path: PathBuf, source: io::Error },

    #[error("failed reading trace data: {0}")]
    Read(#[from] io::Error),
}

/// Failures of a whole batch. Any of these aborts the batch, a skipped file would shift every
/// later result
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("can't open trace directory {}: {source}", path.display())]
    Directory { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid trace name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{}: {source}", path.display())]
    Trace { path: PathBuf, source: TraceError },

    #[error("a simulation worker panicked")]
    WorkerPanicked,
}
