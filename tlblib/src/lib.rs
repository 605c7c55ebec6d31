//! # TLBLib
//!
//! TLBLib replays recorded nested page walks against simulated translation caches
//!
//! It provides a generic set-associative LRU cache, four simulated hardware designs built from it
//! (a nested TLB, a page walk cache with and without extended paging, and both combined), a reader
//! for the binary trace format, and a batch runner which simulates a directory of traces
//!
//! The cache models reproduce a fixed accounting of nested paging hardware, including the quirks
//! of its LRU victim search, so hit ratios and memory access counts stay comparable between runs
//! and configurations

/// Contains the set-associative cache shared by every simulated design
pub mod cache;

/// Contains the cache geometry and simulation mode configuration
pub mod config;

/// Contains the error types for configuration, trace, and batch failures
pub mod error;

/// Contains helpers to open trace files for sequential reading
pub mod io;

/// Contains the trace record format and a streaming reader
pub mod trace;

/// Contains the simulated designs, and the simulator used to run them over traces
pub mod simulator;

/// Contains trace discovery and the batch runner
pub mod batch;

#[cfg(test)]
mod test;
