use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::config::SimulationConfig;
use crate::error::{BatchError, TraceError};
use crate::simulator::{SimulationResult, Simulator};
use crate::trace::TraceReader;

/// Every trace file name starts with this
pub const TRACE_PREFIX: &str = "trace_";

/// Most trace files simulated in one batch
pub const MAX_TRACE_FILES: usize = 128;

/// Selects trace files recorded with a given primary TLB
///
/// The tracer names files `trace_<timestamp>_<size>.<ways>`, a file matches if it has the prefix and
/// contains the `_<size>.<ways>` fragment anywhere in its name
#[derive(Debug, Clone)]
pub struct TraceFilter {
    suffix: Regex,
}

impl TraceFilter {
    pub fn new(config: &SimulationConfig) -> Result<Self, BatchError> {
        Ok(Self {
            suffix: Regex::new(&regex::escape(&config.trace_suffix()))?,
        })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(TRACE_PREFIX) && self.suffix.is_match(file_name)
    }
}

/// The trace files of one batch, in the order they are simulated and reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceCorpus {
    paths: Vec<PathBuf>,
}

impl TraceCorpus {
    /// Collects the matching traces in a directory
    ///
    /// Names are sorted bytewise, so the order doesn't depend on how the file system lists the
    /// directory. Only the first [`MAX_TRACE_FILES`] names after sorting are kept
    ///
    /// # Arguments
    ///
    /// * `dir`: The directory to scan, it is not searched recursively
    /// * `config`: Supplies the primary TLB size and associativity the traces were recorded with
    ///
    /// returns: Result<TraceCorpus, BatchError>
    pub fn discover(dir: impl AsRef<Path>, config: &SimulationConfig) -> Result<Self, BatchError> {
        let dir = dir.as_ref();
        let directory_error = |source: std::io::Error| BatchError::Directory { path: dir.to_path_buf(), source };
        let filter = TraceFilter::new(config)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(directory_error)? {
            let name = entry.map_err(directory_error)?.file_name();
            if name.to_str().map_or(false, |n| filter.matches(n)) {
                names.push(name);
            }
        }
        names.sort();
        if names.len() > MAX_TRACE_FILES {
            info!("Found {} traces in {}, only the first {MAX_TRACE_FILES} are used", names.len(), dir.display());
            names.truncate(MAX_TRACE_FILES);
        }
        Ok(Self {
            paths: names.into_iter().map(|name| dir.join(name)).collect(),
        })
    }

    /// Uses the given paths as they are, in the given order
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// The result for one trace of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    pub trace: PathBuf,
    #[serde(flatten)]
    pub result: SimulationResult,
}

/// Simulates every trace of the corpus in order, one after the other
///
/// All caches are flushed and the recency clock restarted before each trace, results never depend
/// on which traces came before. The first trace that can't be read aborts the batch
///
/// # Arguments
///
/// * `config`: Cache sizes and the simulated design
/// * `corpus`: The traces to simulate
///
/// returns: Result<Vec<TraceResult>, BatchError>
pub fn run(config: &SimulationConfig, corpus: &TraceCorpus) -> Result<Vec<TraceResult>, BatchError> {
    run_inspect(config, corpus, |_, _| {})
}

/// Like [`run`], additionally handing each result to `inspect` together with the simulator state
/// it was produced from, before the simulator is reset for the next trace
pub fn run_inspect<F>(config: &SimulationConfig, corpus: &TraceCorpus, mut inspect: F) -> Result<Vec<TraceResult>, BatchError>
where
    F: FnMut(&TraceResult, &Simulator),
{
    let mut simulator = Simulator::new(config)?;
    info!("Simulating {} traces with {}", corpus.len(), simulator.mode());
    let mut results = Vec::with_capacity(corpus.len());
    for path in corpus.paths() {
        let result = run_trace(&mut simulator, path)?;
        inspect(&result, &simulator);
        results.push(result);
    }
    Ok(results)
}

/// Like [`run`], but spreads the traces over up to `workers` threads
///
/// Every worker owns its own simulator, so the results are identical to a sequential run and are
/// returned in corpus order. If several traces can't be read, the error is the one for the trace
/// earliest in the corpus
pub fn run_parallel(config: &SimulationConfig, corpus: &TraceCorpus, workers: usize) -> Result<Vec<TraceResult>, BatchError> {
    config.validate()?;
    let paths = corpus.paths();
    let workers = workers.clamp(1, paths.len().max(1));
    info!("Simulating {} traces with {} on {workers} threads", paths.len(), config.mode);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                // Each worker stops at its first failure, which is its lowest failing index
                scope.spawn(move || -> Result<Vec<(usize, TraceResult)>, (usize, BatchError)> {
                    let mut simulator = Simulator::new(config).map_err(|e| (worker, BatchError::from(e)))?;
                    (worker..paths.len())
                        .step_by(workers)
                        .map(|index| {
                            run_trace(&mut simulator, &paths[index])
                                .map(|result| (index, result))
                                .map_err(|e| (index, e))
                        })
                        .collect()
                })
            })
            .collect();
        let mut ordered: Vec<Option<TraceResult>> = vec![None; paths.len()];
        let mut first_error: Option<(usize, BatchError)> = None;
        for handle in handles {
            match handle.join().map_err(|_| BatchError::WorkerPanicked)? {
                Ok(results) => {
                    for (index, result) in results {
                        ordered[index] = Some(result);
                    }
                }
                Err((index, e)) => {
                    if first_error.as_ref().map_or(true, |(first, _)| index < *first) {
                        first_error = Some((index, e));
                    }
                }
            }
        }
        // Report the same failure a sequential run would have stopped at
        if let Some((_, e)) = first_error {
            return Err(e);
        }
        Ok(ordered.into_iter().flatten().collect())
    })
}

fn run_trace(simulator: &mut Simulator, path: &Path) -> Result<TraceResult, BatchError> {
    let trace_error = |source: TraceError| BatchError::Trace { path: path.to_path_buf(), source };
    let mut reader = TraceReader::open(path).map_err(trace_error)?;
    let (result, elapsed) = simulator.simulate_file(&mut reader).map_err(trace_error)?;
    debug!("{}: {} events in {}s", path.display(), reader.events_read(), elapsed.as_nanos() as f64 / 1e9);
    Ok(TraceResult {
        trace: path.to_path_buf(),
        result,
    })
}
