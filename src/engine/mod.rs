//! # Aggregation Engine
//!
//! Orchestrates one full run: partition the file, fan the ranges out to
//! worker threads, join, merge, and hand back the global summary.
//!
//! ## Concurrency Model
//!
//! One OS thread per worker range, spawned inside a scoped-thread block so
//! workers may borrow the path. The caller thread is itself a worker: it
//! ingests the final range (always with positional reads) while the spawned
//! workers run, then joins them in order. There is no shared mutable state
//! during ingestion — each worker owns its table triplet exclusively and
//! the merger consumes the tables afterwards on the caller thread.
//!
//! Threads request elevated scheduling priority on a best-effort basis;
//! running without the privilege is normal and silently accepted.
//!
//! ## Failure
//!
//! No retry, no recovery, no partial results: the first worker error or
//! panic fails the whole run.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs::File;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::partition::{self, FileRange, PartitionError, ReadStrategy};
use crate::report::Summary;
use crate::table::StationTable;
use crate::worker::{self, WorkerError};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors that can occur during an aggregation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The measurements file could not be opened.
    #[error("measurements file not found: {path}")]
    Input {
        /// The offending path, verbatim from the caller.
        path: String,
        #[source]
        source: io::Error,
    },

    /// Error originating from the partitioner.
    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    /// Error originating from a chunk worker.
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal invariant violation (worker panic, unexpected state).
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Tuning knobs for one aggregation run. `Default` matches the production
/// CLI with no flags.
#[derive(Debug, Clone, Default)]
pub struct AggregateConfig {
    /// Forced read strategy; `None` selects the default (positional reads).
    pub strategy: Option<ReadStrategy>,

    /// Process every range sequentially on the calling thread.
    pub sequential: bool,

    /// Worker-count override; `None` applies the size/core policy.
    pub workers: Option<usize>,
}

// ------------------------------------------------------------------------------------------------
// Engine
// ------------------------------------------------------------------------------------------------

/// Runs one full aggregation over the measurements file at `path`.
///
/// The returned [`Summary`] renders to the deterministic result line; the
/// output is byte-identical regardless of worker count and read strategy.
pub fn aggregate(path: impl AsRef<Path>, config: &AggregateConfig) -> Result<Summary, EngineError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| EngineError::Input {
        path: path.display().to_string(),
        source,
    })?;
    let file_len = file.metadata()?.len();

    raise_scheduling_priority();

    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = config
        .workers
        .unwrap_or_else(|| partition::worker_count(file_len, cores));
    let ranges = partition::partition(&file, file_len, workers)?;
    let strategy = config.strategy.unwrap_or_default();

    info!(
        file_len,
        workers,
        ?strategy,
        sequential = config.sequential,
        "starting aggregation"
    );

    let tables = if config.sequential || ranges.len() == 1 {
        ingest_sequential(path, &ranges, strategy)?
    } else {
        ingest_parallel(path, &ranges, strategy)?
    };

    let mut summary = Summary::new();
    for (index, table) in tables.iter().enumerate() {
        let stats = table.stats();
        debug!(
            worker = index,
            records = stats.records,
            narrow = stats.narrow_entries,
            mid = stats.mid_entries,
            wide = stats.wide_entries,
            resizes = stats.resizes,
            "worker table"
        );
        summary.absorb(table);
    }

    info!(stations = summary.station_count(), "aggregation complete");
    Ok(summary)
}

/// Strategy actually used for the range at `index`: the final range is
/// always positional (it runs on the caller thread, and mapping the tail
/// is not profitable).
fn strategy_for(index: usize, total: usize, strategy: ReadStrategy) -> ReadStrategy {
    if index + 1 == total {
        ReadStrategy::Positional
    } else {
        strategy
    }
}

/// `--nothreads` mode: every range on the calling thread, in file order.
fn ingest_sequential(
    path: &Path,
    ranges: &[FileRange],
    strategy: ReadStrategy,
) -> Result<Vec<StationTable>, EngineError> {
    let mut tables = Vec::with_capacity(ranges.len());
    for (index, range) in ranges.iter().enumerate() {
        let table =
            worker::process_range(path, *range, strategy_for(index, ranges.len(), strategy))?;
        tables.push(table);
    }
    Ok(tables)
}

/// One spawned thread per non-final range; the caller ingests the final
/// range, then joins. Tables come back in range order.
fn ingest_parallel(
    path: &Path,
    ranges: &[FileRange],
    strategy: ReadStrategy,
) -> Result<Vec<StationTable>, EngineError> {
    let (spawned, last) = ranges.split_at(ranges.len() - 1);

    crossbeam::thread::scope(|scope| -> Result<Vec<StationTable>, EngineError> {
        let mut handles = Vec::with_capacity(spawned.len());
        for (index, range) in spawned.iter().enumerate() {
            let worker_strategy = strategy_for(index, ranges.len(), strategy);
            handles
                .push(scope.spawn(move |_| worker::process_range(path, *range, worker_strategy)));
        }

        let caller_table = worker::process_range(path, last[0], ReadStrategy::Positional)?;

        let mut tables = Vec::with_capacity(ranges.len());
        for handle in handles {
            let table = handle
                .join()
                .map_err(|_| EngineError::Internal("worker thread panicked".into()))??;
            tables.push(table);
        }
        tables.push(caller_table);
        Ok(tables)
    })
    .map_err(|_| EngineError::Internal("worker scope panicked".into()))?
}

// ------------------------------------------------------------------------------------------------
// Scheduling priority
// ------------------------------------------------------------------------------------------------

/// Best-effort request for elevated scheduling priority; refusal (no
/// privilege) is ignored.
#[cfg(unix)]
fn raise_scheduling_priority() {
    // SAFETY: setpriority only adjusts scheduling for this process; no
    // memory safety implications.
    unsafe {
        libc::setpriority(libc::PRIO_PROCESS, 0, -20);
    }
}

#[cfg(not(unix))]
fn raise_scheduling_priority() {}
