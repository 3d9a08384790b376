//! # File Partitioner Module
//!
//! Splits the measurements file into contiguous worker ranges aligned on
//! record boundaries, applies the worker-count policy, and names the read
//! strategy a worker should use for its range.
//!
//! ## Design Invariants
//!
//! - Range ends are snapped to one past the first `\n` at or after the
//!   nominal boundary `i·F/W`; every range therefore begins at a record
//!   start and ends one past a newline.
//! - The union of all ranges is exactly `[0, F)`, in order, without overlap.
//!   Ranges may be empty on tiny files whose boundaries collapse onto the
//!   same newline.
//! - The final range is always processed with positional reads on the
//!   caller's thread — mapping the tail and joining late is not profitable.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;

use memchr::memchr;
use thiserror::Error;
use tracing::trace;

/// A worker range never spans more than 2 GiB; larger files get extra
/// workers instead.
const RANGE_SPAN_BYTES: u64 = 1 << 31;

/// Probe window used while snapping a boundary to the next newline. Wider
/// than the widest record, so one probe almost always suffices.
const PROBE_BYTES: usize = 256;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned while partitioning the input file.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// Underlying I/O error while probing for a record boundary.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ------------------------------------------------------------------------------------------------
// Read strategy
// ------------------------------------------------------------------------------------------------

/// How a worker loads the bytes of its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// Positional reads through an independent file handle per worker.
    /// The default everywhere.
    #[default]
    Positional,

    /// A read-only memory mapping per worker range. Opt-in via flag, for
    /// platforms where mapping empirically dominates.
    MemoryMapped,
}

// ------------------------------------------------------------------------------------------------
// File ranges
// ------------------------------------------------------------------------------------------------

/// A contiguous, newline-aligned byte interval of the input file assigned
/// to one worker. `start` is a record start; `end` is one past the newline
/// of the range's last record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRange {
    /// First byte of the range.
    pub start: u64,

    /// One past the last byte of the range.
    pub end: u64,
}

impl FileRange {
    /// Length of the range in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

// ------------------------------------------------------------------------------------------------
// Worker-count policy
// ------------------------------------------------------------------------------------------------

/// Number of workers for a file of `file_len` bytes on `cores` logical
/// cores.
///
/// At least one worker per 2 GiB of input, otherwise one per core minus a
/// small reserve (two below 16 cores, one at or above). The caller thread
/// counts as one of the workers.
pub fn worker_count(file_len: u64, cores: usize) -> usize {
    let by_size = file_len.div_ceil(RANGE_SPAN_BYTES) as usize;
    let reserve = if cores < 16 { 2 } else { 1 };
    by_size.max(cores.saturating_sub(reserve)).max(1)
}

// ------------------------------------------------------------------------------------------------
// Partitioning
// ------------------------------------------------------------------------------------------------

/// Computes `workers` contiguous ranges covering `[0, file_len)`, each end
/// snapped to the first newline at or after its nominal boundary.
pub fn partition(
    file: &File,
    file_len: u64,
    workers: usize,
) -> Result<Vec<FileRange>, PartitionError> {
    debug_assert!(workers >= 1);

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0u64;
    for worker in 1..=workers as u64 {
        let end = if worker == workers as u64 {
            file_len
        } else {
            let nominal = (file_len as u128 * worker as u128 / workers as u128) as u64;
            snap_to_record_end(file, file_len, nominal)?
        };
        trace!(worker, start, end, "range");
        ranges.push(FileRange { start, end });
        start = end;
    }
    Ok(ranges)
}

/// First position one past a `\n` at or after `nominal`, or `file_len` when
/// no newline follows.
fn snap_to_record_end(file: &File, file_len: u64, nominal: u64) -> Result<u64, PartitionError> {
    let mut probe = [0u8; PROBE_BYTES];
    let mut at = nominal;
    while at < file_len {
        let want = ((file_len - at) as usize).min(PROBE_BYTES);
        file.read_exact_at(&mut probe[..want], at)?;
        if let Some(newline) = memchr(b'\n', &probe[..want]) {
            return Ok(at + newline as u64 + 1);
        }
        at += want as u64;
    }
    Ok(file_len)
}
