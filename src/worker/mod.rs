//! # Chunk Worker Module
//!
//! One worker owns one newline-aligned file range and one
//! [`StationTable`]; it loads the range's bytes and drives the record
//! parser against its local table. Workers share nothing mutable, so the
//! whole ingest runs without locks or atomics.
//!
//! ## Read strategies
//!
//! - **Positional reads** (default): an independent read handle per worker
//!   (concurrent positional reads through a shared handle serialize inside
//!   the kernel on some platforms), a 256 KiB chunk buffer with a 256-byte
//!   carry head and a 32-byte zeroed tail slack. Interior chunks are split
//!   at their last newline; the partial record after it is carried to the
//!   buffer head for the next read.
//! - **Memory-mapped**: a read-only mapping of the range. The bulk is
//!   parsed in place up to the last newline that still leaves the parser's
//!   slack inside the mapping; the few remaining records are bounced
//!   through a zero-padded stack buffer, which preserves the slack contract
//!   without ever touching bytes outside the mapping.
//!
//! Either way the parser only ever sees whole records, and both strategies
//! produce byte-identical tables.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use memchr::memrchr;
use memmap2::MmapOptions;
use thiserror::Error;
use tracing::debug;

use crate::parser::{MAX_RECORD_BYTES, RecordParser, SLACK_BYTES};
use crate::partition::{FileRange, ReadStrategy};
use crate::table::StationTable;

/// Bytes requested per positional read.
pub const CHUNK_BYTES: usize = 256 * 1024;

/// Carry area for the partial record split off an interior chunk, and the
/// bounce-buffer size for the mapped tail. Comfortably wider than the
/// widest record.
pub const CARRY_BYTES: usize = 256;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by a chunk worker. All of them abort the run; there are
/// no partial results.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Underlying I/O failure while reading or mapping the range.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Range ingestion
// ------------------------------------------------------------------------------------------------

/// Ingests one file range into a fresh local table.
///
/// `range.start` must be the byte offset of a record start and `range.end`
/// one past the newline of the range's last record — the partitioner
/// guarantees both.
pub fn process_range(
    path: &Path,
    range: FileRange,
    strategy: ReadStrategy,
) -> Result<StationTable, WorkerError> {
    let mut table = StationTable::new();
    if range.is_empty() {
        return Ok(table);
    }

    let file = File::open(path)?;
    match strategy {
        ReadStrategy::Positional => ingest_positional(&file, range, &mut table)?,
        ReadStrategy::MemoryMapped => ingest_mapped(&file, range, &mut table)?,
    }

    debug!(
        start = range.start,
        end = range.end,
        records = table.record_count(),
        stations = table.station_count(),
        "range ingested"
    );
    Ok(table)
}

/// Positional-read loop: read a chunk, parse up to its last newline, carry
/// the partial tail to the front, repeat.
fn ingest_positional(
    file: &File,
    range: FileRange,
    table: &mut StationTable,
) -> Result<(), WorkerError> {
    let mut buf = vec![0u8; CARRY_BYTES + CHUNK_BYTES + SLACK_BYTES];
    let mut parser = RecordParser::new();
    let mut carry = 0usize;
    let mut offset = range.start;

    while offset < range.end {
        let want = (range.end - offset).min(CHUNK_BYTES as u64) as usize;
        file.read_exact_at(&mut buf[carry..carry + want], offset)?;
        offset += want as u64;
        let valid = carry + want;

        if offset < range.end {
            // Interior chunk: everything after the last newline is an
            // incomplete record that the next read completes.
            let split = memrchr(b'\n', &buf[..valid]).ok_or_else(|| {
                WorkerError::Internal("no record boundary inside read chunk".into())
            })? + 1;

            buf[valid..valid + SLACK_BYTES].fill(0);
            parser.parse(&buf, split, table);

            buf.copy_within(split..valid, 0);
            carry = valid - split;
            debug_assert!(carry < MAX_RECORD_BYTES);
        } else {
            // Final read of the range: the remainder is whole records.
            buf[valid..valid + SLACK_BYTES].fill(0);
            parser.parse(&buf, valid, table);
            carry = 0;
        }
    }
    Ok(())
}

/// Memory-mapped ingestion: parse the mapped bulk in place, bounce the tail.
fn ingest_mapped(file: &File, range: FileRange, table: &mut StationTable) -> Result<(), WorkerError> {
    let len = range.len() as usize;

    // SAFETY: the mapping is read-only and private to this worker, and the
    // input file is treated as immutable for the duration of the run.
    let mapped = unsafe { MmapOptions::new().offset(range.start).len(len).map(file)? };

    let mut parser = RecordParser::new();
    let mut bounce = [0u8; CARRY_BYTES + SLACK_BYTES];

    if len <= CARRY_BYTES {
        // Tiny range: bounce everything.
        bounce[..len].copy_from_slice(&mapped[..]);
        parser.parse(&bounce, len, table);
        return Ok(());
    }

    // Parse in place up to the last newline that keeps the parser's
    // overshoot inside the mapping.
    let bulk = memrchr(b'\n', &mapped[..len - SLACK_BYTES]).ok_or_else(|| {
        WorkerError::Internal("no record boundary inside mapped range".into())
    })? + 1;
    parser.parse(&mapped, bulk, table);

    // Whatever records remain fit the bounce buffer: a newline occurs at
    // least every MAX_RECORD_BYTES bytes.
    let tail = &mapped[bulk..];
    debug_assert!(tail.len() <= CARRY_BYTES);
    bounce[..tail.len()].copy_from_slice(tail);
    parser.parse(&bounce, tail.len(), table);
    Ok(())
}
