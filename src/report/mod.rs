//! # Result Merger Module
//!
//! Folds every per-worker table into one global map keyed by the decoded
//! station name, then renders the single deterministic result line.
//!
//! ## Determinism
//!
//! Accumulator combination is commutative and associative, so the merged
//! values are independent of worker count, read strategy, and interleaving.
//! Rendering sorts stations by ascending byte order and prints every value
//! as tenths with exactly one fractional digit; the mean rounds half away
//! from zero on the exact rational `sum / count`, computed entirely in
//! integers.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::fmt::Write;

use ahash::RandomState;

use crate::table::{Accumulator, StationTable};

// ------------------------------------------------------------------------------------------------
// Summary
// ------------------------------------------------------------------------------------------------

/// The merged, global view over all worker tables.
#[derive(Debug)]
pub struct Summary {
    /// Per-station statistics keyed by the decoded name bytes.
    stations: HashMap<Vec<u8>, Accumulator, RandomState>,
}

impl Summary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self {
            stations: HashMap::default(),
        }
    }

    /// Folds every station of a worker table into the global map.
    pub fn absorb(&mut self, table: &StationTable) {
        for (name, acc) in table.iter() {
            self.stations
                .entry(name.to_vec())
                .or_insert(Accumulator::EMPTY)
                .combine(acc);
        }
    }

    /// Number of distinct stations.
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Iterates all stations in unspecified order.
    pub fn stations(&self) -> impl Iterator<Item = (&[u8], &Accumulator)> {
        self.stations.iter().map(|(name, acc)| (name.as_slice(), acc))
    }

    /// Renders the result line (without a trailing newline):
    /// `{name=min/mean/max, ...}`, stations ascending by byte order.
    pub fn render(&self) -> String {
        let mut names: Vec<&Vec<u8>> = self.stations.keys().collect();
        names.sort_unstable();

        let mut out = String::with_capacity(names.len() * 24 + 2);
        out.push('{');
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let acc = &self.stations[*name];
            out.push_str(&String::from_utf8_lossy(name));
            out.push('=');
            push_tenths(&mut out, acc.min as i64);
            out.push('/');
            push_tenths(&mut out, mean_tenths(acc.sum, acc.count));
            out.push('/');
            push_tenths(&mut out, acc.max as i64);
        }
        out.push('}');
        out
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// Fixed-point formatting
// ------------------------------------------------------------------------------------------------

/// Mean in tenths from the exact rational `sum / count`, rounding half away
/// from zero.
fn mean_tenths(sum: i64, count: u64) -> i64 {
    debug_assert!(count > 0);
    let n = count as i64;
    if sum >= 0 {
        (2 * sum + n) / (2 * n)
    } else {
        -((2 * -sum + n) / (2 * n))
    }
}

/// Writes a scaled temperature as a signed decimal with one fractional
/// digit.
fn push_tenths(out: &mut String, tenths: i64) {
    if tenths < 0 {
        out.push('-');
    }
    let magnitude = tenths.unsigned_abs();
    let _ = write!(out, "{}.{}", magnitude / 10, magnitude % 10);
}
