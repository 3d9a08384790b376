//! # tempra
//!
//! A parallel ingest and aggregation engine for billion-row measurement
//! files: semicolon-separated `station;temperature` records are folded into
//! per-station minimum / mean / maximum and rendered as a single
//! deterministic line, stations sorted by byte order, one decimal digit per
//! value.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Engine                             │
//! │                                                           │
//! │  partition ──► worker 0 ──► parser ──► StationTable ─┐    │
//! │      │         worker 1 ──► parser ──► StationTable ─┤    │
//! │      │           ...                                 ├──► │
//! │      └───────► caller   ──► parser ──► StationTable ─┘    │
//! │                (final range, positional reads)       │    │
//! │                                                      ▼    │
//! │                                      Summary (merge+sort) │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Orchestration — partition, spawn, join, merge |
//! | [`partition`] | Newline-aligned worker ranges and the read-strategy selection |
//! | [`worker`] | Per-range ingestion: positional reads or memory mapping |
//! | [`parser`] | The vectorized record-parsing inner loop |
//! | [`table`] | Fixed-width-key aggregation shards, one triplet per worker |
//! | [`report`] | Global merge and the deterministic result line |
//!
//! ## Key Properties
//!
//! - **Zero allocation in the hot path** — keys are fixed-width blocks
//!   embedded in cache-line entries; the parser reuses one scratchpad.
//! - **No synchronization during ingest** — each worker exclusively owns
//!   its table triplet; merging happens after the join.
//! - **Deterministic output** — byte-identical regardless of worker count
//!   and read strategy.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tempra::engine::{self, AggregateConfig};
//!
//! let summary = engine::aggregate("measurements.txt", &AggregateConfig::default()).unwrap();
//! println!("{}", summary.render());
//! ```

pub mod engine;
pub mod parser;
pub mod partition;
pub mod report;
pub mod table;
pub mod worker;

pub use engine::{AggregateConfig, EngineError, aggregate};
pub use partition::ReadStrategy;
pub use report::Summary;
