//! Command-line entry point: flag parsing, logging setup, timing, and the
//! in-process PGO repeat loop. Everything interesting happens in
//! [`tempra::engine`]; stdout carries exactly the result line (plus the
//! optional timing line), logs go to stderr.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tempra::engine::{self, AggregateConfig};
use tempra::partition::ReadStrategy;

/// Pipeline repetitions under `--pgo`.
const PGO_RUNS: u32 = 10;

/// Aggregate a measurements file into per-station min/mean/max.
#[derive(Debug, Parser)]
#[command(name = "tempra", version, about)]
struct Cli {
    /// Path to the measurements file.
    measurements: PathBuf,

    /// Run the whole pipeline 10 times in-process (profile collection).
    #[arg(long)]
    pgo: bool,

    /// Process all ranges sequentially on the main thread.
    #[arg(long)]
    nothreads: bool,

    /// Log per-worker table statistics.
    #[arg(short, long)]
    verbose: bool,

    /// Append a single `Elapsed in <ms> ms` line.
    #[arg(short = 't', long)]
    time: bool,

    /// Force the memory-mapped read strategy.
    #[arg(long, conflicts_with = "nommap")]
    mmap: bool,

    /// Force the positional-read strategy.
    #[arg(long)]
    nommap: bool,
}

impl Cli {
    fn strategy(&self) -> Option<ReadStrategy> {
        if self.mmap {
            Some(ReadStrategy::MemoryMapped)
        } else if self.nommap {
            Some(ReadStrategy::Positional)
        } else {
            None
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "tempra=debug" } else { "tempra=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AggregateConfig {
        strategy: cli.strategy(),
        sequential: cli.nothreads,
        workers: None,
    };

    let started = Instant::now();
    let runs = if cli.pgo { PGO_RUNS } else { 1 };

    let mut summary = engine::aggregate(&cli.measurements, &config)
        .with_context(|| format!("failed to aggregate {}", cli.measurements.display()))?;
    for _ in 1..runs {
        summary = engine::aggregate(&cli.measurements, &config)?;
    }

    println!("{}", summary.render());
    if cli.time {
        println!("Elapsed in {} ms", started.elapsed().as_millis());
    }
    Ok(())
}
