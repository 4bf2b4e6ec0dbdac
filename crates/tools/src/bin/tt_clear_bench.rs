//! Parallel clear scaling benchmark
//!
//! Measures the sharded first-touch zeroing across thread counts. On NUMA
//! hosts the thread count also decides which node each shard's pages land
//! on, so the absolute numbers vary with the topology.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use ttab_core::TranspositionTable;

#[derive(Parser)]
#[command(about = "TT parallel clear scaling benchmark")]
struct Args {
    /// Table size in MiB
    #[arg(long, default_value_t = 256)]
    mb: usize,

    /// Repetitions per thread count
    #[arg(long, default_value_t = 5)]
    reps: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("=== Transposition Table Clear Benchmark ===");
    println!("table: {} MiB, reps: {}", args.mb, args.reps);

    let mut tt = TranspositionTable::new(args.mb);
    println!("large pages: {}", tt.uses_large_pages());

    let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let mut thread_counts = vec![1usize, 2, 4, 8, 16, 32];
    thread_counts.retain(|&t| t <= available.max(1) * 2);

    for threads in thread_counts {
        // Warm-up touch so page faults do not dominate the first timing
        tt.clear(threads);

        let start = Instant::now();
        for _ in 0..args.reps {
            tt.clear(threads);
        }
        let elapsed = start.elapsed();

        let total_mib = args.mb as f64 * args.reps as f64;
        println!(
            "threads {:2}: {:6.1} ms/clear, {:8.1} MiB/s",
            threads,
            elapsed.as_secs_f64() * 1000.0 / args.reps as f64,
            total_mib / elapsed.as_secs_f64()
        );
    }

    Ok(())
}
