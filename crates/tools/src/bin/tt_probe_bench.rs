//! Transposition table probe/save throughput benchmark
//!
//! Simulates the search-side access pattern: a stream of random keys with a
//! realistic bound/pv distribution, mixed probes and saves, a generation
//! advance between rounds, and optional prefetch of the next cluster.

use anyhow::Result;
use clap::Parser;
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::Instant;
use ttab_core::types::DEPTH_ENTRY_MAX;
use ttab_core::{Bound, Move, TranspositionTable, Value};

#[derive(Parser)]
#[command(about = "TT probe/save throughput benchmark")]
struct Args {
    /// Table size in MiB
    #[arg(long, default_value_t = 16)]
    mb: usize,

    /// Operations per round
    #[arg(long, default_value_t = 1_000_000)]
    ops: u64,

    /// Number of rounds (generation advances between rounds)
    #[arg(long, default_value_t = 4)]
    rounds: u32,

    /// Prefetch the next key's cluster one iteration ahead
    #[arg(long)]
    prefetch: bool,

    /// RNG seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("=== Transposition Table Probe/Save Benchmark ===");
    println!(
        "table: {} MiB, ops/round: {}, rounds: {}, prefetch: {}",
        args.mb, args.ops, args.rounds, args.prefetch
    );

    let tt = TranspositionTable::new(args.mb);
    println!("large pages: {}", tt.uses_large_pages());

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(args.seed);
    let mut hits = 0u64;
    let mut probes = 0u64;

    let start = Instant::now();
    for round in 1..=args.rounds {
        let round_start = Instant::now();
        let mut key = rng.next_u64();

        for _ in 0..args.ops {
            let next_key = rng.next_u64();
            if args.prefetch {
                tt.prefetch(next_key);
            }

            let result = tt.probe(key);
            probes += 1;
            if result.found {
                hits += 1;
            } else {
                let depth = rng.random_range(1..=DEPTH_ENTRY_MAX.min(30));
                let bound = match rng.random_range(0..100) {
                    0..10 => Bound::Exact,       // 10%
                    10..55 => Bound::Lower,      // 45%
                    _ => Bound::Upper,           // 45%
                };
                let is_pv = rng.random_range(0..100) < 5; // 5% PV nodes
                tt.save(
                    key,
                    Value::new(rng.random_range(-2000..2000)),
                    is_pv,
                    bound,
                    depth,
                    Move::from_u16(rng.next_u64() as u16),
                    Value::new(rng.random_range(-2000..2000)),
                );
            }

            key = next_key;
        }

        let elapsed = round_start.elapsed();
        let rate = args.ops as f64 / elapsed.as_secs_f64();
        println!(
            "round {}: {:.2}M ops/sec, hashfull={}, hit rate={:.1}%",
            round,
            rate / 1_000_000.0,
            tt.hashfull(),
            hits as f64 / probes as f64 * 100.0
        );

        tt.new_search();
    }

    let total = args.ops * args.rounds as u64;
    println!(
        "total: {} ops in {:.2}s ({:.2}M ops/sec)",
        total,
        start.elapsed().as_secs_f64(),
        total as f64 / start.elapsed().as_secs_f64() / 1_000_000.0
    );

    Ok(())
}
