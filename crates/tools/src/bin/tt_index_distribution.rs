//! Fastrange cluster-index distribution analysis
//!
//! The table maps a 64-bit key to a cluster with the high 64 bits of the
//! 128-bit product `key * cluster_count`. This tool feeds a uniform key
//! stream through the same mapping and reports per-bin statistics, for
//! arbitrary (including non-power-of-two) cluster counts.

use anyhow::{Result, ensure};
use clap::Parser;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Parser)]
#[command(about = "TT fastrange index distribution analysis")]
struct Args {
    /// Cluster count (any value, not only powers of two)
    #[arg(long, default_value_t = 1_000_003)]
    clusters: usize,

    /// Number of random keys
    #[arg(long, default_value_t = 10_000_000)]
    keys: u64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Same mapping as the table's cluster index
fn fastrange(key: u64, cluster_count: usize) -> usize {
    ((key as u128 * cluster_count as u128) >> 64) as usize
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.clusters > 0, "cluster count must be positive");

    println!("=== Fastrange Index Distribution ===");
    println!("clusters: {}, keys: {}, seed: {}", args.clusters, args.keys, args.seed);

    let mut histogram = vec![0u32; args.clusters];
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(args.seed);

    for _ in 0..args.keys {
        let index = fastrange(rng.next_u64(), args.clusters);
        histogram[index] += 1;
    }

    let mean = args.keys as f64 / args.clusters as f64;
    let max = *histogram.iter().max().unwrap();
    let min = *histogram.iter().min().unwrap();
    let empty = histogram.iter().filter(|&&c| c == 0).count();

    let variance = histogram
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / args.clusters as f64;

    println!("mean: {mean:.2} keys/cluster");
    println!("min:  {min}");
    println!("max:  {max} ({:.2}x mean)", max as f64 / mean);
    println!("std:  {:.2}", variance.sqrt());
    println!("empty clusters: {empty}");

    // Sanity bound used by the test suite as well
    if (max as f64) > mean * 4.0 {
        println!("WARNING: max bin exceeds 4x mean, mapping looks skewed");
    } else {
        println!("OK: max bin within 4x mean");
    }

    Ok(())
}
