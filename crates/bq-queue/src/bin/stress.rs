//! bq-stress — multi-threaded stress run against `BlockingQueue`.
//!
//! # Usage
//!
//! ```bash
//! bq-stress --preset stress --producers 8 --consumers 2 --capacity 4
//! DST_SEED=12345 bq-stress
//! ```
//!
//! Outputs JSON to stdout and exits non-zero if any item was lost or
//! duplicated, or the capacity bound was exceeded.

use std::process;

use clap::Parser;
use serde_json::json;

use bq_dst::{run_stress, HarnessConfig};
use bq_queue::BlockingQueue;

/// Run producers and consumers over one queue and check the hand-off.
#[derive(Parser, Debug)]
#[command(name = "bq-stress")]
#[command(about = "Producer/consumer stress run for the bounded blocking queue")]
struct Cli {
    /// Base configuration: quick, default or stress.
    #[arg(long, default_value = "default")]
    preset: String,

    /// Producer threads.
    #[arg(long)]
    producers: Option<usize>,

    /// Consumer threads.
    #[arg(long)]
    consumers: Option<usize>,

    /// Items enqueued by each producer.
    #[arg(long)]
    items: Option<u64>,

    /// Queue capacity.
    #[arg(long)]
    capacity: Option<usize>,

    /// Jitter seed (DST_SEED, else random).
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_preset(s: &str) -> Result<HarnessConfig, String> {
    match s.to_lowercase().as_str() {
        "quick" => Ok(HarnessConfig::quick()),
        "default" => Ok(HarnessConfig::default()),
        "stress" => Ok(HarnessConfig::stress()),
        _ => Err(format!("Unknown preset: {s}. Expected: quick, default, stress")),
    }
}

fn main() {
    let cli = Cli::parse();

    let preset = match parse_preset(&cli.preset) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    // Environment overrides the preset; flags override both.
    let mut config = match preset.from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    if let Some(producers) = cli.producers {
        config.producers = producers;
    }
    if let Some(consumers) = cli.consumers {
        config.consumers = consumers;
    }
    if let Some(items) = cli.items {
        config.items_per_producer = items;
    }
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }

    let seed = cli.seed.unwrap_or_else(bq_dst::get_or_generate_seed);

    let result = match run_stress::<BlockingQueue<u64>>(seed, &config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    eprintln!("{}", result.format());

    let output = json!({
        "passed": result.passed(),
        "result": result,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Error: failed to serialize result: {e}");
            process::exit(2);
        }
    }

    if !result.passed() {
        process::exit(1);
    }
}
