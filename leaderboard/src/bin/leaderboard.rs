//! Live leaderboard server.
//!
//! Seeds an in-memory index, keeps it moving with random updates, and serves
//! `/leaderboard`, `/search` and `/user` over HTTP.
//!
//! Logging is controlled by `RUST_LOG` (default `info`).

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use leaderboard::seed::{self, SeedPlan};
use leaderboard::server::{Server, ServerConfig};
use leaderboard::service::{Service, DEFAULT_LIMIT};
use leaderboard::{simulate, Config, RankIndex, Score, MAX_SCORE, MIN_SCORE, SEARCH_LIMIT};
use log::info;

#[derive(Parser, Debug)]
#[command(name = "leaderboard", version, about = "Serve a live score leaderboard")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Number of generated users to seed
    #[arg(long, default_value_t = 10_000)]
    users: usize,

    /// Milliseconds between simulated updates (0 disables the simulator)
    #[arg(long, default_value_t = simulate::DEFAULT_INTERVAL.as_millis() as u64)]
    tick_ms: u64,

    /// Lowest score
    #[arg(long, default_value_t = MIN_SCORE, allow_negative_numbers = true)]
    min_score: Score,

    /// Highest score
    #[arg(long, default_value_t = MAX_SCORE, allow_negative_numbers = true)]
    max_score: Score,

    /// RNG seed for reproducible seeding and simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum matches returned by /search
    #[arg(long, default_value_t = SEARCH_LIMIT)]
    search_limit: usize,

    /// Listing size when /leaderboard has no usable limit
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    default_limit: usize,

    /// Seconds a client has to send its request head
    #[arg(long, default_value_t = 5)]
    read_timeout_secs: u64,

    /// Seconds a response write may stall on a client that is not reading
    #[arg(long, default_value_t = 5)]
    write_timeout_secs: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = Config {
        search_limit: args.search_limit,
        initial_capacity: args.users + 16,
        ..Config::with_range(args.min_score, args.max_score)?
    };
    let index = Arc::new(RankIndex::with_config(config));

    let plan = SeedPlan {
        random_users: args.users,
        rng_seed: args.seed,
        ..SeedPlan::default()
    };
    let roster = seed::seed(&index, &plan);

    let _simulator = if args.tick_ms > 0 {
        Some(simulate::spawn(
            Arc::clone(&index),
            roster,
            Duration::from_millis(args.tick_ms),
            args.seed.map(|s| s.wrapping_add(1)),
        )?)
    } else {
        info!("Simulator disabled");
        None
    };

    let service = Service::new(index).with_default_limit(args.default_limit);
    let server = Server::bind(
        args.bind.as_str(),
        service,
        ServerConfig {
            read_timeout: Duration::from_secs(args.read_timeout_secs),
            write_timeout: Duration::from_secs(args.write_timeout_secs),
            ..ServerConfig::default()
        },
    )?;
    server.serve()?;
    Ok(())
}
