use std::path::PathBuf;

use clap::Parser;

/// Two-stage hydropower scheduling: a day-ahead plan from the forecast,
/// then a committed intraday schedule per scenario.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Case file describing basins, plants, forecast and scenarios
    #[arg(short, long)]
    pub case: PathBuf,

    /// Output directory, overriding the configured one
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Number of scenarios to sample on top of those in the case file
    #[arg(long)]
    pub scenarios: Option<usize>,

    /// Random seed for scenario sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Per-solve timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}
