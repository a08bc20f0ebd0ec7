//! List registered strategies

use anyhow::Result;
use signal_trader::strategies::available_strategies;

pub fn run() -> Result<()> {
    println!("Available strategies:");
    for name in available_strategies() {
        println!("  - {}", name);
    }
    Ok(())
}
