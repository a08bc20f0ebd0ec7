//! Signal inspection command
//!
//! Replays the last bars of a CSV history through the configured strategy
//! and prints each decision with the indicator values behind it. No orders
//! are placed.

use anyhow::{Context, Result};
use std::path::PathBuf;

use signal_trader::data::{load_csv, validate_candles};
use signal_trader::strategies::create_strategy;
use signal_trader::Signal;

use super::{default_data_file, load_config};

pub fn run(
    config_path: String,
    strategy_override: Option<String>,
    data: Option<String>,
    last: usize,
    json: bool,
) -> Result<()> {
    let config = load_config(&config_path, strategy_override)?;
    let path = data
        .map(PathBuf::from)
        .unwrap_or_else(|| default_data_file(&config));
    let candles =
        load_csv(&path).with_context(|| format!("Failed to load {}", path.display()))?;

    let validation = validate_candles(&candles);
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if !validation.is_valid() {
        anyhow::bail!("Invalid data: {}", validation.errors.join("; "));
    }

    let strategy = create_strategy(&config)?;
    let window = config.trading.candle_limit.max(1);
    let first = candles.len().saturating_sub(last);

    let mut actionable = 0;
    for i in first..candles.len() {
        let start = (i + 1).saturating_sub(window);
        let evaluation = strategy.evaluate(&candles[start..=i]);
        if evaluation.signal != Signal::Hold {
            actionable += 1;
        }

        if json {
            let line = serde_json::json!({
                "datetime": candles[i].datetime,
                "evaluation": evaluation,
            });
            println!("{}", line);
        } else {
            println!(
                "{}  {:>10.2}  {:<4}  {}",
                candles[i].datetime.format("%Y-%m-%d %H:%M"),
                evaluation.price,
                format!("{:?}", evaluation.signal),
                evaluation.describe()
            );
        }
    }

    if !json {
        println!(
            "\n{} of {} bars actionable ({})",
            actionable,
            candles.len() - first,
            strategy.name()
        );
    }
    Ok(())
}
