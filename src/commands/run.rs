//! Trading loop command
//!
//! Runs the live loop against the paper exchange, replaying a CSV history
//! one bar per cycle. The exchange sits behind the same request guard a
//! network client would use.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use signal_trader::data::load_csv;
use signal_trader::exchange::{GuardedExchange, PaperAccount, PaperExchange};
use signal_trader::strategies::create_strategy;
use signal_trader::trader::{Trader, TraderSettings};

use super::{default_data_file, load_config};

pub fn run(
    config_path: String,
    strategy_override: Option<String>,
    data: Option<String>,
    interval: Option<u64>,
    max_cycles: Option<u64>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(
        config_path,
        strategy_override,
        data,
        interval,
        max_cycles,
    ))
}

async fn run_async(
    config_path: String,
    strategy_override: Option<String>,
    data: Option<String>,
    interval: Option<u64>,
    max_cycles: Option<u64>,
) -> Result<()> {
    let mut config = load_config(&config_path, strategy_override)?;
    if let Some(secs) = interval {
        config.trading.interval_secs = secs;
    }
    config.validate()?;

    let data_path = data
        .map(PathBuf::from)
        .unwrap_or_else(|| default_data_file(&config));
    let history = load_csv(&data_path)
        .with_context(|| format!("Failed to load replay data {}", data_path.display()))?;
    info!("Replaying {} candles from {}", history.len(), data_path.display());

    let settings = TraderSettings::from_config(&config);
    let account = PaperAccount::new(
        settings.market.clone(),
        config.paper.initial_quote,
        config.paper.initial_base,
    )
    .with_costs(config.exchange.taker_fee, config.exchange.slippage);
    let exchange =
        GuardedExchange::from_config(PaperExchange::new(history, account), &config.exchange);

    let strategy = create_strategy(&config)?;

    info!("{}", "=".repeat(60));
    info!("Strategy:  {}", config.strategy_name);
    info!("Market:    {} ({})", settings.market, settings.timeframe);
    info!("Sizing:    {:?}", settings.sizing);
    info!("Interval:  {}s", config.trading.interval_secs);
    info!("{}", "=".repeat(60));

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => error!("Error setting up signal handler: {}", e),
        }
    });

    let mut trader = Trader::new(exchange, strategy, settings);
    let summary = trader
        .run(
            Duration::from_secs(config.trading.interval_secs),
            max_cycles,
            shutdown_rx,
        )
        .await?;

    let paper = trader.exchange().inner();
    let account = paper.account().await;
    let last_price = paper.last_price().await.unwrap_or(0.0);

    println!("\n{}", "=".repeat(60));
    println!("SESSION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Cycles:             {}", summary.cycles);
    println!("Orders:             {}", summary.orders);
    if let Some(reason) = &summary.halt_reason {
        println!("Stopped:            {}", reason);
    }
    println!(
        "Balances:           {:.8} {} / {:.2} {}",
        account.base(),
        account.market().base,
        account.quote(),
        account.market().quote
    );
    println!("Fees paid:          {:.4}", account.fees_paid());
    println!("Equity @ {:<10.2} {:.2}", last_price, account.equity(last_price));
    println!("{}", "=".repeat(60));

    Ok(())
}
