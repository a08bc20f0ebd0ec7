//! Backtest command implementation

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use signal_trader::backtest::{backtest_files, BacktestResult};
use signal_trader::data::csv_files;

use super::{default_data_file, load_config};

pub fn run(
    config_path: String,
    strategy_override: Option<String>,
    data: Option<String>,
    capital_override: Option<f64>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = load_config(&config_path, strategy_override)?;
    if let Some(capital) = capital_override {
        info!("Overriding initial quote balance to {:.2}", capital);
        config.paper.initial_quote = capital;
    }

    let target = data
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.backtest.data_dir));
    let files = if target.is_dir() {
        csv_files(&target)?
    } else if target.exists() {
        vec![target]
    } else {
        vec![default_data_file(&config)]
    };

    if files.is_empty() {
        anyhow::bail!("No CSV files found");
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] {msg}")?
            .progress_chars("█░ "),
    );

    let results = backtest_files(&config, &files, &pb);
    pb.finish_with_message("done");

    println!("\n{}", "=".repeat(78));
    println!("BACKTEST RESULTS - {} ({:?})", config.strategy_name, config.trading.sizing);
    println!("{}", "=".repeat(78));
    println!(
        "{:<28} {:>12} {:>9} {:>8} {:>6} {:>6} {:>9}",
        "File", "Final", "Return%", "MaxDD%", "Buys", "Sells", "Fees"
    );
    println!("{}", "-".repeat(78));

    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(r) => print_row(path, r),
            Err(e) => {
                failures += 1;
                error!("{}: {:#}", path.display(), e);
                println!("{:<28} failed: {}", file_label(path), e);
            }
        }
    }
    println!("{}", "=".repeat(78));

    if failures == results.len() {
        anyhow::bail!("All {} backtests failed", failures);
    }

    info!("Backtest completed successfully");
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_row(path: &Path, r: &BacktestResult) {
    println!(
        "{:<28} {:>12.2} {:>9.2} {:>8.2} {:>6} {:>6} {:>9.2}",
        file_label(path),
        r.final_equity,
        r.return_pct,
        r.max_drawdown_pct,
        r.buys,
        r.sells,
        r.total_fees
    );
    if let Some(reason) = &r.halt_reason {
        println!("{:<28} stopped: {}", "", reason);
    }
}
