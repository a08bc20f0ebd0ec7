//! Signal trader - main entry point
//!
//! Subcommands:
//! - run: trading loop against the paper exchange
//! - backtest: replay CSV histories through a strategy
//! - signals: print the decisions a strategy takes on recent bars
//! - strategies: list registered strategies

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "signal-trader")]
#[command(about = "Indicator-driven spot trading bot with paper trading and backtesting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the trading loop (paper exchange replaying a CSV history)
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy name (overrides config file)
        #[arg(short, long)]
        strategy: Option<String>,

        /// CSV history to replay (default: {data_dir}/{SYMBOL}_{timeframe}.csv)
        #[arg(short, long)]
        data: Option<String>,

        /// Cycle interval in seconds (overrides config file)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
    },

    /// Run strategy backtest
    Backtest {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy name (overrides config file)
        #[arg(short, long)]
        strategy: Option<String>,

        /// CSV file or directory of CSV files (default: data_dir)
        #[arg(short, long)]
        data: Option<String>,

        /// Initial quote balance
        #[arg(long)]
        capital: Option<f64>,
    },

    /// Show strategy decisions on the most recent bars
    Signals {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy name (overrides config file)
        #[arg(short, long)]
        strategy: Option<String>,

        /// CSV history (default: {data_dir}/{SYMBOL}_{timeframe}.csv)
        #[arg(short, long)]
        data: Option<String>,

        /// Number of bars to evaluate
        #[arg(short, long, default_value = "20")]
        last: usize,

        /// Emit one JSON object per bar
        #[arg(long)]
        json: bool,
    },

    /// List registered strategies
    Strategies,
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!("{},mio=warn,tokio=warn", level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // keep the console free for the progress bar / tables
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // same format as the console, without colours
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Run { .. } => ("run", false),
        Commands::Backtest { .. } => ("backtest", true),
        Commands::Signals { .. } => ("signals", true),
        Commands::Strategies => ("strategies", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Run {
            config,
            strategy,
            data,
            interval,
            max_cycles,
        } => commands::run::run(config, strategy, data, interval, max_cycles),

        Commands::Backtest {
            config,
            strategy,
            data,
            capital,
        } => commands::backtest::run(config, strategy, data, capital),

        Commands::Signals {
            config,
            strategy,
            data,
            last,
            json,
        } => commands::signals::run(config, strategy, data, last, json),

        Commands::Strategies => commands::strategies::run(),
    }
}
