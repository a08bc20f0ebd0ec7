//! Performance benchmarks for signal-trader
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use signal_trader::indicators::{self, OuParams};
use signal_trader::strategies::create_strategy;
use signal_trader::{Candle, Config};

/// Deterministic noisy sine wave around 100
fn price_series(count: usize) -> Vec<f64> {
    let mut state: u64 = 42;
    (0..count)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            100.0 + 5.0 * (i as f64 * 0.15).sin() + noise
        })
        .collect()
}

fn candles(closes: &[f64]) -> Vec<Candle> {
    let start = chrono::Utc::now();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Candle::new_unchecked(
                start + chrono::Duration::minutes(5 * i as i64),
                c,
                c + 0.4,
                c - 0.4,
                c,
                1.0,
            )
        })
        .collect()
}

fn benchmark_indicators(c: &mut Criterion) {
    let closes = price_series(500);
    let highs: Vec<f64> = closes.iter().map(|p| p + 0.4).collect();
    let lows: Vec<f64> = closes.iter().map(|p| p - 0.4).collect();

    c.bench_function("window_rsi_500", |b| {
        b.iter(|| indicators::window_rsi(black_box(&closes), 6))
    });
    c.bench_function("macd_500", |b| {
        b.iter(|| indicators::macd(black_box(&closes), 6, 16, 9))
    });
    c.bench_function("parabolic_sar_500", |b| {
        b.iter(|| indicators::parabolic_sar(black_box(&highs), black_box(&lows), 0.02, 0.2))
    });
    c.bench_function("bollinger_500", |b| {
        b.iter(|| indicators::bollinger_bands(black_box(&closes), 20, 2.0))
    });
    c.bench_function("spectrum_128", |b| {
        b.iter(|| indicators::spectrum(black_box(&closes[..128]), true))
    });
    c.bench_function("ou_estimate_100", |b| {
        b.iter(|| OuParams::estimate(black_box(&closes[..100])))
    });
}

fn benchmark_strategies(c: &mut Criterion) {
    let window = candles(&price_series(500));
    for name in ["sar_macd_rsi", "bollinger_rsi", "fourier", "ornstein_uhlenbeck"] {
        let config = Config {
            strategy_name: name.to_string(),
            ..Config::default()
        };
        let Ok(strategy) = create_strategy(&config) else {
            continue;
        };
        c.bench_function(&format!("evaluate_{}", name), |b| {
            b.iter(|| strategy.evaluate(black_box(&window)))
        });
    }
}

criterion_group!(benches, benchmark_indicators, benchmark_strategies);
criterion_main!(benches);
