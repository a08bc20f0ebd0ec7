//! Data loading and validation
//!
//! Loads OHLCV history from CSV files for replay and backtesting, and checks
//! polled windows before any indicator runs on them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::Candle;

/// Why a price window cannot be used
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("price window is empty")]
    Empty,

    #[error("non-finite price {value} at index {index}")]
    NonFinite { index: usize, value: f64 },
}

// =============================================================================
// CSV Data Loading
// =============================================================================

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse datetime: {}", raw))
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64> {
    record
        .get(index)
        .with_context(|| format!("Missing {} column", name))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))
}

/// Load OHLCV data from CSV file with validation
///
/// Expects a header row and `datetime,open,high,low,close,volume` columns.
/// Candles failing validation are skipped with a warning.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let datetime = parse_datetime(record.get(0).context("Missing datetime column")?)?;
        let open = parse_field(&record, 1, "open")?;
        let high = parse_field(&record, 2, "high")?;
        let low = parse_field(&record, 3, "low")?;
        let close = parse_field(&record, 4, "close")?;
        let volume = parse_field(&record, 5, "volume")?;

        match Candle::new(datetime, open, high, low, close, volume) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                invalid_count += 1;
                warn!(
                    "Skipping invalid candle at row {} in {:?}: {}",
                    row_idx + 2, // header + 1-indexed
                    path.file_name().unwrap_or_default(),
                    e
                );
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid candles out of {} in {:?}",
            invalid_count,
            invalid_count + candles.len(),
            path.file_name().unwrap_or_default()
        );
    }

    debug!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// All `*.csv` files in a directory, sorted by name
pub fn csv_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    files.sort();
    Ok(files)
}

// =============================================================================
// Validation
// =============================================================================

/// Reject a window the indicators cannot run on
pub fn validate_prices(values: &[f64]) -> Result<(), DataError> {
    if values.is_empty() {
        return Err(DataError::Empty);
    }

    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(DataError::NonFinite {
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}

/// Validate candle data for common issues
pub fn validate_candles(candles: &[Candle]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if candles.is_empty() {
        errors.push("No candles provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, candle) in candles.iter().enumerate() {
        if let Err(e) = candle.validate() {
            errors.push(format!("Candle {}: {}", i, e));
        }
        if i > 0 && candle.datetime <= candles[i - 1].datetime {
            warnings.push(format!("Candle {}: not chronological", i));
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Column helpers
// =============================================================================

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::io::Write;

    fn candle_at(minutes: i64, close: f64) -> Candle {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        Candle::new_unchecked(
            start + Duration::minutes(minutes),
            close,
            close + 1.0,
            close - 1.0,
            close,
            10.0,
        )
    }

    fn temp_csv(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("signal_trader_data_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_validate_prices() {
        assert_eq!(validate_prices(&[]), Err(DataError::Empty));
        assert!(validate_prices(&[1.0, 2.0]).is_ok());
        assert!(matches!(
            validate_prices(&[1.0, f64::NAN]),
            Err(DataError::NonFinite { index: 1, .. })
        ));
        assert!(validate_prices(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn test_validate_candles() {
        let candles = vec![candle_at(0, 100.0), candle_at(5, 101.0)];
        let result = validate_candles(&candles);
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_candles_flags_order_and_range() {
        let mut bad = candle_at(0, 100.0);
        bad.high = 90.0;
        let candles = vec![candle_at(5, 100.0), bad];

        let result = validate_candles(&candles);
        assert!(!result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(!validate_candles(&[]).is_valid());
    }

    #[test]
    fn test_column_helpers() {
        let candles = vec![candle_at(0, 100.0), candle_at(5, 102.0)];
        assert_eq!(closes(&candles), vec![100.0, 102.0]);
        assert_eq!(highs(&candles), vec![101.0, 103.0]);
        assert_eq!(lows(&candles), vec![99.0, 101.0]);
    }

    #[test]
    fn test_load_csv_skips_invalid_rows() {
        let path = temp_csv(
            "mixed.csv",
            "datetime,open,high,low,close,volume\n\
             2024-01-01T00:00:00Z,100,105,95,102,10\n\
             2024-01-01 00:05:00,102,101,103,102,10\n\
             2024-01-01 00:10:00,102,106,101,104,12\n",
        );

        let candles = load_csv(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 104.0);
    }

    #[test]
    fn test_load_csv_rejects_bad_timestamp() {
        let path = temp_csv(
            "bad_time.csv",
            "datetime,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        );
        assert!(load_csv(&path).is_err());
    }
}
