use bigdecimal::{BigDecimal, RoundingMode};
use chrono::DateTime;
use colored::Colorize;

use crate::aggregators::signal::Signal;

/// Format a table with columns and rows
pub fn format_table(headers: Vec<&str>, rows: Vec<Vec<String>>) {
    let col_widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .fold(header.len(), usize::max)
        })
        .collect();

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = col_widths[i]))
        .collect::<Vec<_>>()
        .join(" | ");

    println!("{}", header_line.bold());
    println!("{}", "-".repeat(header_line.len()));

    for row in rows {
        let row_line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = col_widths.get(i).copied().unwrap_or(20)))
            .collect::<Vec<_>>()
            .join(" | ");
        println!("{}", row_line);
    }
}

/// Format data as JSON
pub fn format_json<T: serde::Serialize>(data: &T) -> String {
    match serde_json::to_string_pretty(data) {
        Ok(json) => json,
        Err(_) => "Unable to format as JSON".to_string(),
    }
}

/// Format a header
pub fn print_header(text: &str) {
    println!();
    println!("{}", text.bold().bright_cyan());
    println!("{}", "=".repeat(text.chars().count()));
    println!();
}

/// Epoch seconds as UTC, falling back to the raw number when out of range
pub fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn format_decimal(value: Option<&BigDecimal>) -> String {
    value
        .map(|v| v.with_scale_round(4, RoundingMode::HalfEven).normalized().to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_signal(signal: Option<Signal>) -> String {
    match signal {
        Some(Signal::Bullish) => "BULLISH".green().to_string(),
        Some(Signal::Bearish) => "BEARISH".red().to_string(),
        Some(Signal::Neutral) => "NEUTRAL".dimmed().to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(0), "1970-01-01 00:00:00");
        assert_eq!(format_ts(1_700_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_format_decimal() {
        let v = BigDecimal::from_str("105.123456").unwrap();
        assert_eq!(format_decimal(Some(&v)), "105.1235");
        assert_eq!(format_decimal(None), "-");
    }
}
