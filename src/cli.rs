// src/cli.rs

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DATE_FORMAT_ERROR: &str = "Formato de fecha incorrecto. Utiliza el formato aaaa-mm-dd";

/// Pull the daily orders export, aggregate it per customer and append it
/// to the warehouse.
#[derive(Parser, Debug)]
#[command(name = "orders-etl", version)]
pub struct Args {
    /// Fecha en formato yyyy-MM-dd (defaults to today)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Append to a local Parquet table store under this directory instead of BigQuery
    #[arg(long)]
    pub parquet_dir: Option<PathBuf>,
}

/// Returned when `--date` does not parse as `yyyy-MM-dd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDate;

/// Pick the run date: the user's `--date` when given, today otherwise.
/// The string is kept as typed since it names the remote file, so it must
/// already be in canonical form (chrono alone accepts `+2024-01-01`).
pub fn resolve_date(arg: Option<&str>, today: NaiveDate) -> Result<String, InvalidDate> {
    match arg {
        None => Ok(today.format(DATE_FORMAT).to_string()),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .filter(|d| d.format(DATE_FORMAT).to_string() == raw)
            .map(|_| raw.to_string())
            .ok_or(InvalidDate),
    }
}

pub fn remote_file_name(date: &str) -> String {
    format!("orders_{}.csv", date)
}
