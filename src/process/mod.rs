// src/process/mod.rs
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::{debug, info};

pub mod aggregate;
pub mod raw_table;
pub mod transpose;

pub use aggregate::{aggregate_by_customer, AggregateRow};
pub use raw_table::RawTable;
pub use transpose::TransposedTable;

#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The label column names a key field twice.
    #[error("column label {0:?} appears more than once in the label column")]
    DuplicateColumn(String),

    #[error("required column {0:?} not found after transpose")]
    MissingColumn(&'static str),

    #[error("amount {value:?} in row {row} is not an integer")]
    InvalidAmount { row: usize, value: String },

    #[error("total amount for customer {customer:?} does not fit in a 64-bit integer")]
    AmountOverflow { customer: String },
}

/// Turn a downloaded export into per-customer aggregates.
///
/// The export is wide: each data row is one field (labelled by the value in
/// its last column) and each remaining column is one order. It is parsed,
/// flipped so orders become rows, then grouped by `customerId`.
#[tracing::instrument(level = "info", skip(buffer), fields(bytes = buffer.get_ref().len()))]
pub fn reshape(buffer: Cursor<Vec<u8>>) -> Result<Vec<AggregateRow>, ReshapeError> {
    reshape_reader(buffer)
}

pub fn reshape_reader<R: Read>(reader: R) -> Result<Vec<AggregateRow>, ReshapeError> {
    let raw = RawTable::from_reader(reader)?;
    debug!(
        columns = raw.num_columns(),
        rows = raw.num_rows(),
        "parsed raw export"
    );

    let transposed = TransposedTable::from_raw(&raw)?;
    debug!(
        columns = ?transposed.columns,
        rows = transposed.num_rows(),
        "transposed export"
    );

    let out = aggregate_by_customer(&transposed)?;
    info!(orders = transposed.num_rows(), customers = out.len(), "reshaped");
    Ok(out)
}
