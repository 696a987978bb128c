use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{transpose::TransposedTable, ReshapeError};

pub const CUSTOMER_ID: &str = "customerId";
pub const AMOUNT: &str = "amount";
pub const CREATED_AT: &str = "createdAt";

/// Per-customer order statistics for one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    pub customer_id: String,
    pub avg_amount: f64,
    pub total_amount: i64,
    pub median_amount: f64,
    /// `createdAt` of the first transposed row, shared by every output row.
    pub date: String,
}

/// Group by `customerId` and compute mean, sum and median of `amount`.
///
/// Rows come out ordered by customer id.
pub fn aggregate_by_customer(table: &TransposedTable) -> Result<Vec<AggregateRow>, ReshapeError> {
    if table.num_rows() == 0 || table.num_columns() == 0 {
        return Ok(Vec::new());
    }

    let customer_idx = table.require(CUSTOMER_ID)?;
    let amount_idx = table.require(AMOUNT)?;
    let created_idx = table.require(CREATED_AT)?;

    let amounts = parse_amounts(table, amount_idx)?;

    let mut groups: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for (row, amount) in table.rows.iter().zip(amounts) {
        groups
            .entry(row[customer_idx].as_str())
            .or_default()
            .push(amount);
    }

    let date = table.rows[0][created_idx].clone();
    debug!(customers = groups.len(), %date, "grouped orders");

    groups
        .into_iter()
        .map(|(customer, mut values)| {
            let total = values
                .iter()
                .try_fold(0i64, |acc, v| acc.checked_add(*v))
                .ok_or_else(|| ReshapeError::AmountOverflow {
                    customer: customer.to_string(),
                })?;
            Ok(AggregateRow {
                customer_id: customer.to_string(),
                avg_amount: total as f64 / values.len() as f64,
                total_amount: total,
                median_amount: median(&mut values),
                date: date.clone(),
            })
        })
        .collect()
}

fn parse_amounts(table: &TransposedTable, idx: usize) -> Result<Vec<i64>, ReshapeError> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(row, cells)| {
            let raw = &cells[idx];
            raw.parse::<i64>().map_err(|_| ReshapeError::InvalidAmount {
                row,
                value: raw.clone(),
            })
        })
        .collect()
}

/// Middle value, or the mean of the two middle values for an even count.
/// `values` must be non-empty; it is sorted in place.
fn median(values: &mut [i64]) -> f64 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    }
}
