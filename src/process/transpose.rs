use super::{
    aggregate::{AMOUNT, CREATED_AT, CUSTOMER_ID},
    raw_table::RawTable,
    ReshapeError,
};

/// Labels the aggregation reads; each must name at most one column.
const KEY_COLUMNS: [&str; 3] = [CUSTOMER_ID, AMOUNT, CREATED_AT];

/// The export turned on its side: one row per original column (the label
/// column excluded), one column per original row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposedTable {
    /// Values of the raw table's last column, in row order.
    pub columns: Vec<String>,
    /// Row `i` holds original column `i`; rows are indexed 0..n.
    pub rows: Vec<Vec<String>>,
}

impl TransposedTable {
    /// Take the last column as labels, drop it, then swap rows and columns.
    ///
    /// A repeated `customerId`, `amount` or `createdAt` label is rejected.
    /// Other labels may repeat; nothing reads them.
    pub fn from_raw(raw: &RawTable) -> Result<Self, ReshapeError> {
        let Some(label_idx) = raw.num_columns().checked_sub(1) else {
            return Ok(Self {
                columns: Vec::new(),
                rows: Vec::new(),
            });
        };

        let columns: Vec<String> = raw.rows.iter().map(|r| r[label_idx].clone()).collect();

        for key in KEY_COLUMNS {
            if columns.iter().filter(|c| c.as_str() == key).count() > 1 {
                return Err(ReshapeError::DuplicateColumn(key.to_string()));
            }
        }

        // original column j (j < label_idx) becomes row j
        let rows = (0..label_idx)
            .map(|j| raw.rows.iter().map(|r| r[j].clone()).collect())
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like `column_index` but a missing column is an error.
    pub fn require(&self, name: &'static str) -> Result<usize, ReshapeError> {
        self.column_index(name)
            .ok_or(ReshapeError::MissingColumn(name))
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}
