// src/load/mod.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use tracing::info;

use crate::{config::WarehouseConfig, process::AggregateRow};

pub mod bigquery;
pub mod parquet_store;
pub mod schema;

pub use bigquery::BigQueryWarehouse;
pub use parquet_store::ParquetWarehouse;
pub use schema::{Column, ColumnType, OUTPUT_SCHEMA};

/// Dataset and table the aggregates are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub dataset: String,
    pub table: String,
}

impl TableTarget {
    pub fn from_config(config: &WarehouseConfig) -> Self {
        Self {
            dataset: config.dataset.clone(),
            table: config.table.clone(),
        }
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// An append-only table store.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Human-readable backend name for the confirmation message.
    fn name(&self) -> &'static str;

    async fn dataset_exists(&self, target: &TableTarget) -> Result<bool>;

    async fn create_dataset(&self, target: &TableTarget) -> Result<()>;

    /// Create the table with `schema` unless it is already there.
    async fn ensure_table(&self, target: &TableTarget, schema: &[Column]) -> Result<()>;

    /// Append `rows` as new rows. Never deduplicates.
    async fn append_rows(&self, target: &TableTarget, rows: &[AggregateRow]) -> Result<usize>;
}

/// Make sure the dataset and table exist, then append `rows`.
///
/// The dataset check is not atomic with its creation; two jobs racing on a
/// fresh dataset can both try to create it.
#[tracing::instrument(level = "info", skip(warehouse, rows), fields(backend = warehouse.name(), target = %target, rows = rows.len()))]
pub async fn persist<W>(warehouse: &W, target: &TableTarget, rows: &[AggregateRow]) -> Result<usize>
where
    W: Warehouse + ?Sized,
{
    if !warehouse
        .dataset_exists(target)
        .await
        .with_context(|| format!("looking up dataset {}", target.dataset))?
    {
        info!(dataset = %target.dataset, "dataset not found, creating");
        warehouse
            .create_dataset(target)
            .await
            .with_context(|| format!("creating dataset {}", target.dataset))?;
    }

    warehouse
        .ensure_table(target, OUTPUT_SCHEMA)
        .await
        .with_context(|| format!("preparing table {}", target))?;

    let appended = if rows.is_empty() {
        info!("no rows to append");
        0
    } else {
        warehouse
            .append_rows(target, rows)
            .await
            .with_context(|| format!("appending {} rows to {}", rows.len(), target))?
    };

    println!("Datos cargados en {}", warehouse.name());
    info!(appended, "load complete");
    Ok(appended)
}
