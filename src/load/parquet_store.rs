// src/load/parquet_store.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, StringArray},
    record_batch::RecordBatch,
};
use async_trait::async_trait;
use chrono::Utc;
use glob::glob;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use super::{
    schema::{build_arrow_schema, Column},
    TableTarget, Warehouse, OUTPUT_SCHEMA,
};
use crate::process::AggregateRow;

/// A local table store laid out as `<root>/<dataset>/<table>/part-<ts>.parquet`.
///
/// Every append adds a new part file, so reading a table back returns the
/// rows of every run in write order.
pub struct ParquetWarehouse {
    root: PathBuf,
}

impl ParquetWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating parquet store root {:?}", &root))?;
        Ok(Self { root })
    }

    fn dataset_dir(&self, target: &TableTarget) -> PathBuf {
        self.root.join(&target.dataset)
    }

    fn table_dir(&self, target: &TableTarget) -> PathBuf {
        self.dataset_dir(target).join(&target.table)
    }

    /// Read every part of a table back, oldest first.
    pub fn read_table(&self, target: &TableTarget) -> Result<Vec<AggregateRow>> {
        let pattern = format!("{}/part-*.parquet", self.table_dir(target).display());
        let mut parts: Vec<PathBuf> = glob(&pattern)
            .context("invalid glob pattern for parquet parts")?
            .filter_map(Result::ok)
            .collect();
        // zero-padded timestamps sort chronologically
        parts.sort();

        let mut rows = Vec::new();
        for path in parts {
            let file = File::open(&path).with_context(|| format!("opening {:?}", &path))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("reading parquet metadata of {:?}", &path))?
                .build()?;
            for batch in reader {
                rows.extend(batch_to_rows(&batch?)?);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl Warehouse for ParquetWarehouse {
    fn name(&self) -> &'static str {
        "Parquet"
    }

    async fn dataset_exists(&self, target: &TableTarget) -> Result<bool> {
        Ok(self.dataset_dir(target).is_dir())
    }

    async fn create_dataset(&self, target: &TableTarget) -> Result<()> {
        let dir = self.dataset_dir(target);
        fs::create_dir_all(&dir).with_context(|| format!("creating dataset dir {:?}", &dir))
    }

    async fn ensure_table(&self, target: &TableTarget, _schema: &[Column]) -> Result<()> {
        let dir = self.table_dir(target);
        fs::create_dir_all(&dir).with_context(|| format!("creating table dir {:?}", &dir))
    }

    async fn append_rows(&self, target: &TableTarget, rows: &[AggregateRow]) -> Result<usize> {
        let path = next_part_path(&self.table_dir(target));
        write_part(&path, rows)?;
        info!(path = %path.display(), rows = rows.len(), "wrote parquet part");
        Ok(rows.len())
    }
}

fn next_part_path(dir: &Path) -> PathBuf {
    let mut ts = Utc::now().timestamp_micros();
    loop {
        let candidate = dir.join(format!("part-{:020}.parquet", ts));
        if !candidate.exists() {
            return candidate;
        }
        ts += 1;
    }
}

fn write_part(path: &Path, rows: &[AggregateRow]) -> Result<()> {
    let schema = build_arrow_schema(OUTPUT_SCHEMA);
    let batch = rows_to_batch(rows)?;

    let file = File::create(path).with_context(|| format!("creating parquet part {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .context("creating Arrow writer for parquet part")?;
    writer.write(&batch).context("writing aggregate batch")?;
    writer.close().context("closing parquet writer")?;
    debug!(path = %path.display(), "closed parquet part");
    Ok(())
}

fn rows_to_batch(rows: &[AggregateRow]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.customer_id.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.avg_amount))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.total_amount))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.median_amount))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.date.as_str()))),
    ];
    RecordBatch::try_new(build_arrow_schema(OUTPUT_SCHEMA), columns)
        .context("building aggregate record batch")
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("parquet part has no usable {:?} column", name))
}

fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<AggregateRow>> {
    let customer = column::<StringArray>(batch, "customerId")?;
    let avg = column::<Float64Array>(batch, "avgAmount")?;
    let total = column::<Int64Array>(batch, "totalAmount")?;
    let median = column::<Float64Array>(batch, "medianAmount")?;
    let date = column::<StringArray>(batch, "date")?;

    Ok((0..batch.num_rows())
        .map(|i| AggregateRow {
            customer_id: customer.value(i).to_string(),
            avg_amount: avg.value(i),
            total_amount: total.value(i),
            median_amount: median.value(i),
            date: date.value(i).to_string(),
        })
        .collect())
}
