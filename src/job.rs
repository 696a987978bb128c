// src/job.rs

use std::io;
use thiserror::Error;
use tokio::{task, time::Instant};
use tracing::info;

use crate::{
    fetch::{FetchError, RemoteSource},
    load::{persist, TableTarget, Warehouse},
    notify::Notifier,
    process::{reshape, AggregateRow, ReshapeError},
};

/// Which stage of the run failed.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("reshaping export failed: {0}")]
    Reshape(#[from] ReshapeError),

    #[error("loading aggregates failed: {0:#}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub remote_file: String,
    pub bytes: usize,
    pub customers: usize,
    pub rows_appended: usize,
}

/// An export that has been downloaded and reshaped but not loaded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub remote_file: String,
    pub bytes: usize,
    pub rows: Vec<AggregateRow>,
}

/// Fetch, reshape and persist one export, strictly in that order.
///
/// Nothing is written to the warehouse unless the first two stages succeed.
pub async fn run<S, W, N>(
    remote_file: &str,
    source: S,
    warehouse: &W,
    target: &TableTarget,
    notifier: &N,
) -> Result<JobReport, JobError>
where
    S: RemoteSource + Send + 'static,
    W: Warehouse + ?Sized,
    N: Notifier + ?Sized,
{
    let prepared = prepare(remote_file, source, notifier).await?;
    load(prepared, warehouse, target, notifier).await
}

/// Download `remote_file` and turn it into per-customer aggregates.
#[tracing::instrument(level = "info", skip(source, notifier))]
pub async fn prepare<S, N>(remote_file: &str, source: S, notifier: &N) -> Result<Prepared, JobError>
where
    S: RemoteSource + Send + 'static,
    N: Notifier + ?Sized,
{
    let start = Instant::now();

    // ─── 1) fetch ───────────────────────────────────────────────────
    let name = remote_file.to_string();
    let fetched = task::spawn_blocking(move || source.fetch(&name))
        .await
        .unwrap_or_else(|e| Err(FetchError::Io(io::Error::other(e.to_string()))));
    let buffer = match fetched {
        Ok(buf) => buf,
        Err(e) => {
            notifier.notify("fetch", &e);
            return Err(e.into());
        }
    };
    let bytes = buffer.get_ref().len();

    // ─── 2) reshape ─────────────────────────────────────────────────
    let rows = match reshape(buffer) {
        Ok(rows) => rows,
        Err(e) => {
            notifier.notify("reshape", &e);
            return Err(e.into());
        }
    };

    info!(elapsed = ?start.elapsed(), bytes, customers = rows.len(), "export prepared");
    Ok(Prepared {
        remote_file: remote_file.to_string(),
        bytes,
        rows,
    })
}

/// Append prepared aggregates to the warehouse.
#[tracing::instrument(level = "info", skip(prepared, warehouse, notifier), fields(remote_file = %prepared.remote_file, target = %target))]
pub async fn load<W, N>(
    prepared: Prepared,
    warehouse: &W,
    target: &TableTarget,
    notifier: &N,
) -> Result<JobReport, JobError>
where
    W: Warehouse + ?Sized,
    N: Notifier + ?Sized,
{
    // ─── 3) persist ─────────────────────────────────────────────────
    let rows_appended = match persist(warehouse, target, &prepared.rows).await {
        Ok(n) => n,
        Err(e) => return Err(persist_failed(e, notifier)),
    };

    Ok(JobReport {
        remote_file: prepared.remote_file,
        bytes: prepared.bytes,
        customers: prepared.rows.len(),
        rows_appended,
    })
}

/// Report a warehouse-side failure and wrap it.
pub fn persist_failed<N>(err: anyhow::Error, notifier: &N) -> JobError
where
    N: Notifier + ?Sized,
{
    notifier.notify("persist", &format!("{:#}", err));
    JobError::Persist(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{schema::Column, testing::MemoryWarehouse};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        fmt::Display,
        io::Cursor,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    const EXPORT: &str = "\
o1,o2,o3,field
101,101,102,customerId
50,30,20,amount
2024-01-01,2024-01-01,2024-01-02,createdAt
";

    /// Serves files from a map and counts requests.
    #[derive(Clone, Default)]
    struct MapSource {
        files: Arc<HashMap<String, Vec<u8>>>,
        calls: Arc<AtomicUsize>,
    }

    impl MapSource {
        fn with(name: &str, body: &str) -> Self {
            let mut files = HashMap::new();
            files.insert(name.to_string(), body.as_bytes().to_vec());
            Self {
                files: Arc::new(files),
                calls: Arc::default(),
            }
        }
    }

    impl RemoteSource for MapSource {
        fn fetch(&self, remote: &str) -> Result<Cursor<Vec<u8>>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(remote)
                .cloned()
                .map(Cursor::new)
                .ok_or_else(|| FetchError::NotFound(remote.to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, stage: &str, err: &dyn Display) {
            self.seen.lock().unwrap().push(format!("{stage}: {err}"));
        }
    }

    /// Accepts everything except the rows themselves.
    struct RejectingWarehouse;

    #[async_trait]
    impl Warehouse for RejectingWarehouse {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        async fn dataset_exists(&self, _target: &TableTarget) -> Result<bool> {
            Ok(true)
        }

        async fn create_dataset(&self, _target: &TableTarget) -> Result<()> {
            Ok(())
        }

        async fn ensure_table(&self, _target: &TableTarget, _schema: &[Column]) -> Result<()> {
            Ok(())
        }

        async fn append_rows(&self, _target: &TableTarget, _rows: &[AggregateRow]) -> Result<usize> {
            bail!("quota exceeded")
        }
    }

    fn target() -> TableTarget {
        TableTarget {
            dataset: "orders".into(),
            table: "by_customer".into(),
        }
    }

    #[tokio::test]
    async fn test_full_run() {
        let source = MapSource::with("orders_2024-01-01.csv", EXPORT);
        let warehouse = MemoryWarehouse::default();
        let notifier = RecordingNotifier::default();

        let report = run("orders_2024-01-01.csv", source, &warehouse, &target(), &notifier)
            .await
            .unwrap();

        assert_eq!(report.customers, 2);
        assert_eq!(report.rows_appended, 2);
        assert_eq!(report.bytes, EXPORT.len());

        let stored = warehouse.rows(&target());
        assert_eq!(stored[0].customer_id, "101");
        assert_eq!(stored[0].total_amount, 80);
        assert_eq!(stored[1].customer_id, "102");
        assert_eq!(stored[1].total_amount, 20);
        assert!(stored.iter().all(|r| r.date == "2024-01-01"));
        assert!(notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_stops_before_load() {
        let source = MapSource::with("orders_2024-01-01.csv", EXPORT);
        let calls = source.calls.clone();
        let warehouse = MemoryWarehouse::default();
        let notifier = RecordingNotifier::default();

        let err = run("orders_2024-01-02.csv", source, &warehouse, &target(), &notifier)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Fetch(FetchError::NotFound(_))));
        assert_eq!(err.to_string(), "No se encontró orders_2024-01-02.csv");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(warehouse.tables.lock().unwrap().is_empty());
        assert_eq!(*warehouse.create_calls.lock().unwrap(), 0);
        assert_eq!(notifier.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_amount_stops_before_load() {
        let bad = EXPORT.replace("50,30,20", "50,abc,20");
        let source = MapSource::with("f.csv", &bad);
        let warehouse = MemoryWarehouse::default();

        let err = run("f.csv", source, &warehouse, &target(), &RecordingNotifier::default())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Reshape(ReshapeError::InvalidAmount { .. })));
        assert!(warehouse.tables.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_reported_once() {
        let source = MapSource::with("f.csv", EXPORT);
        let notifier = RecordingNotifier::default();

        let err = run("f.csv", source, &RejectingWarehouse, &target(), &notifier)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Persist(_)));
        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("persist: "), "{}", seen[0]);
        assert!(seen[0].contains("quota exceeded"), "{}", seen[0]);
    }
}
