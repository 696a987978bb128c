// src/load/bigquery.rs

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use google_cloud_bigquery::{
    client::{google_cloud_auth::credentials::CredentialsFile, Client, ClientConfig},
    http::{
        dataset::{Dataset, DatasetReference},
        error::Error as BqError,
        table::{Table, TableFieldMode, TableFieldSchema, TableFieldType, TableReference, TableSchema},
        tabledata::insert_all::{InsertAllRequest, Row},
    },
};
use tracing::{debug, info, warn};

use super::{
    schema::{Column, ColumnType},
    TableTarget, Warehouse,
};
use crate::{config::WarehouseConfig, process::AggregateRow};

/// Rows per `insertAll` call; the service caps a request at 50,000 rows and ~10 MB.
const INSERT_BATCH_ROWS: usize = 500;

/// Appends aggregates to BigQuery through the streaming insert API.
///
/// A table created moments earlier by `ensure_table` can reject streamed
/// rows for a short while until the service propagates it.
pub struct BigQueryWarehouse {
    client: Client,
    project: String,
}

impl BigQueryWarehouse {
    /// Authenticate with the configured key file when it exists, falling back
    /// to application-default credentials. `GCP_PROJECT` wins over the
    /// project baked into the credentials.
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        let (client_config, creds_project) = if config.credentials_path.is_file() {
            let path = config.credentials_path.to_string_lossy().to_string();
            debug!(%path, "using service account key");
            let creds = CredentialsFile::new_from_file(path.clone())
                .await
                .with_context(|| format!("reading credentials file {}", path))?;
            ClientConfig::new_with_credentials(creds)
                .await
                .context("authenticating BigQuery client")?
        } else {
            warn!(
                path = %config.credentials_path.display(),
                "credentials file not found, using application default credentials"
            );
            ClientConfig::new_with_auth()
                .await
                .context("authenticating BigQuery client")?
        };

        let project = config
            .project
            .clone()
            .or(creds_project)
            .ok_or_else(|| anyhow!("GCP_PROJECT is not set and the credentials carry no project"))?;

        let client = Client::new(client_config)
            .await
            .context("creating BigQuery client")?;
        info!(%project, "connected to BigQuery");
        Ok(Self { client, project })
    }
}

fn is_not_found(err: &BqError) -> bool {
    matches!(err, BqError::Response(resp) if resp.code == 404)
}

fn field_type(ty: ColumnType) -> TableFieldType {
    match ty {
        ColumnType::String => TableFieldType::String,
        ColumnType::Int64 => TableFieldType::Int64,
        ColumnType::Float64 => TableFieldType::Float64,
    }
}

fn table_schema(schema: &[Column]) -> TableSchema {
    TableSchema {
        fields: schema
            .iter()
            .map(|col| TableFieldSchema {
                name: col.name.to_string(),
                data_type: field_type(col.ty),
                mode: Some(TableFieldMode::Required),
                ..Default::default()
            })
            .collect(),
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn name(&self) -> &'static str {
        "BigQuery"
    }

    async fn dataset_exists(&self, target: &TableTarget) -> Result<bool> {
        match self.client.dataset().get(&self.project, &target.dataset).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dataset(&self, target: &TableTarget) -> Result<()> {
        let dataset = Dataset {
            dataset_reference: DatasetReference {
                project_id: self.project.clone(),
                dataset_id: target.dataset.clone(),
            },
            ..Default::default()
        };
        self.client.dataset().create(&dataset).await?;
        info!(dataset = %target.dataset, "created dataset");
        Ok(())
    }

    async fn ensure_table(&self, target: &TableTarget, schema: &[Column]) -> Result<()> {
        match self
            .client
            .table()
            .get(&self.project, &target.dataset, &target.table)
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }

        let table = Table {
            table_reference: TableReference {
                project_id: self.project.clone(),
                dataset_id: target.dataset.clone(),
                table_id: target.table.clone(),
            },
            schema: Some(table_schema(schema)),
            ..Default::default()
        };
        self.client.table().create(&table).await?;
        info!(table = %target, "created table");
        Ok(())
    }

    async fn append_rows(&self, target: &TableTarget, rows: &[AggregateRow]) -> Result<usize> {
        let mut appended = 0;
        for request in insert_requests(rows, INSERT_BATCH_ROWS) {
            let batch = request.rows.len();
            let response = self
                .client
                .tabledata()
                .insert(&self.project, &target.dataset, &target.table, &request)
                .await
                .with_context(|| format!("inserting rows {}..{}", appended, appended + batch))?;

            if let Some(errors) = response.insert_errors {
                if !errors.is_empty() {
                    bail!(
                        "BigQuery rejected {} of {} rows after {} were appended",
                        errors.len(),
                        batch,
                        appended
                    );
                }
            }
            appended += batch;
            debug!(appended, total = rows.len(), "inserted batch");
        }
        Ok(appended)
    }
}

/// Split `rows` into streaming-insert requests of at most `batch_rows` rows.
///
/// No insert ids are set, so BigQuery never deduplicates re-runs.
fn insert_requests(rows: &[AggregateRow], batch_rows: usize) -> Vec<InsertAllRequest<AggregateRow>> {
    rows.chunks(batch_rows.max(1))
        .map(|chunk| InsertAllRequest {
            rows: chunk
                .iter()
                .cloned()
                .map(|json| Row {
                    insert_id: None,
                    json,
                })
                .collect(),
            ..Default::default()
        })
        .collect()
}
