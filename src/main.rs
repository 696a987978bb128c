use anyhow::Result;
use chrono::Local;
use clap::Parser;
use orders_etl::{
    cli::{self, Args},
    config::Config,
    fetch::SftpSource,
    job::{self, JobError},
    load::{BigQueryWarehouse, ParquetWarehouse, TableTarget, Warehouse},
    notify::LogNotifier,
};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) validate the run date before touching anything remote ───
    let args = Args::parse();
    let date = match cli::resolve_date(args.date.as_deref(), Local::now().date_naive()) {
        Ok(d) => d,
        Err(_) => {
            println!("{}", cli::DATE_FORMAT_ERROR);
            return Ok(ExitCode::FAILURE);
        }
    };
    let remote_file = cli::remote_file_name(&date);
    info!(%date, %remote_file, "startup");

    // ─── 3) configuration ────────────────────────────────────────────
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            println!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let notifier = LogNotifier;

    // ─── 4) fetch + reshape ──────────────────────────────────────────
    let source = SftpSource::new(config.sftp.clone());
    let prepared = match job::prepare(&remote_file, source, &notifier).await {
        Ok(p) => p,
        Err(JobError::Fetch(e)) => {
            println!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    // ─── 5) load ─────────────────────────────────────────────────────
    let target = TableTarget::from_config(&config.warehouse);
    let warehouse: Box<dyn Warehouse> = match &args.parquet_dir {
        Some(dir) => Box::new(ParquetWarehouse::new(dir)?),
        None => match BigQueryWarehouse::connect(&config.warehouse).await {
            Ok(w) => Box::new(w),
            Err(e) => return Err(job::persist_failed(e, &notifier).into()),
        },
    };

    match job::load(prepared, warehouse.as_ref(), &target, &notifier).await {
        Ok(report) => {
            info!(
                remote_file = %report.remote_file,
                customers = report.customers,
                rows_appended = report.rows_appended,
                "all done"
            );
            Ok(ExitCode::SUCCESS)
        }
        // already reported by the notifier
        Err(e) => Err(e.into()),
    }
}
