//! Load every CSV file in a Google Drive folder into a BigQuery table.

#![warn(rust_2018_idioms, unused_extern_crates, clippy::all)]

use anyhow::{Context as _, Result};
use clap::Parser;
use drive2bq::{
    config::{Configuration, Overrides, Settings},
    drivers,
    logging::LogFormat,
    pipeline::{self, PipelineOptions, RunReport},
    Context,
};
use std::{path::PathBuf, process};
use tracing::{debug, error, info, Instrument};

/// Command-line options, parsed using `clap`.
#[derive(Debug, Parser)]
#[command(
    name = "drive2bq",
    version,
    about = "Load CSV files from a Google Drive folder into a BigQuery table."
)]
struct Opt {
    /// Path to a drive2bq.toml configuration file.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// The Drive folder to read, overriding drive.folder_id.
    #[arg(long = "folder-id", value_name = "ID")]
    folder_id: Option<String>,

    /// The destination dataset, overriding bigquery.dataset.
    #[arg(long = "dataset", value_name = "NAME")]
    dataset: Option<String>,

    /// The destination table, overriding bigquery.table.
    #[arg(long = "table", value_name = "NAME")]
    table: Option<String>,

    /// Log format: full or compact. Use RUST_LOG to choose log levels.
    #[arg(long = "log-format", default_value = "full")]
    log_format: LogFormat,
}

fn main() {
    let opt = Opt::parse();
    let dispatch = opt.log_format.dispatch();
    let _guard = tracing::dispatcher::set_default(&dispatch);
    debug!("{:?}", opt);

    let succeeded = match run(opt) {
        Ok(report) => report.succeeded(),
        Err(err) => {
            error!("{:#}", err);
            false
        }
    };
    if !succeeded {
        process::exit(1);
    }
}

/// Set everything up and run the pipeline once.
fn run(opt: Opt) -> Result<RunReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start async runtime")?;
    runtime.block_on(run_async(opt))
}

/// Load our settings, connect to Google Cloud and run.
async fn run_async(opt: Opt) -> Result<RunReport> {
    let ctx = Context::create();
    let span = ctx.span().clone();
    async move {
        info!("starting run {}", ctx.run_id());
        let config = match &opt.config {
            Some(path) => Configuration::from_path(path)?,
            None => Configuration::try_default()?,
        };
        debug!("using configuration from {}", config.path().display());
        let overrides = Overrides {
            folder_id: opt.folder_id,
            dataset: opt.dataset,
            table: opt.table,
        };
        let settings = Settings::from_config(&config, &overrides)?;
        let (storage, warehouse) = drivers::connect(&settings)
            .await
            .context("could not connect to Google Cloud")?;

        let opts = PipelineOptions::from(&settings);
        Ok(pipeline::run(&ctx, &storage, &warehouse, &opts).await)
    }
    .instrument(span)
    .await
}
