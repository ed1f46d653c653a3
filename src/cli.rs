use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crm_snapshot_core::{EntityLocks, ObjectStoreBuckets, Pipeline, SystemClock};

use crate::crm_client::BitrixClient;
use crate::load_config::{load_config, AppConfig};
use crate::server::{serve, SuccessResponse};

/// CLI for crm-snapshot: publish CRM snapshots to object storage.
#[derive(Parser)]
#[clap(
    name = "crm-snapshot",
    version,
    about = "Pull CRM records, decode custom fields and publish Parquet snapshots to GCS"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP trigger; every `GET /` runs the pipeline once
    Serve {
        /// Port to listen on
        #[clap(long, env = "PORT", default_value_t = 8080)]
        port: u16,
        /// Optional YAML config file (column renames, window, prefix)
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Run the pipeline once and print the summary as JSON
    Run {
        /// Optional YAML config file (column renames, window, prefix)
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Construct the production pipeline: Bitrix over HTTP, GCS storage, wall clock.
pub fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let crm = BitrixClient::new(
        config.endpoints.clone(),
        config.page_size,
        config.column_renames.clone(),
    )
    .context("failed to build HTTP client")?;
    let storage = ObjectStoreBuckets::gcs(config.buckets())?;

    Ok(Pipeline::new(
        Arc::new(crm),
        Arc::new(storage),
        Arc::new(SystemClock),
        EntityLocks::new(),
        config.pipeline_settings(),
    ))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { port, config } => {
            let config = load_config(config.as_deref())?;
            let pipeline = Arc::new(build_pipeline(&config)?);
            serve(pipeline, port).await
        }
        Commands::Run { config } => {
            let config = load_config(config.as_deref())?;
            let pipeline = build_pipeline(&config)?;
            match pipeline.run().await {
                Ok(report) => {
                    let summary = SuccessResponse::from(&report);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
                Err(failure) => {
                    eprintln!("[ERROR] Run failed at {}: {}", failure.step, failure.source);
                    eprintln!(
                        "[ERROR] Completed before failure: {}",
                        serde_json::to_string(&failure.completed)?
                    );
                    Err(anyhow::Error::new(failure))
                }
            }
        }
    }
}
