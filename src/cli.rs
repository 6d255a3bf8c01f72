/// CLI glue for uti-sli: argument parsing and wiring of the local
/// collaborators into the [`SliPipeline`].
///
/// For programmatic/integration use, call [`run`] with a constructed [`Cli`].
use crate::config::{load_config, ConverterKind};
use crate::contract::PdfConverter;
use crate::local::{JsonOrderStore, LocalFilePersistence};
use crate::model::Bulk;
use crate::pdf::{PrintPdfConverter, WkhtmltopdfConverter};
use crate::pipeline::{Exporter, SliPipeline};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for uti-sli: generate the Shipper's Letter of Instruction of a bulk.
#[derive(Parser)]
#[clap(
    name = "uti-sli",
    version,
    about = "Generate the UTi Shipper's Letter of Instruction (SLI) PDF for an air-freight bulk"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the SLI for a bulk, persist it and print the updated bulk
    Render {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Bulk record (JSON)
        #[clap(long)]
        bulk: PathBuf,
        /// Orders export (JSON array)
        #[clap(long)]
        orders: PathBuf,
        /// Master air waybill number to put on the document
        #[clap(long)]
        mawb: Option<String>,
        /// Write the updated bulk here instead of stdout
        #[clap(long)]
        out_bulk: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render {
            config,
            bulk,
            orders,
            mawb,
            out_bulk,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "render", "Starting SLI generation");

            let raw_bulk = tokio::fs::read_to_string(&bulk)
                .await
                .with_context(|| format!("Failed to read bulk file {}", bulk.display()))?;
            let mut bulk: Bulk =
                serde_json::from_str(&raw_bulk).context("Failed to parse bulk JSON")?;

            let store = JsonOrderStore::from_file(&orders)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load orders {}: {e}", orders.display()))?;
            let persistence = LocalFilePersistence::new(config.output_dir.clone());
            let converter: Box<dyn PdfConverter> = match config.converter {
                ConverterKind::PrintPdf => Box::new(PrintPdfConverter::default()),
                ConverterKind::Wkhtmltopdf => Box::new(
                    config
                        .wkhtmltopdf_path
                        .clone()
                        .map(WkhtmltopdfConverter::new)
                        .unwrap_or_default(),
                ),
            };

            let pipeline = SliPipeline::from_config(&config, store, persistence, converter);
            let report = match pipeline.create_files(&mut bulk, mawb).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "render", code = e.code(), error = %e, "SLI generation failed");
                    return Err(anyhow::Error::new(e));
                }
            };
            let bulk = pipeline.send_files(bulk).await?;

            eprintln!(
                "SLI created: {} (file id {}, {} bytes)",
                report.filename, report.file_id, report.size_bytes
            );

            let updated = serde_json::to_string_pretty(&bulk)?;
            match out_bulk {
                Some(path) => tokio::fs::write(&path, updated)
                    .await
                    .with_context(|| format!("Failed to write bulk to {}", path.display()))?,
                None => println!("{updated}"),
            }
            tracing::info!(command = "render", ?report, "SLI generation complete");
            Ok(())
        }
    }
}
