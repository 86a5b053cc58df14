use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use cardsheet::client::{IngestClient, SheetClient};
use cardsheet::config::Config;
use cardsheet::logging;
use cardsheet::pipeline::Pipeline;
use cardsheet::sink::{
    create_output_file, CsvSink, JsonSink, LogStatus, RecordSink, StatusLevel, StatusSink,
    TableSink,
};

#[derive(Parser)]
#[command(name = "cardsheet")]
#[command(about = "Trading-card image ingester and sheet-export pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the sheet export and render the normalized records
    Fetch {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload a card image for evaluation, then refresh the records
    Upload {
        /// Path to the image file
        image: PathBuf,
        /// Skip the follow-up fetch after a successful upload
        #[arg(long)]
        no_refresh: bool,
    },
}

fn make_sink(format: OutputFormat, output: Option<&PathBuf>) -> anyhow::Result<Box<dyn RecordSink>> {
    let writer: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(create_output_file(path)?),
        None => Box::new(std::io::stdout()),
    };
    Ok(match format {
        OutputFormat::Table => Box::new(TableSink::new(writer)),
        OutputFormat::Json => Box::new(JsonSink::new(writer)),
        OutputFormat::Csv => Box::new(CsvSink::new(writer)),
    })
}

async fn fetch(config: &Config, format: OutputFormat, output: Option<PathBuf>) -> anyhow::Result<()> {
    let sink = make_sink(format, output.as_ref())?;
    let status = LogStatus;
    let pipeline = Pipeline::new(SheetClient::new(config.export_url()));

    let summary = pipeline.run(sink.as_ref(), &status).await?;
    info!(
        "Fetch complete: seq={} rows={} columns={}",
        summary.seq, summary.rows, summary.columns
    );
    Ok(())
}

async fn upload(config: &Config, image: PathBuf, no_refresh: bool) -> anyhow::Result<()> {
    let status = LogStatus;
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("failed to read image {}", image.display()))?;

    status.status(StatusLevel::Info, "Evaluating & saving...");
    let client = IngestClient::new(config.ingest_url.clone());
    let ack = client.ingest_image(&bytes).await?;
    status.status(StatusLevel::Success, ack.trim());

    if no_refresh {
        return Ok(());
    }

    // Give the evaluation service a moment to append its row.
    status.status(StatusLevel::Info, "Saved. Refreshing results...");
    tokio::time::sleep(std::time::Duration::from_millis(config.refresh_delay_ms)).await;
    fetch(config, OutputFormat::Table, None).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Fetch { format, output } => fetch(&config, format, output).await,
        Commands::Upload { image, no_refresh } => upload(&config, image, no_refresh).await,
    }
}
