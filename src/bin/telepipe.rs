use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use telepipe::{build_router, init_tracing, HttpExporter, Pipeline};

#[derive(Parser)]
#[command(
    name = "telepipe",
    about = "Minimal telemetry ingestion, batching, and export pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion server
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:4318", env = "TELEPIPE_LISTEN")]
    listen: String,

    /// Path to the config file (defaults to ./telepipe.toml if present)
    #[arg(long, env = "TELEPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the sink endpoint from the config file
    #[arg(long, env = "TELEPIPE_SINK")]
    sink: Option<String>,

    /// Drain deadline when shutting down, in milliseconds
    #[arg(long, default_value_t = 10_000, env = "TELEPIPE_SHUTDOWN_TIMEOUT_MS")]
    shutdown_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => telepipe::load_config_from_path(path)?,
        None => telepipe::try_load_config(),
    };
    if let Some(sink) = args.sink {
        config.sink.endpoint = sink;
    }

    let exporter = Arc::new(HttpExporter::new(&config.sink).map_err(anyhow::Error::msg)?);
    let resource = config.resource.build();
    let pipeline = Arc::new(Pipeline::new(&config, resource, exporter));
    pipeline.start();

    let router = build_router(pipeline.clone());
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    tracing::info!(
        listen = %args.listen,
        sink = %config.sink.endpoint,
        "ingest server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let deadline = Duration::from_millis(args.shutdown_timeout_ms);
    if pipeline.shutdown(deadline).await.is_err() {
        tracing::warn!(
            timeout_ms = args.shutdown_timeout_ms,
            "drain deadline elapsed; remaining records were dropped"
        );
    }

    Ok(())
}
