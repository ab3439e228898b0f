//! `tuskit`: upload a file to a tus server, resuming where a previous run
//! stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tuskit_engine::{CreateOptions, UploadEvent, UploadManager};

mod config;

#[derive(Parser, Debug)]
#[command(name = "tuskit", version, about = "Resumable uploads to a tus server")]
struct Cli {
    /// File to upload, as a path or `file://` URL.
    source: String,

    /// Upload creation endpoint.
    #[arg(short, long)]
    endpoint: String,

    /// Extra request header as `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Upload metadata as `key=value`. Repeatable.
    #[arg(short, long = "meta", value_parser = parse_metadata)]
    metadata: Vec<(String, String)>,

    /// JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bytes per chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Resumption store file.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Remove the resumption record once the upload succeeds.
    #[arg(long)]
    forget: bool,

    /// Print events as JSON lines.
    #[arg(long)]
    json: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {raw:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_metadata(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `key=value`, got {raw:?}"))?;
    Ok((key.to_string(), value.to_string()))
}

fn create_options(cli: &Cli) -> CreateOptions {
    let mut options = CreateOptions::new(&cli.endpoint);
    for (name, value) in &cli.headers {
        options = options.header(name, value);
    }
    for (key, value) in &cli.metadata {
        options = options.metadata(key, value);
    }
    if !options.metadata.contains_key("filename") {
        if let Some(name) = Path::new(&cli.source).file_name().and_then(|n| n.to_str()) {
            options = options.metadata("filename", name);
        }
    }
    options
}

fn print_event(event: &UploadEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        UploadEvent::Progress {
            bytes_written,
            bytes_total,
            ..
        } => {
            let pct = if *bytes_total == 0 {
                100.0
            } else {
                *bytes_written as f64 * 100.0 / *bytes_total as f64
            };
            println!("{bytes_written}/{bytes_total} bytes ({pct:.1}%)");
        }
        UploadEvent::Success { upload_url, .. } => println!("uploaded: {upload_url}"),
        UploadEvent::Error { error, .. } => eprintln!("upload failed: {error}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut engine_config = config::load(cli.config.as_deref())?;
    if let Some(chunk_size) = cli.chunk_size {
        engine_config.chunk_size = chunk_size;
    }
    if let Some(store) = &cli.store {
        engine_config.store_path = Some(store.clone());
    }
    if cli.forget {
        engine_config.remove_fingerprint_on_success = true;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = UploadManager::from_config(engine_config, Arc::new(tx))
        .context("initializing upload engine")?;
    let id = manager.start(&cli.source, &create_options(&cli))?;
    info!(upload_id = %id, "upload started");

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    bail!("event channel closed");
                };
                print_event(&event, cli.json)?;
                match event {
                    UploadEvent::Success { .. } => return Ok(()),
                    UploadEvent::Error { error, .. } => bail!(error),
                    UploadEvent::Progress { .. } => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted, stopping at the next chunk boundary");
                manager.abort(&id).await?;
                let offset = manager.registry().get(&id).map(|e| e.offset()).unwrap_or(0);
                eprintln!("stopped at {offset} bytes; run again to resume");
                return Ok(());
            }
        }
    }
}
