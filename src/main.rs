// media-info CLI - run the extraction pipeline against a local file

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use media_info_lib::mediainfo::tools::{install_dir, ProbeInstaller};
use media_info_lib::{
    render, CatalogEntry, LocalFileTransport, MediaInfoConfig, MediaInfoExtractor, MemoryCatalog,
};

#[derive(Parser, Debug)]
#[command(name = "media-info")]
#[command(about = "Inspect a media file from its first bytes", long_about = None)]
struct Cli {
    /// File to inspect
    path: PathBuf,

    /// Display name (defaults to the file name)
    #[arg(long)]
    name: Option<String>,

    /// Declared MIME type, as a chat catalog would store it
    #[arg(long)]
    mime: Option<String>,

    /// Download a static ffprobe first if none is installed
    #[arg(long)]
    install_ffprobe: bool,

    /// Proxy for the ffprobe download (http, https or socks5)
    #[arg(long)]
    proxy: Option<String>,

    /// Print the record as JSON instead of the chat message
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = MediaInfoConfig::from_env();

    if cli.install_ffprobe && config.ffprobe_path.is_none() {
        let tool = ProbeInstaller::new(install_dir())
            .with_proxy(cli.proxy.clone())
            .ensure()
            .await?;
        info!(path = ?tool.path, version = ?tool.version, "using ffprobe");
        config = config.with_ffprobe_path(tool.path);
    }

    let file_id = cli
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| format!("not a file path: {}", cli.path.display()))?;
    let root = cli
        .path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let display_name = cli.name.unwrap_or_else(|| file_id.clone());
    let file_size = tokio::fs::metadata(&cli.path).await?.len();

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.insert(
        file_id.clone(),
        CatalogEntry {
            file_name: display_name.clone(),
            file_size: Some(file_size),
            mime_type: cli.mime,
        },
    );

    let extractor = MediaInfoExtractor::new(config, catalog);
    let transport = LocalFileTransport::new(root);
    let record = extractor.extract(&transport, &file_id, &display_name).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(record.as_ref())?);
    } else {
        println!("{}", render(&record, &display_name));
    }
    Ok(())
}
