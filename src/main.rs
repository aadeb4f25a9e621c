use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

mod app;
mod audio;
mod bus;
mod config;
mod error;
mod library;
mod remote;
mod runtime;
mod ui;

use remote::{ProxyClient, SessionCredentials};

/// Terminal client for a music library served through an authenticating proxy.
#[derive(Parser, Debug)]
#[command(name = "encore")]
#[command(version)]
struct Cli {
    /// Proxy base URL; overrides `proxy.url` from the config file
    #[arg(long, global = true, env = "ENCORE_PROXY_URL")]
    proxy_url: Option<String>,

    /// Access token; overrides `proxy.token` from the config file
    #[arg(long, global = true, env = "ENCORE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse and play the library (default)
    Play,
    /// Build a metadata document from a local music directory
    Scan {
        dir: PathBuf,
        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a metadata document and publish it through the proxy
    Upload { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = runtime::load_settings();
    if let Some(url) = cli.proxy_url {
        settings.proxy.url = url;
    }
    if let Some(token) = cli.token {
        settings.proxy.token = Some(token);
    }

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            runtime::logging::init_file(&settings.logging)?;
            runtime::run(settings)
        }
        Command::Scan { dir, output } => {
            runtime::logging::init_stderr(&settings.logging)?;
            scan(&settings, &dir, output)
        }
        Command::Upload { path } => {
            runtime::logging::init_stderr(&settings.logging)?;
            upload(&settings, &path)
        }
    }
}

fn scan(settings: &config::Settings, dir: &Path, output: Option<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    let manifest = library::scan(dir, &settings.scan);
    info!(
        albums = manifest.albums.len(),
        tracks = manifest.tracks.len(),
        dir = %dir.display(),
        "scan finished"
    );

    let json = serde_json::to_string_pretty(&manifest).context("serializing metadata")?;
    match output {
        Some(path) => fs::write(&path, json + "\n")
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn upload(settings: &config::Settings, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let credentials = Arc::new(SessionCredentials::new(settings.proxy.token.clone()));
    let client = ProxyClient::new(
        &settings.proxy.url,
        Duration::from_secs(settings.proxy.timeout_secs),
        credentials,
    );

    let manifest = client
        .upload_metadata(&text)
        .with_context(|| format!("uploading {}", path.display()))?;
    info!(
        albums = manifest.albums.len(),
        tracks = manifest.tracks.len(),
        "metadata published"
    );
    Ok(())
}
