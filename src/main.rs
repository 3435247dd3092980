//! Binary entrypoint: runs one slideshow against the HTTP photo listing and
//! a headless, logging surface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use reqwest::{Client, Url};
use rust_photo_slideshow::config::Configuration;
use rust_photo_slideshow::events::{ControlCommand, DisplayMode, HostSignal};
use rust_photo_slideshow::source::HttpPhotoSource;
use rust_photo_slideshow::surface::HeadlessSurface;
use rust_photo_slideshow::tasks::loader::HttpImageLoader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(name = "photo-slideshow", version, about = "Rotating photo slideshow")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the client identifier sent to the listing service
    #[arg(long, value_name = "ID")]
    client_id: Option<String>,

    /// Force fullscreen mode regardless of the configured position
    #[arg(long)]
    fullscreen: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("rust_photo_slideshow={level}").parse()?)
        .add_directive(format!("photo_slideshow={level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = if cli.config.exists() {
        Configuration::from_yaml_file(&cli.config)
            .with_context(|| format!("loading config from {}", cli.config.display()))?
    } else {
        info!(path = %cli.config.display(), "config file not found; using defaults");
        Configuration::default()
    };
    if let Some(id) = cli.client_id {
        cfg.client_id = id;
    }
    let cfg = cfg.validated().context("validating configuration")?;
    tracing::debug!("configuration: {cfg:#?}");

    let mode = if cli.fullscreen {
        DisplayMode::Fullscreen
    } else {
        cfg.display_mode()
    };

    let client = Client::builder()
        .user_agent(concat!("photo-slideshow/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;
    let endpoint = Url::parse(&cfg.photos_endpoint).context("parsing photos-endpoint")?;
    let image_base = match &cfg.image_base_url {
        Some(base) => Url::parse(base).context("parsing image-base-url")?,
        None => endpoint.clone(),
    };
    let source = HttpPhotoSource::new(client.clone(), endpoint);
    let loader = HttpImageLoader::new(client, image_base);
    let surface = HeadlessSurface::shared(cfg.viewport);

    let (host_tx, host_rx) = mpsc::channel::<HostSignal>(4); // Host -> Fetch
    let (control_tx, control_rx) = mpsc::channel::<ControlCommand>(16); // Host -> Slideshow
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = control_tx.clone();
        tokio::spawn(async move {
            let (mut sigusr1, mut sigusr2) =
                match (signal(SignalKind::user_defined1()), signal(SignalKind::user_defined2())) {
                    (Ok(a), Ok(b)) => (a, b),
                    (Err(err), _) | (_, Err(err)) => {
                        tracing::warn!("failed to register suspend/resume handlers: {err}");
                        return;
                    }
                };
            loop {
                let command = tokio::select! {
                    _ = cancel.cancelled() => break,
                    Some(()) = sigusr1.recv() => ControlCommand::Suspend,
                    Some(()) = sigusr2.recv() => ControlCommand::Resume,
                    else => break,
                };
                tracing::info!(?command, "signal received");
                if control.send(command).await.is_err() {
                    break;
                }
            }
        });
    }

    // The host handshake: announce readiness once.
    host_tx
        .send(HostSignal::Ready(cfg.client_id.clone()))
        .await
        .context("sending ready signal")?;
    info!(client_id = %cfg.client_id, ?mode, "slideshow starting");

    rust_photo_slideshow::run_slideshow(
        &cfg, mode, source, loader, surface, host_rx, control_rx, cancel,
    )
    .await
}
