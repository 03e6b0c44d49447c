use anyhow::{Context, Result};
use clap::Parser;
use internal_ssl::{FixtureConfig, Steps, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Regenerate internal ssl certificates for tests.
///
/// Wipes the store directory, issues a backend and a proxy client
/// certificate from two cross-trusting authorities, then checks them with a
/// mutual TLS ping/pong on loopback.
#[derive(Parser, Debug)]
#[command(name = "make-internal-ssl")]
#[command(version, about)]
struct Args {
    /// Path to a configuration file (YAML).
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Directory to (re)create the certificates in. Everything in it is
    /// deleted first. Defaults to `tests/ssl` under the working directory.
    #[arg(long)]
    ssl_dir: Option<PathBuf>,

    /// Host the responder binds to and the client connects to.
    #[arg(long)]
    host: Option<String>,

    /// Port the responder listens on.
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Reuse the certificates already on disk.
    #[arg(long, conflicts_with = "skip_handshake")]
    skip_provision: bool,

    /// Only generate certificates.
    #[arg(long)]
    skip_handshake: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the progress lines.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        FixtureConfig::load(config_path)
            .with_context(|| format!("failed to load config from {:?}", config_path))?
    } else {
        FixtureConfig::default()
    };
    if let Some(ssl_dir) = args.ssl_dir {
        config.ssl_dir = ssl_dir;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate().context("invalid configuration")?;

    let steps = if args.skip_provision {
        Steps::HandshakeOnly
    } else if args.skip_handshake {
        Steps::ProvisionOnly
    } else {
        Steps::All
    };

    // A single cooperative thread is enough for one exchange.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(internal_ssl::smoke::run(&config, steps, Arc::new(Stdout)))?;

    Ok(())
}
