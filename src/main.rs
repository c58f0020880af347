//! Program relay entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use program_relay::api::{start_server, AppState};
use program_relay::config::{LogFormat, RelayConfig, CONFIG_PATH_ENV};
use program_relay::{logging, ProgramGateway, TcpFetcherFactory};

/// Serve the program loaded on a robot controller as JSON.
#[derive(Debug, Parser)]
#[command(name = "program-relay", version, about)]
struct Cli {
    /// TOML config file.
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP listener to.
    #[arg(long)]
    bind: Option<String>,

    /// Port for the HTTP listener.
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds a successful result stays cached.
    #[arg(long)]
    cache_ttl: Option<f64>,

    /// Share one device fetch between concurrent identical requests.
    #[arg(long)]
    coalesce: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ttl) = self.cache_ttl {
            config.cache_ttl_secs = ttl;
        }
        if self.coalesce {
            config.coalesce_fetches = true;
        }
        if self.log_json {
            config.log_format = LogFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let (mut config, ignored) =
        RelayConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("validating configuration")?;

    logging::init(&config.log_level, config.log_format);
    for skipped in &ignored {
        tracing::warn!(
            var = skipped.var,
            value = %skipped.value,
            "Ignoring unparsable environment override"
        );
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %sysinfo::System::host_name().unwrap_or_else(|| "unknown".into()),
        "Starting program relay"
    );

    let factory = Arc::new(TcpFetcherFactory::from_config(&config));
    let gateway = ProgramGateway::from_config(&config, factory);
    start_server(&config, AppState::new(gateway))
        .await
        .context("serving HTTP")?;
    Ok(())
}
