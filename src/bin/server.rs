use carelink::config::Config;
use carelink::start_server_with_config;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// CareLink web server
#[derive(Debug, Parser)]
#[command(name = "carelink-server", version, about)]
struct Args {
    /// Configuration file (TOML); missing files are skipped
    #[arg(short, long, default_value = "carelink.toml")]
    config: PathBuf,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("carelink=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let mut config = Config::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server_task = tokio::spawn(start_server_with_config(config, shutdown_rx));

    tokio::select! {
        res = &mut server_task => {
            // Server stopped on its own, e.g. the port was taken
            res??;
        }
        res = tokio::signal::ctrl_c() => {
            res?;
            let _ = shutdown_tx.send(());
            server_task.await??;
        }
    }

    Ok(())
}
