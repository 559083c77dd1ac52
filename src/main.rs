use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rexecd::config::Configuration;
use rexecd::jobs::run_sweeper;
use rexecd::server::{self, AppState};
use rexecd::shutdown;

#[derive(Parser, Debug)]
#[command(name = "rexecd")]
#[command(version)]
#[command(about = "Expose configured shell commands as HTTP-triggered, queryable jobs")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Configuration::load(&args.config).await?;
    let addr: SocketAddr = config.listen_address.parse()?;

    tracing::info!(
        config = %args.config.display(),
        listen_addr = %addr,
        endpoints = config.endpoints.len(),
        "starting rexecd"
    );
    for endpoint in &config.endpoints {
        tracing::info!(
            path = %endpoint.path,
            command = %endpoint.command,
            args = ?endpoint.args,
            allow_multi = endpoint.allow_multi,
            "registered endpoint"
        );
    }

    let state = AppState::new(args.config.clone(), config);
    let shutdown = shutdown::shutdown_token();

    tokio::spawn(run_sweeper(
        state.jobs.clone(),
        state.config.clone(),
        shutdown.clone(),
    ));

    server::serve(addr, state, shutdown).await?;
    tracing::info!("shutdown complete");
    Ok(())
}
