//! Artifact Keeper Proxy - Main Entry Point

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use artifact_keeper_proxy::{
    cli::{
        runner::{self, ProxyRuntime},
        ProxyCli,
    },
    config::Config,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = ProxyCli::parse();
    let config = Config::from_env_with_path(cli.config.clone())?;
    telemetry::init_tracing(config.log_format, config.log_level.as_deref());

    tracing::info!(
        config = %config.proxy_config_path.display(),
        "Starting Artifact Keeper Proxy"
    );

    let runtime = ProxyRuntime::from_config(&config)
        .await
        .with_context(|| format!("loading {}", config.proxy_config_path.display()))?;

    let ok = runner::run(&runtime, &cli.command, &cli.format).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
