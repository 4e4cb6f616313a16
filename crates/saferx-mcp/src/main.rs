use anyhow::Context as _;
use clap::Parser;
use saferx_mcp::client::{SafeRxClient, SafetyBackend};
use saferx_mcp::observability::{LogFormat, init_tracing};
use saferx_mcp::{AdapterConfig, SafetyTools, StdioServer};
use std::sync::Arc;
use tracing::{error, info};

/// MCP server exposing the SafeRx drug safety API over stdio.
#[derive(Debug, Parser)]
#[command(name = "saferx-mcp", version, about)]
struct Args {
    /// SafeRx API key.
    #[arg(long, env = "SAFERX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// SafeRx API base URL (defaults to the production endpoint).
    #[arg(long, env = "SAFERX_BASE_URL")]
    base_url: Option<String>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "SAFERX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "SAFERX_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    let config = AdapterConfig::new(args.api_key, args.base_url)?;
    let base_url = config.base_url().to_string();

    let backend: Arc<dyn SafetyBackend> =
        Arc::new(SafeRxClient::new(config).context("build SafeRx HTTP client")?);

    let mut server = StdioServer::new();
    SafetyTools::new(backend)
        .register(&mut server)
        .context("register tools")?;

    info!(base_url = %base_url, "SafeRx MCP server running on stdio");
    if let Err(e) = server.serve_stdio().await {
        error!(error = %e, "Fatal");
        // The blocking stdin reader cannot be cancelled and would keep the runtime alive.
        std::process::exit(1);
    }
    info!("stdin closed, shutting down");
    Ok(())
}
