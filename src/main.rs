//! weather-mcp: serve the `get weather` tool over stdio.
//!
//! Usage:
//!   weather-mcp                      Serve MCP on stdin/stdout
//!   weather-mcp --list-tools         Print tool descriptors and exit
//!   RUST_LOG=debug weather-mcp       Verbose logs (always on stderr)

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use weather_mcp::{
    default_registry, stdio, McpServer, OpenMeteoClient, ServerConfig, ToolPipeline,
    WeatherConfig,
};

#[derive(Parser, Debug)]
#[command(name = "weather-mcp", version, about = "MCP tool server for weather lookups")]
struct Cli {
    /// Geocoding endpoint
    #[arg(long, env = "WEATHER_MCP_GEOCODING_URL", default_value = weather_mcp::config::DEFAULT_GEOCODING_URL)]
    geocoding_url: String,

    /// Forecast endpoint
    #[arg(long, env = "WEATHER_MCP_FORECAST_URL", default_value = weather_mcp::config::DEFAULT_FORECAST_URL)]
    forecast_url: String,

    /// Per-request timeout for outbound calls, in seconds
    #[arg(long, env = "WEATHER_MCP_TIMEOUT_SECS", default_value_t = 10.0)]
    timeout_secs: f64,

    /// Largest accepted request line, in bytes
    #[arg(long, env = "WEATHER_MCP_MAX_FRAME_BYTES", default_value_t = weather_mcp::transport::DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,

    /// Print the tool descriptors as JSON and exit
    #[arg(long)]
    list_tools: bool,
}

impl Cli {
    fn config(&self) -> Result<ServerConfig> {
        let timeout = Duration::try_from_secs_f64(self.timeout_secs)
            .context("timeout must be a non-negative number of seconds")?;
        Ok(ServerConfig {
            max_frame_bytes: self.max_frame_bytes,
            weather: WeatherConfig {
                geocoding_url: self.geocoding_url.clone(),
                forecast_url: self.forecast_url.clone(),
                timeout,
            },
            ..ServerConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let api = OpenMeteoClient::new(config.weather.clone()).context("failed to build HTTP client")?;
    let registry = default_registry(api).context("failed to register tools")?;
    let server = McpServer::new(&config, ToolPipeline::new(registry));

    if cli.list_tools {
        let tools = serde_json::to_string_pretty(&server.tools().list())?;
        println!("{tools}");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                cancel.cancel();
            }
        }
    });

    info!(
        name = %config.name,
        version = %config.version,
        timeout_secs = cli.timeout_secs,
        "serving on stdio"
    );
    let transport = stdio().with_max_frame_bytes(config.max_frame_bytes);
    let reason = server
        .serve_with_cancel(transport, cancel)
        .await
        .context("session ended on a framing error")?;
    info!(?reason, "bye");

    Ok(())
}
