use anyhow::{Context, Result};
use pm_core::config::AppConfig;
use polymarket_mcp::{build_dispatcher, PolymarketMcpServer};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_from_env()?;
    init_tracing(&config.log_dir)?;

    tracing::info!(
        clob_host = %config.clob_host,
        chain_id = config.chain_id,
        "starting polymarket MCP server"
    );

    let dispatcher = build_dispatcher(&config)
        .await
        .context("polymarket MCP server failed to start")?;

    PolymarketMcpServer::new(dispatcher).serve_stdio().await
}

/// stdout carries the MCP transport, so logs go to stderr and a daily file.
fn init_tracing(log_dir: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("polymarket-mcp-server")
        .build(log_dir)
        .with_context(|| format!("failed to create log directory {log_dir}"))?;

    let writer = std::io::stderr
        .with_max_level(tracing::Level::DEBUG)
        .and(file_appender);

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
