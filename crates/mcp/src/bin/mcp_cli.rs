use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pm_core::config::AppConfig;
use polymarket_mcp::{build_dispatcher, ToolInvocation, ToolRegistry};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mcp-cli", about = "Run Polymarket MCP tools without an MCP client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tools enabled by the current configuration
    List {
        /// Print each tool's input schema as well
        #[arg(long, default_value_t = false)]
        schemas: bool,
    },
    /// Call one tool in-process through the same dispatcher the server uses
    Call {
        /// Tool name, e.g. get_order_book
        #[arg(long, short = 't')]
        tool: String,
        /// JSON arguments object
        #[arg(long, short = 'p', default_value = "null")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = AppConfig::load_from_env()?;

    match cli.command {
        Command::List { schemas } => {
            let registry = ToolRegistry::from_selection(&config.tools)?;
            for tool in registry.enabled() {
                println!("{:<22} {:<11} {}", tool.as_str(), format!("{:?}", tool.access()), tool.description());
                if schemas {
                    println!("{}", serde_json::to_string_pretty(tool.input_schema().as_ref())?);
                }
            }
        }
        Command::Call { tool, payload } => {
            let dispatcher = build_dispatcher(&config).await?;
            let invocation = ToolInvocation {
                tool,
                payload: parse_json(&payload, "payload")?,
            };

            let reply = dispatcher.invoke(&invocation).await;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            if reply.is_error() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .is_err()
    {
        // tracing already initialised; ignore.
    }
    Ok(())
}

fn parse_json(input: &str, field: &str) -> Result<Value> {
    serde_json::from_str(input).with_context(|| format!("{field} is not valid JSON: {input}"))
}
