use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pm_core::config::AppConfig;
use pm_core::types::Side;
use polymarket::{ClobRestClient, WalletSigner};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "polymarket-cli", about = "Standalone Polymarket CLOB API probe", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of markets
    Markets {
        /// Pagination cursor returned by a previous call
        #[arg(long, short = 'c')]
        cursor: Option<String>,
        /// Only list markets currently accepting orders
        #[arg(long)]
        live: bool,
    },
    /// Show the order book of an outcome token
    Book {
        #[arg(long, short = 't')]
        token_id: String,
    },
    /// Show the best price on one side of the book
    Price {
        #[arg(long, short = 't')]
        token_id: String,
        /// BUY or SELL
        #[arg(long, short = 's', default_value = "BUY")]
        side: Side,
    },
    /// Create or derive CLOB API credentials for PRIVATE_KEY and print them
    DeriveApiKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = AppConfig::load_from_env()?;
    let client = ClobRestClient::from_config(&config)?;

    match cli.command {
        Command::Markets { cursor, live } => {
            let page = if live {
                client.get_sampling_markets(cursor.as_deref()).await?
            } else {
                client.get_markets(cursor.as_deref()).await?
            };
            for market in &page.data {
                println!("{}  {}", market.condition_id, market.question);
            }
            println!(
                "{} markets, next cursor: {}",
                page.data.len(),
                page.next().unwrap_or("<end>")
            );
        }
        Command::Book { token_id } => {
            let book = client.get_order_book(&token_id).await?;
            println!("{}", serde_json::to_string_pretty(&book)?);
            match book.mid_price() {
                Some(mid) => println!("mid: {mid}"),
                None => println!("mid: <one-sided book>"),
            }
        }
        Command::Price { token_id, side } => match client.get_price(&token_id, side).await? {
            Some(price) => println!("{price}"),
            None => println!("no {side} liquidity"),
        },
        Command::DeriveApiKey => {
            let key = config.require_private_key()?;
            let signer = WalletSigner::from_private_key(key.expose(), config.chain_id)
                .context("PRIVATE_KEY is not a usable wallet key")?;
            println!("wallet: {}", signer.address().to_checksum(None));

            let credentials = client
                .with_signer(signer)
                .create_or_derive_api_credentials()
                .await?;
            println!("CLOB_API_KEY={}", credentials.api_key);
            println!("CLOB_SECRET={}", credentials.secret.expose());
            println!("CLOB_PASS_PHRASE={}", credentials.passphrase.expose());
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
