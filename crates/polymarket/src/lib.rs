pub mod auth;
pub mod chain;
pub mod client;
pub mod data;
mod eip712;
pub mod error;
pub mod gamma;
pub mod models;
pub mod order;

pub use auth::WalletSigner;
pub use chain::UsdcBalanceReader;
pub use client::{is_not_found, ClobRestClient};
pub use data::{ClosedPosition, DataApiClient, PortfolioValue, Position, Trade};
pub use error::PolymarketError;
pub use gamma::{GammaClient, GammaMarket};
pub use models::{
    CancelOrderResponse, Market, MarketToken, MarketsPage, OrderBook, PostOrderResponse,
    PriceLevel,
};
pub use order::{OrderArgs, SignedOrder};
