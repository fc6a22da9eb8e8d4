use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use pm_core::config::ToolSelection;
use rmcp::model::{JsonObject, Tool};
use rmcp::schemars::{self, JsonSchema};
use serde_json::Value;

use crate::account::{PortfolioValueRequest, UserActivityRequest};
use crate::market::{
    GetMarketRequest, GetMarketsRequest, PriceRequest, SearchMarketsRequest, TokenRequest,
};
use crate::trade::{CancelOrderRequest, PlaceLimitOrderRequest, PlaceMarketOrderRequest};
use crate::types::NoArguments;

/// What a tool needs from the configured credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// Public reads, no credentials.
    MarketData,
    /// Needs the wallet address from the private key.
    Wallet,
    /// Needs the private key and level-2 API credentials.
    Trading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
    GetMarkets,
    SearchMarkets,
    GetMarket,
    GetOrderBook,
    GetMidPrice,
    GetPrice,
    PlaceLimitOrder,
    PlaceMarketOrder,
    CancelOrder,
    GetUsdcBalance,
    GetPositions,
    GetClosedPositions,
    GetTrades,
    GetPortfolioValue,
}

impl ToolName {
    pub const ALL: [ToolName; 14] = [
        ToolName::GetMarkets,
        ToolName::SearchMarkets,
        ToolName::GetMarket,
        ToolName::GetOrderBook,
        ToolName::GetMidPrice,
        ToolName::GetPrice,
        ToolName::PlaceLimitOrder,
        ToolName::PlaceMarketOrder,
        ToolName::CancelOrder,
        ToolName::GetUsdcBalance,
        ToolName::GetPositions,
        ToolName::GetClosedPositions,
        ToolName::GetTrades,
        ToolName::GetPortfolioValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetMarkets => "get_markets",
            ToolName::SearchMarkets => "search_markets",
            ToolName::GetMarket => "get_market",
            ToolName::GetOrderBook => "get_order_book",
            ToolName::GetMidPrice => "get_mid_price",
            ToolName::GetPrice => "get_price",
            ToolName::PlaceLimitOrder => "place_limit_order",
            ToolName::PlaceMarketOrder => "place_market_order",
            ToolName::CancelOrder => "cancel_order",
            ToolName::GetUsdcBalance => "get_usdc_balance",
            ToolName::GetPositions => "get_positions",
            ToolName::GetClosedPositions => "get_closed_positions",
            ToolName::GetTrades => "get_trades",
            ToolName::GetPortfolioValue => "get_portfolio_value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::GetMarkets => {
                "List one page of Polymarket markets from the CLOB. Set active_only to keep live markets; pass next_cursor to page."
            }
            ToolName::SearchMarkets => {
                "Search live Polymarket markets whose question contains the query (case-insensitive)."
            }
            ToolName::GetMarket => "Get a market by slug from the Gamma API, with outcomes, prices and CLOB token ids.",
            ToolName::GetOrderBook => "Get the current order book (bids and asks) for a token.",
            ToolName::GetMidPrice => "Get the mid price of a token from its order book: (best bid + best ask) / 2.",
            ToolName::GetPrice => "Get the best price for a token on the BUY or SELL side.",
            ToolName::PlaceLimitOrder => "Place a signed limit order (GTC by default) on the Polymarket CLOB.",
            ToolName::PlaceMarketOrder => {
                "Place a market order priced against the current book. size is USDC to spend for BUY and shares for SELL."
            }
            ToolName::CancelOrder => "Cancel an open order by its order id.",
            ToolName::GetUsdcBalance => "Get the USDC balance of the configured wallet on Polygon.",
            ToolName::GetPositions => "Get open positions for a wallet (defaults to the configured wallet).",
            ToolName::GetClosedPositions => "Get closed positions for a wallet (defaults to the configured wallet).",
            ToolName::GetTrades => "Get recent trades for a wallet (defaults to the configured wallet).",
            ToolName::GetPortfolioValue => "Get the total value of a wallet's open positions (defaults to the configured wallet).",
        }
    }

    pub fn access(&self) -> AccessClass {
        match self {
            ToolName::PlaceLimitOrder | ToolName::PlaceMarketOrder | ToolName::CancelOrder => {
                AccessClass::Trading
            }
            ToolName::GetUsdcBalance => AccessClass::Wallet,
            _ => AccessClass::MarketData,
        }
    }

    pub fn input_schema(&self) -> Arc<JsonObject> {
        match self {
            ToolName::GetMarkets => schema_for::<GetMarketsRequest>(),
            ToolName::SearchMarkets => schema_for::<SearchMarketsRequest>(),
            ToolName::GetMarket => schema_for::<GetMarketRequest>(),
            ToolName::GetOrderBook | ToolName::GetMidPrice => schema_for::<TokenRequest>(),
            ToolName::GetPrice => schema_for::<PriceRequest>(),
            ToolName::PlaceLimitOrder => schema_for::<PlaceLimitOrderRequest>(),
            ToolName::PlaceMarketOrder => schema_for::<PlaceMarketOrderRequest>(),
            ToolName::CancelOrder => schema_for::<CancelOrderRequest>(),
            ToolName::GetUsdcBalance => schema_for::<NoArguments>(),
            ToolName::GetPositions | ToolName::GetClosedPositions | ToolName::GetTrades => {
                schema_for::<UserActivityRequest>()
            }
            ToolName::GetPortfolioValue => schema_for::<PortfolioValueRequest>(),
        }
    }

    pub fn to_tool(&self) -> Tool {
        Tool::new(self.as_str(), self.description(), self.input_schema())
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn schema_for<T: JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(Value::Object(mut object)) => {
            object.remove("$schema");
            Arc::new(object)
        }
        _ => Arc::new(JsonObject::new()),
    }
}

/// The set of tools this process advertises, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRegistry {
    enabled: Vec<ToolName>,
}

impl ToolRegistry {
    pub fn all() -> Self {
        Self {
            enabled: ToolName::ALL.to_vec(),
        }
    }

    /// Applies the allow-list, then the deny-list. Unknown names are rejected.
    pub fn from_selection(selection: &ToolSelection) -> Result<Self> {
        let unknown: Vec<&str> = selection
            .mentioned()
            .filter(|name| ToolName::from_name(name).is_none())
            .collect();
        if !unknown.is_empty() {
            let known: Vec<&str> = ToolName::ALL.iter().map(ToolName::as_str).collect();
            bail!(
                "unknown tool name(s) in MCP_ENABLED_TOOLS/MCP_DISABLED_TOOLS: {}; known tools: {}",
                unknown.join(", "),
                known.join(", ")
            );
        }

        let enabled: Vec<ToolName> = ToolName::ALL
            .into_iter()
            .filter(|tool| selection.is_enabled(tool.as_str()))
            .collect();
        if enabled.is_empty() {
            tracing::warn!("tool selection leaves no tools enabled");
        }
        Ok(Self { enabled })
    }

    /// Enabled tool by name; disabled and unknown names are indistinguishable.
    pub fn lookup(&self, name: &str) -> Option<ToolName> {
        ToolName::from_name(name).filter(|tool| self.enabled.contains(tool))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.enabled.iter().map(ToolName::as_str).collect()
    }

    pub fn enabled(&self) -> &[ToolName] {
        &self.enabled
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.enabled.iter().map(ToolName::to_tool).collect()
    }

    pub fn requires_private_key(&self) -> bool {
        self.enabled
            .iter()
            .any(|tool| tool.access() != AccessClass::MarketData)
    }

    pub fn requires_api_credentials(&self) -> bool {
        self.enabled
            .iter()
            .any(|tool| tool.access() == AccessClass::Trading)
    }

    /// Enabled tools that need the private key.
    pub fn key_holders(&self) -> Vec<&'static str> {
        self.enabled
            .iter()
            .filter(|tool| tool.access() != AccessClass::MarketData)
            .map(ToolName::as_str)
            .collect()
    }
}
