use polymarket::{GammaMarket, Market, OrderBook};
use rmcp::schemars;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::gateway::{MarketFilter, MarketGateway};
use crate::types::{ensure_token_id, ToolInput, TradeSide};

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct GetMarketsRequest {
    /// Only markets that are live and accepting orders.
    pub active_only: bool,
    /// Cursor returned by a previous call.
    pub next_cursor: Option<String>,
    /// Maximum number of markets to return. The rest of the page is reached
    /// through `next_cursor`.
    pub limit: Option<usize>,
}

impl ToolInput for GetMarketsRequest {
    fn validate(&self) -> Result<(), ToolError> {
        if self.limit == Some(0) {
            return Err(ToolError::InvalidArguments("limit must be at least 1".into()));
        }
        split_cursor(self.next_cursor.as_deref())?;
        Ok(())
    }
}

/// A cursor is either an upstream page cursor or `<upstream>:<offset>` when a
/// previous call stopped part-way through that page. Upstream cursors are
/// base64 and never contain `:`.
fn split_cursor(cursor: Option<&str>) -> Result<(Option<String>, usize), ToolError> {
    let Some(cursor) = cursor.map(str::trim).filter(|cursor| !cursor.is_empty()) else {
        return Ok((None, 0));
    };
    let Some((upstream, offset)) = cursor.rsplit_once(':') else {
        return Ok((Some(cursor.to_string()), 0));
    };
    let offset = offset.parse::<usize>().map_err(|_| {
        ToolError::InvalidArguments(format!("next_cursor `{cursor}` is not a valid cursor"))
    })?;
    let upstream = (!upstream.is_empty()).then(|| upstream.to_string());
    Ok((upstream, offset))
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<Market>,
    pub count: usize,
    pub next_cursor: Option<String>,
}

pub async fn get_markets(
    gateway: &dyn MarketGateway,
    request: GetMarketsRequest,
) -> Result<MarketsResponse, ToolError> {
    let (upstream, offset) = split_cursor(request.next_cursor.as_deref())?;
    let filter = MarketFilter {
        active_only: request.active_only,
        next_cursor: upstream,
    };
    let page = gateway.list_markets(&filter).await?;
    let following = page.next().map(str::to_string);

    let mut markets: Vec<Market> = page.data.into_iter().skip(offset).collect();
    let next_cursor = match request.limit {
        Some(limit) if markets.len() > limit => {
            markets.truncate(limit);
            let upstream = filter.next_cursor.unwrap_or_default();
            Some(format!("{upstream}:{}", offset + limit))
        }
        _ => following,
    };

    Ok(MarketsResponse {
        count: markets.len(),
        markets,
        next_cursor,
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct SearchMarketsRequest {
    /// Text to look for in market questions, case-insensitive.
    pub query: String,
    /// Pages to scan; capped by the server setting.
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl ToolInput for SearchMarketsRequest {
    fn validate(&self) -> Result<(), ToolError> {
        if self.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".into()));
        }
        if self.max_pages == Some(0) {
            return Err(ToolError::InvalidArguments("max_pages must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMarketsResponse {
    pub query: String,
    pub markets: Vec<Market>,
    pub count: usize,
}

pub async fn search_markets(
    gateway: &dyn MarketGateway,
    request: SearchMarketsRequest,
    max_pages: usize,
) -> Result<SearchMarketsResponse, ToolError> {
    let pages = request.max_pages.map_or(max_pages, |pages| pages.min(max_pages));
    let query = request.query.trim().to_string();
    let markets = gateway.search_markets(&query, pages).await?;

    Ok(SearchMarketsResponse {
        count: markets.len(),
        query,
        markets,
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct GetMarketRequest {
    /// Market slug, e.g. `will-bitcoin-hit-100k-in-2025`.
    pub slug: String,
}

impl ToolInput for GetMarketRequest {
    fn validate(&self) -> Result<(), ToolError> {
        if self.slug.trim().is_empty() {
            return Err(ToolError::InvalidArguments("slug must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketDetailResponse {
    pub markets: Vec<GammaMarket>,
    pub count: usize,
}

pub async fn get_market(
    gateway: &dyn MarketGateway,
    request: GetMarketRequest,
) -> Result<MarketDetailResponse, ToolError> {
    let slug = request.slug.trim();
    let markets = gateway.get_markets_by_slug(slug).await?;
    if markets.is_empty() {
        return Err(ToolError::NotFound(format!("no market with slug `{slug}`")));
    }

    Ok(MarketDetailResponse {
        count: markets.len(),
        markets,
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct TokenRequest {
    /// CLOB token id of one market outcome.
    pub token_id: String,
}

impl ToolInput for TokenRequest {
    fn validate(&self) -> Result<(), ToolError> {
        ensure_token_id(&self.token_id)
    }
}

pub async fn get_order_book(
    gateway: &dyn MarketGateway,
    request: TokenRequest,
) -> Result<OrderBook, ToolError> {
    gateway.get_order_book(request.token_id.trim()).await
}

#[derive(Debug, Clone, Serialize)]
pub struct MidPriceResponse {
    pub token_id: String,
    pub mid_price: Decimal,
}

pub async fn get_mid_price(
    gateway: &dyn MarketGateway,
    request: TokenRequest,
) -> Result<MidPriceResponse, ToolError> {
    let token_id = request.token_id.trim().to_string();
    let mid_price = gateway.get_mid_price(&token_id).await?;
    Ok(MidPriceResponse {
        token_id,
        mid_price,
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct PriceRequest {
    /// CLOB token id of one market outcome.
    pub token_id: String,
    /// BUY or SELL.
    pub side: TradeSide,
}

impl ToolInput for PriceRequest {
    fn validate(&self) -> Result<(), ToolError> {
        ensure_token_id(&self.token_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceResponse {
    pub token_id: String,
    pub side: TradeSide,
    pub price: Decimal,
}

pub async fn get_price(
    gateway: &dyn MarketGateway,
    request: PriceRequest,
) -> Result<PriceResponse, ToolError> {
    let token_id = request.token_id.trim().to_string();
    let price = gateway.get_price(&token_id, request.side.into()).await?;
    Ok(PriceResponse {
        token_id,
        side: request.side,
        price,
    })
}
