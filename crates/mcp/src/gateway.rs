use async_trait::async_trait;
use chrono::Utc;
use pm_core::config::AppConfig;
use pm_core::types::{OrderType, Side};
use polymarket::order::OrderArgs;
use polymarket::{
    CancelOrderResponse, ClobRestClient, ClosedPosition, DataApiClient, GammaClient, GammaMarket,
    Market, MarketsPage, OrderBook, PortfolioValue, Position, PolymarketError, Trade,
    UsdcBalanceReader, WalletSigner,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::bootstrap::Session;
use crate::error::ToolError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketFilter {
    /// Restrict to markets that are live right now.
    pub active_only: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrder {
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
}

/// `amount` is USDC to spend for BUY and shares to sell for SELL.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub token_id: String,
    pub side: Side,
    pub amount: Decimal,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlacement {
    pub order_id: String,
    pub status: Option<String>,
    pub success: bool,
    pub transactions_hashes: Vec<String>,
}

/// Uniform access to the upstream Polymarket services.
///
/// Every call is a fresh round trip; implementations hold no per-call state.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn list_markets(&self, filter: &MarketFilter) -> Result<MarketsPage, ToolError>;

    /// Case-insensitive substring match on the question, scanning live markets
    /// page by page up to `max_pages`.
    async fn search_markets(&self, query: &str, max_pages: usize) -> Result<Vec<Market>, ToolError> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        let mut filter = MarketFilter {
            active_only: true,
            ..MarketFilter::default()
        };

        for _ in 0..max_pages {
            let page = self.list_markets(&filter).await?;
            matches.extend(
                page.data
                    .iter()
                    .filter(|market| market.question.to_lowercase().contains(&needle))
                    .cloned(),
            );
            match page.next() {
                Some(cursor) => filter.next_cursor = Some(cursor.to_string()),
                None => break,
            }
        }

        Ok(matches)
    }

    async fn get_markets_by_slug(&self, slug: &str) -> Result<Vec<GammaMarket>, ToolError>;

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, ToolError>;

    async fn get_mid_price(&self, token_id: &str) -> Result<Decimal, ToolError> {
        let book = self.get_order_book(token_id).await?;
        book.mid_price().ok_or_else(|| {
            ToolError::NoLiquidity(format!(
                "order book for token {token_id} has an empty side ({} bids, {} asks)",
                book.bids.len(),
                book.asks.len()
            ))
        })
    }

    async fn get_price(&self, token_id: &str, side: Side) -> Result<Decimal, ToolError>;

    async fn place_limit_order(&self, order: &LimitOrder) -> Result<OrderPlacement, ToolError>;

    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderPlacement, ToolError>;

    async fn cancel_order(&self, order_id: &str) -> Result<CancelOrderResponse, ToolError>;

    async fn get_usdc_balance(&self) -> Result<Decimal, ToolError>;

    async fn get_positions(&self, user: &str, limit: u32) -> Result<Vec<Position>, ToolError>;

    async fn get_closed_positions(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<Vec<ClosedPosition>, ToolError>;

    async fn get_trades(&self, user: &str, limit: u32) -> Result<Vec<Trade>, ToolError>;

    async fn get_portfolio_value(&self, user: &str) -> Result<PortfolioValue, ToolError>;

    /// Checksummed address of the configured wallet, if any.
    fn wallet_address(&self) -> Option<String>;
}

/// Gateway backed by the live CLOB, Gamma, Data and Polygon RPC endpoints.
#[derive(Debug, Clone)]
pub struct ClobGateway {
    clob: ClobRestClient,
    gamma: GammaClient,
    data: DataApiClient,
    balances: UsdcBalanceReader,
    signer: Option<WalletSigner>,
}

impl ClobGateway {
    pub fn new(config: &AppConfig, session: Session) -> Result<Self, PolymarketError> {
        let mut clob = ClobRestClient::from_config(config)?;
        if let Some(signer) = session.signer.clone() {
            clob = clob.with_signer(signer);
        }
        if let Some(credentials) = session.api_credentials {
            clob = clob.with_api_credentials(credentials);
        }

        Ok(Self {
            clob,
            gamma: GammaClient::from_config(config)?,
            data: DataApiClient::from_config(config)?,
            balances: UsdcBalanceReader::from_config(config)?,
            signer: session.signer,
        })
    }

    fn require_signer(&self) -> Result<&WalletSigner, ToolError> {
        self.signer.as_ref().ok_or_else(|| {
            ToolError::CredentialError("PRIVATE_KEY is not configured for this server".into())
        })
    }
}

#[async_trait]
impl MarketGateway for ClobGateway {
    #[instrument(skip(self))]
    async fn list_markets(&self, filter: &MarketFilter) -> Result<MarketsPage, ToolError> {
        let cursor = filter.next_cursor.as_deref();
        if filter.active_only {
            let mut page = self.clob.get_sampling_markets(cursor).await?;
            let now = Utc::now();
            page.data.retain(|market| market.is_live(now));
            Ok(page)
        } else {
            Ok(self.clob.get_markets(cursor).await?)
        }
    }

    async fn get_markets_by_slug(&self, slug: &str) -> Result<Vec<GammaMarket>, ToolError> {
        Ok(self.gamma.get_markets_by_slug(slug).await?)
    }

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, ToolError> {
        Ok(self.clob.get_order_book(token_id).await?)
    }

    async fn get_price(&self, token_id: &str, side: Side) -> Result<Decimal, ToolError> {
        self.clob.get_price(token_id, side).await?.ok_or_else(|| {
            ToolError::NoLiquidity(format!("no {side} price available for token {token_id}"))
        })
    }

    #[instrument(skip(self, order), fields(token_id = %order.token_id, side = %order.side))]
    async fn place_limit_order(&self, order: &LimitOrder) -> Result<OrderPlacement, ToolError> {
        let args = OrderArgs {
            token_id: order.token_id.clone(),
            price: order.price,
            size: order.size,
            side: order.side,
        };
        let signed = self
            .clob
            .create_limit_order(&args)
            .await
            .map_err(ToolError::from_order_error)?;
        let response = self
            .clob
            .post_order(&signed, order.order_type)
            .await
            .map_err(ToolError::from_order_error)?;

        tracing::info!(order_id = %response.order_id, status = ?response.status, "limit order accepted");
        Ok(OrderPlacement {
            order_id: response.order_id,
            status: response.status,
            success: response.success,
            transactions_hashes: response.transactions_hashes,
        })
    }

    #[instrument(skip(self, order), fields(token_id = %order.token_id, side = %order.side))]
    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderPlacement, ToolError> {
        let signed = self
            .clob
            .create_market_order(&order.token_id, order.side, order.amount, order.order_type)
            .await
            .map_err(ToolError::from_order_error)?;
        let response = self
            .clob
            .post_order(&signed, order.order_type)
            .await
            .map_err(ToolError::from_order_error)?;

        tracing::info!(order_id = %response.order_id, status = ?response.status, "market order accepted");
        Ok(OrderPlacement {
            order_id: response.order_id,
            status: response.status,
            success: response.success,
            transactions_hashes: response.transactions_hashes,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<CancelOrderResponse, ToolError> {
        self.clob
            .cancel_order(order_id)
            .await
            .map_err(ToolError::from_order_error)
    }

    async fn get_usdc_balance(&self) -> Result<Decimal, ToolError> {
        let owner = self.require_signer()?.address();
        Ok(self.balances.balance_of(owner).await?)
    }

    async fn get_positions(&self, user: &str, limit: u32) -> Result<Vec<Position>, ToolError> {
        Ok(self.data.get_positions(user, limit).await?)
    }

    async fn get_closed_positions(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<Vec<ClosedPosition>, ToolError> {
        Ok(self.data.get_closed_positions(user, limit).await?)
    }

    async fn get_trades(&self, user: &str, limit: u32) -> Result<Vec<Trade>, ToolError> {
        Ok(self.data.get_trades(user, limit).await?)
    }

    async fn get_portfolio_value(&self, user: &str) -> Result<PortfolioValue, ToolError> {
        Ok(self.data.get_portfolio_value(user).await?)
    }

    fn wallet_address(&self) -> Option<String> {
        self.signer
            .as_ref()
            .map(|signer| signer.address().to_checksum(None))
    }
}
