use std::collections::BTreeMap;

use pm_core::types::OrderType;
use rmcp::schemars;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ToolError;
use crate::gateway::{LimitOrder, MarketGateway, MarketOrder};
use crate::types::{ensure_order_size, ensure_token_id, TimeInForce, ToolInput, TradeSide};

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct PlaceLimitOrderRequest {
    /// CLOB token id of the outcome to trade.
    pub token_id: String,
    /// Limit price per share, strictly between 0 and 1.
    #[schemars(with = "f64")]
    pub price: Decimal,
    /// Number of shares.
    #[schemars(with = "f64")]
    pub size: Decimal,
    #[serde(default)]
    pub side: TradeSide,
    /// Defaults to GTC.
    #[serde(default)]
    pub order_type: Option<TimeInForce>,
}

impl ToolInput for PlaceLimitOrderRequest {
    fn validate(&self) -> Result<(), ToolError> {
        ensure_token_id(&self.token_id)?;
        ensure_order_size(self.size)?;
        if self.price <= Decimal::ZERO || self.price >= Decimal::ONE {
            return Err(ToolError::InvalidArguments(format!(
                "price must be between 0 and 1, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct PlaceMarketOrderRequest {
    /// CLOB token id of the outcome to trade.
    pub token_id: String,
    /// USDC to spend for BUY, shares to sell for SELL.
    #[serde(alias = "amount")]
    #[schemars(with = "f64")]
    pub size: Decimal,
    #[serde(default)]
    pub side: TradeSide,
    /// FOK (default) or FAK.
    #[serde(default)]
    pub order_type: Option<TimeInForce>,
}

impl ToolInput for PlaceMarketOrderRequest {
    fn validate(&self) -> Result<(), ToolError> {
        ensure_token_id(&self.token_id)?;
        ensure_order_size(self.size)?;
        if self.order_type == Some(TimeInForce::Gtc) {
            return Err(ToolError::InvalidArguments(
                "market orders must be FOK or FAK".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: Option<String>,
    pub success: bool,
    pub token_id: String,
    pub side: TradeSide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    pub size: Decimal,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transactions_hashes: Vec<String>,
}

pub async fn place_limit_order(
    gateway: &dyn MarketGateway,
    request: PlaceLimitOrderRequest,
) -> Result<OrderResponse, ToolError> {
    let order = LimitOrder {
        token_id: request.token_id.trim().to_string(),
        side: request.side.into(),
        price: request.price,
        size: request.size,
        order_type: request.order_type.map(OrderType::from).unwrap_or(OrderType::Gtc),
    };

    info!(
        token_id = %order.token_id,
        side = %order.side,
        price = %order.price,
        size = %order.size,
        "placing limit order"
    );
    let placement = gateway.place_limit_order(&order).await?;

    Ok(OrderResponse {
        order_id: placement.order_id,
        status: placement.status,
        success: placement.success,
        token_id: order.token_id,
        side: request.side,
        price: Some(order.price),
        size: order.size,
        order_type: order.order_type,
        transactions_hashes: placement.transactions_hashes,
    })
}

pub async fn place_market_order(
    gateway: &dyn MarketGateway,
    request: PlaceMarketOrderRequest,
) -> Result<OrderResponse, ToolError> {
    let order = MarketOrder {
        token_id: request.token_id.trim().to_string(),
        side: request.side.into(),
        amount: request.size,
        order_type: request.order_type.map(OrderType::from).unwrap_or(OrderType::Fok),
    };

    info!(
        token_id = %order.token_id,
        side = %order.side,
        amount = %order.amount,
        order_type = %order.order_type,
        "placing market order"
    );
    let placement = gateway.place_market_order(&order).await?;

    Ok(OrderResponse {
        order_id: placement.order_id,
        status: placement.status,
        success: placement.success,
        token_id: order.token_id,
        side: request.side,
        price: None,
        size: order.amount,
        order_type: order.order_type,
        transactions_hashes: placement.transactions_hashes,
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct CancelOrderRequest {
    /// Exchange order id (0x-prefixed hash).
    pub order_id: String,
}

impl ToolInput for CancelOrderRequest {
    fn validate(&self) -> Result<(), ToolError> {
        if self.order_id.trim().is_empty() {
            return Err(ToolError::InvalidArguments("order_id must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderResponse {
    pub order_id: String,
    pub canceled: Vec<String>,
    pub not_canceled: BTreeMap<String, String>,
}

/// Cancels one order; an explicit refusal from the exchange is an error.
pub async fn cancel_order(
    gateway: &dyn MarketGateway,
    request: CancelOrderRequest,
) -> Result<CancelOrderResponse, ToolError> {
    let order_id = request.order_id.trim().to_string();
    let result = gateway.cancel_order(&order_id).await?;

    if !result.canceled.iter().any(|id| id == &order_id) {
        if let Some(reason) = result.not_canceled.get(&order_id) {
            return Err(ToolError::RejectedByExchange(reason.clone()));
        }
    }

    Ok(CancelOrderResponse {
        order_id,
        canceled: result.canceled,
        not_canceled: result.not_canceled,
    })
}
