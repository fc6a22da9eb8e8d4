use pm_core::types::{OrderType, Side};
use rmcp::schemars;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Typed tool arguments: deserialized from the call, then checked before any
/// upstream request is made.
pub trait ToolInput: DeserializeOwned {
    fn validate(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Arguments for tools that take none.
#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct NoArguments {}

impl ToolInput for NoArguments {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub enum TradeSide {
    #[default]
    #[serde(rename = "BUY", alias = "buy", alias = "Buy")]
    Buy,
    #[serde(rename = "SELL", alias = "sell", alias = "Sell")]
    Sell,
}

impl From<TradeSide> for Side {
    fn from(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => Side::Buy,
            TradeSide::Sell => Side::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum TimeInForce {
    /// Good till cancelled.
    #[serde(rename = "GTC", alias = "gtc")]
    Gtc,
    /// Fill or kill.
    #[serde(rename = "FOK", alias = "fok")]
    Fok,
    /// Fill and kill, partial fills allowed.
    #[serde(rename = "FAK", alias = "fak")]
    Fak,
}

impl From<TimeInForce> for OrderType {
    fn from(value: TimeInForce) -> Self {
        match value {
            TimeInForce::Gtc => OrderType::Gtc,
            TimeInForce::Fok => OrderType::Fok,
            TimeInForce::Fak => OrderType::Fak,
        }
    }
}

/// Tool call envelope used by `mcp-cli`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolReply {
    pub status: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ToolReply {
    pub fn from_result(result: Result<serde_json::Value, ToolError>) -> Self {
        match result {
            Ok(payload) => Self {
                status: "ok".into(),
                payload,
            },
            Err(err) => Self {
                status: "error".into(),
                payload: err.to_json(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Token ids are decimal renderings of a uint256.
pub fn ensure_token_id(token_id: &str) -> Result<(), ToolError> {
    let trimmed = token_id.trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidArguments("token_id must not be empty".into()));
    }
    if trimmed.len() > 78 || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ToolError::InvalidArguments(format!(
            "token_id `{trimmed}` must be a decimal integer"
        )));
    }
    Ok(())
}

pub fn ensure_positive(field: &str, value: Decimal) -> Result<(), ToolError> {
    if value <= Decimal::ZERO {
        return Err(ToolError::InvalidArguments(format!(
            "{field} must be greater than zero, got {value}"
        )));
    }
    Ok(())
}

/// Smallest order size the exchange lots can represent.
pub const MIN_ORDER_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Largest order size accepted before any amount arithmetic runs.
pub const MAX_ORDER_SIZE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Positive, at least one lot and below [`MAX_ORDER_SIZE`].
pub fn ensure_order_size(value: Decimal) -> Result<(), ToolError> {
    ensure_positive("size", value)?;
    if value < MIN_ORDER_SIZE || value > MAX_ORDER_SIZE {
        return Err(ToolError::InvalidArguments(format!(
            "size must be between {MIN_ORDER_SIZE} and {MAX_ORDER_SIZE}, got {value}"
        )));
    }
    Ok(())
}
