use polymarket::{ClosedPosition, Position, Trade};
use rmcp::schemars;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::gateway::MarketGateway;
use crate::types::{NoArguments, ToolInput};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct UserActivityRequest {
    /// Wallet address; defaults to the configured wallet.
    pub user: Option<String>,
    /// Maximum entries to return (1-500, default 100).
    pub limit: Option<u32>,
}

impl ToolInput for UserActivityRequest {
    fn validate(&self) -> Result<(), ToolError> {
        if let Some(user) = &self.user {
            ensure_address(user)?;
        }
        match self.limit {
            Some(limit) if limit == 0 || limit > MAX_LIMIT => Err(ToolError::InvalidArguments(
                format!("limit must be between 1 and {MAX_LIMIT}, got {limit}"),
            )),
            _ => Ok(()),
        }
    }
}

impl UserActivityRequest {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct PortfolioValueRequest {
    /// Wallet address; defaults to the configured wallet.
    pub user: Option<String>,
}

impl ToolInput for PortfolioValueRequest {
    fn validate(&self) -> Result<(), ToolError> {
        match &self.user {
            Some(user) => ensure_address(user),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub address: Option<String>,
    pub usdc_balance: Decimal,
}

pub async fn get_usdc_balance(
    gateway: &dyn MarketGateway,
    _request: NoArguments,
) -> Result<BalanceResponse, ToolError> {
    let usdc_balance = gateway.get_usdc_balance().await?;
    Ok(BalanceResponse {
        address: gateway.wallet_address(),
        usdc_balance,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionsResponse {
    pub user: String,
    pub positions: Vec<Position>,
    pub count: usize,
}

pub async fn get_positions(
    gateway: &dyn MarketGateway,
    request: UserActivityRequest,
) -> Result<PositionsResponse, ToolError> {
    let user = resolve_user(gateway, request.user.as_deref())?;
    let positions = gateway.get_positions(&user, request.limit()).await?;
    Ok(PositionsResponse {
        count: positions.len(),
        user,
        positions,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ClosedPositionsResponse {
    pub user: String,
    pub closed_positions: Vec<ClosedPosition>,
    pub count: usize,
}

pub async fn get_closed_positions(
    gateway: &dyn MarketGateway,
    request: UserActivityRequest,
) -> Result<ClosedPositionsResponse, ToolError> {
    let user = resolve_user(gateway, request.user.as_deref())?;
    let closed_positions = gateway
        .get_closed_positions(&user, request.limit())
        .await?;
    Ok(ClosedPositionsResponse {
        count: closed_positions.len(),
        user,
        closed_positions,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TradesResponse {
    pub user: String,
    pub trades: Vec<Trade>,
    pub count: usize,
}

pub async fn get_trades(
    gateway: &dyn MarketGateway,
    request: UserActivityRequest,
) -> Result<TradesResponse, ToolError> {
    let user = resolve_user(gateway, request.user.as_deref())?;
    let trades = gateway.get_trades(&user, request.limit()).await?;
    Ok(TradesResponse {
        count: trades.len(),
        user,
        trades,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioValueResponse {
    pub user: String,
    pub portfolio_value: Decimal,
}

pub async fn get_portfolio_value(
    gateway: &dyn MarketGateway,
    request: PortfolioValueRequest,
) -> Result<PortfolioValueResponse, ToolError> {
    let user = resolve_user(gateway, request.user.as_deref())?;
    let value = gateway.get_portfolio_value(&user).await?;
    Ok(PortfolioValueResponse {
        user,
        portfolio_value: value.value,
    })
}

fn resolve_user(gateway: &dyn MarketGateway, user: Option<&str>) -> Result<String, ToolError> {
    match user.map(str::trim).filter(|user| !user.is_empty()) {
        Some(user) => Ok(user.to_string()),
        None => gateway.wallet_address().ok_or_else(|| {
            ToolError::InvalidArguments(
                "user is required when no wallet is configured".into(),
            )
        }),
    }
}

fn ensure_address(user: &str) -> Result<(), ToolError> {
    let trimmed = user.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let hex = trimmed.strip_prefix("0x").unwrap_or("");
    if hex.len() != 40 || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(ToolError::InvalidArguments(format!(
            "user `{trimmed}` is not a 0x-prefixed wallet address"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_checked_loosely() {
        assert!(ensure_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_ok());
        assert!(ensure_address("").is_ok());
        assert!(ensure_address("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_err());
        assert!(ensure_address("0x1234").is_err());
    }

    #[test]
    fn limits_are_bounded() {
        let request = UserActivityRequest {
            user: None,
            limit: Some(0),
        };
        assert!(request.validate().is_err());

        let request = UserActivityRequest {
            user: None,
            limit: Some(501),
        };
        assert!(request.validate().is_err());

        let request = UserActivityRequest::default();
        assert!(request.validate().is_ok());
        assert_eq!(request.limit(), DEFAULT_LIMIT);
    }
}
