use std::time::Duration;

use pm_core::config::AppConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::{build_http_client, execute_json};
use crate::error::Result;
use crate::models::null_as_default;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub proxy_wallet: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub asset: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
    #[serde(default)]
    pub initial_value: Option<Decimal>,
    #[serde(default)]
    pub current_value: Option<Decimal>,
    #[serde(default)]
    pub cash_pnl: Option<Decimal>,
    #[serde(default)]
    pub percent_pnl: Option<Decimal>,
    #[serde(default)]
    pub realized_pnl: Option<Decimal>,
    #[serde(default)]
    pub cur_price: Option<Decimal>,
    #[serde(default)]
    pub redeemable: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub asset: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
    #[serde(default)]
    pub total_bought: Option<Decimal>,
    #[serde(default)]
    pub realized_pnl: Option<Decimal>,
    #[serde(default)]
    pub cur_price: Option<Decimal>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default)]
    pub proxy_wallet: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub asset: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PortfolioValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default)]
    pub value: Decimal,
}

/// Read-only client for the public Data API (positions, trades, portfolio value).
#[derive(Debug, Clone)]
pub struct DataApiClient {
    http: Client,
    base_url: String,
}

impl DataApiClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.data_host.clone(), config.http_timeout())
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_positions(&self, user: &str, limit: u32) -> Result<Vec<Position>> {
        self.get_for_user("/positions", user, Some(limit)).await
    }

    #[instrument(skip(self))]
    pub async fn get_closed_positions(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<Vec<ClosedPosition>> {
        self.get_for_user("/closed-positions", user, Some(limit)).await
    }

    #[instrument(skip(self))]
    pub async fn get_trades(&self, user: &str, limit: u32) -> Result<Vec<Trade>> {
        self.get_for_user("/trades", user, Some(limit)).await
    }

    /// Total value of the user's open positions; zero when the API has no entry.
    #[instrument(skip(self))]
    pub async fn get_portfolio_value(&self, user: &str) -> Result<PortfolioValue> {
        let values: Vec<PortfolioValue> = self.get_for_user("/value", user, None).await?;
        Ok(values.into_iter().next().unwrap_or_else(|| PortfolioValue {
            user: user.to_string(),
            value: Decimal::ZERO,
        }))
    }

    async fn get_for_user<T>(&self, path: &str, user: &str, limit: Option<u32>) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut query = vec![("user", user.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        tracing::debug!("Data API GET {} user={}", path, user);
        let builder = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&query);
        execute_json(builder, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn positions_decode_numeric_fields() {
        let raw = r#"[{
            "proxyWallet": "0xabc",
            "asset": "111",
            "conditionId": "0xcond",
            "size": 25.5,
            "avgPrice": 0.42,
            "currentValue": 13.77,
            "cashPnl": 3.06,
            "redeemable": false,
            "title": "Will it snow?",
            "outcome": "Yes"
        }]"#;
        let positions: Vec<Position> = serde_json::from_str(raw).unwrap();
        assert_eq!(positions[0].size, Some(dec!(25.5)));
        assert_eq!(positions[0].avg_price, Some(dec!(0.42)));
        assert_eq!(positions[0].outcome.as_deref(), Some("Yes"));
    }

    #[test]
    fn trades_and_values_decode() {
        let trades: Vec<Trade> = serde_json::from_str(
            r#"[{"side": "BUY", "asset": "1", "size": 10, "price": 0.5, "timestamp": 1700000000,
                 "transactionHash": "0xtx"}]"#,
        )
        .unwrap();
        assert_eq!(trades[0].side.as_deref(), Some("BUY"));
        assert_eq!(trades[0].timestamp, Some(1_700_000_000));

        let values: Vec<PortfolioValue> =
            serde_json::from_str(r#"[{"user": "0xabc", "value": 101.25}]"#).unwrap();
        assert_eq!(values[0].value, dec!(101.25));
    }
}
