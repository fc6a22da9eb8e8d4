use std::time::Duration;

use pm_core::config::AppConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::{build_http_client, execute_json};
use crate::error::Result;
use crate::models::{json_string_list, null_as_default, string_or_number};

/// Market metadata as served by the Gamma API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub closed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub archived: bool,
    #[serde(default)]
    pub neg_risk: Option<bool>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub liquidity: Option<Decimal>,
    #[serde(default, deserialize_with = "json_string_list")]
    pub outcomes: Vec<String>,
    #[serde(default, deserialize_with = "json_string_list")]
    pub outcome_prices: Vec<String>,
    #[serde(default, deserialize_with = "json_string_list")]
    pub clob_token_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
}

impl GammaClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.gamma_host.clone(), config.http_timeout())
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Markets whose slug matches exactly; usually zero or one entry.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_markets_by_slug(&self, slug: &str) -> Result<Vec<GammaMarket>> {
        let builder = self
            .http
            .get(format!("{}/markets", self.base_url))
            .query(&[("slug", slug)]);
        execute_json(builder, "/markets").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gamma_market_decodes_encoded_arrays() {
        let raw = r#"[{
            "id": "253591",
            "question": "Will the Fed cut rates in March?",
            "conditionId": "0xcond",
            "slug": "fed-cut-march",
            "endDate": "2026-03-20T12:00:00Z",
            "active": true,
            "closed": false,
            "archived": null,
            "negRisk": false,
            "volume": "1523.75",
            "outcomes": "[\"Yes\", \"No\"]",
            "outcomePrices": "[\"0.12\", \"0.88\"]",
            "clobTokenIds": "[\"111\", \"222\"]"
        }]"#;

        let markets: Vec<GammaMarket> = serde_json::from_str(raw).unwrap();
        let market = &markets[0];
        assert_eq!(market.id, "253591");
        assert_eq!(market.condition_id.as_deref(), Some("0xcond"));
        assert_eq!(market.outcomes, vec!["Yes", "No"]);
        assert_eq!(market.outcome_prices, vec!["0.12", "0.88"]);
        assert_eq!(market.clob_token_ids, vec!["111", "222"]);
        assert_eq!(market.volume, Some(dec!(1523.75)));
        assert!(!market.archived);
    }

    #[test]
    fn gamma_market_tolerates_missing_arrays() {
        let markets: Vec<GammaMarket> =
            serde_json::from_str(r#"[{"id": 7, "question": "Q"}]"#).unwrap();
        assert_eq!(markets[0].id, "7");
        assert!(markets[0].clob_token_ids.is_empty());
    }
}
