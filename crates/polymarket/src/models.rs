use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pm_core::types::{OrderType, Side};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Cursor value the CLOB returns once pagination is exhausted.
pub const END_CURSOR: &str = "LTE=";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketsPage {
    #[serde(default)]
    pub data: Vec<Market>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub next_cursor: String,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl MarketsPage {
    /// Cursor to request next, or `None` when this was the last page.
    pub fn next(&self) -> Option<&str> {
        match self.next_cursor.as_str() {
            "" | END_CURSOR => None,
            cursor => Some(cursor),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Market {
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub market_slug: String,
    #[serde(default)]
    pub end_date_iso: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub closed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub archived: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accepting_orders: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub neg_risk: bool,
    #[serde(default)]
    pub minimum_order_size: Option<Decimal>,
    #[serde(default)]
    pub minimum_tick_size: Option<Decimal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tokens: Vec<MarketToken>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl Market {
    /// Open for trading right now: active, not closed or archived, accepting
    /// orders and not past its end date.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.active || self.closed || self.archived || !self.accepting_orders {
            return false;
        }
        match self
            .end_date_iso
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        {
            Some(end) => end.with_timezone(&Utc) > now,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MarketToken {
    pub token_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outcome: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub winner: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OrderBook {
    #[serde(rename(deserialize = "asset_id", serialize = "token_id"))]
    pub token_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bids: Vec<PriceLevel>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub asks: Vec<PriceLevel>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub tick_size: Option<Decimal>,
    #[serde(default)]
    pub min_order_size: Option<Decimal>,
    #[serde(default)]
    pub neg_risk: Option<bool>,
}

impl OrderBook {
    /// Highest bid regardless of the order levels arrive in.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|level| level.price).max()
    }

    /// Lowest ask regardless of the order levels arrive in.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|level| level.price).min()
    }

    /// `(best_bid + best_ask) / 2` rounded to 4 decimals; `None` when a side is empty.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(((bid + ask) / Decimal::TWO).round_dp(4).normalize())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PriceResponse {
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TickSizeResponse {
    pub minimum_tick_size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NegRiskResponse {
    #[serde(default)]
    pub neg_risk: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiKeyResponse {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

/// Wire form of a signed order as accepted by `POST /order`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub salt: u64,
    pub maker: String,
    pub signer: String,
    pub taker: String,
    pub token_id: String,
    pub maker_amount: String,
    pub taker_amount: String,
    pub expiration: String,
    pub nonce: String,
    pub fee_rate_bps: String,
    pub side: Side,
    pub signature_type: u8,
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostOrderBody<'a> {
    pub order: &'a OrderPayload,
    pub owner: &'a str,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PostOrderResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(rename = "errorMsg", default, deserialize_with = "null_as_default")]
    pub error_msg: String,
    #[serde(rename = "orderID", default, deserialize_with = "null_as_default")]
    pub order_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(
        rename = "transactionsHashes",
        default,
        deserialize_with = "null_as_default"
    )]
    pub transactions_hashes: Vec<String>,
    #[serde(rename = "takingAmount", default)]
    pub taking_amount: Option<String>,
    #[serde(rename = "makingAmount", default)]
    pub making_amount: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelOrderBody<'a> {
    #[serde(rename = "orderID")]
    pub order_id: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct CancelOrderResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub canceled: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_canceled: BTreeMap<String, String>,
}

/// Treats an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts either a JSON array of strings or a string holding an encoded array,
/// which is how the Gamma API ships `outcomes`, `outcomePrices` and `clobTokenIds`.
pub(crate) fn json_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrEncoded {
        List(Vec<String>),
        Encoded(String),
    }

    match Option::<ListOrEncoded>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(ListOrEncoded::List(values)) => Ok(values),
        Some(ListOrEncoded::Encoded(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(ListOrEncoded::Encoded(raw)) => serde_json::from_str(&raw).map_err(de::Error::custom),
    }
}

/// Identifiers that some endpoints send as numbers and others as strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(value)) => Ok(value),
        Some(Id::Number(value)) => Ok(value.to_string()),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, size: Decimal) -> PriceLevel {
        PriceLevel { price, size }
    }

    fn book(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> OrderBook {
        OrderBook {
            token_id: "1".into(),
            market: None,
            bids,
            asks,
            timestamp: None,
            hash: None,
            tick_size: None,
            min_order_size: None,
            neg_risk: None,
        }
    }

    #[test]
    fn order_book_decodes_string_levels() {
        let raw = r#"{
            "market": "0xabc",
            "asset_id": "7123",
            "bids": [{"price": "0.48", "size": "30"}, {"price": "0.50", "size": "100"}],
            "asks": [{"price": "0.54", "size": "20"}, {"price": "0.52", "size": "50"}],
            "timestamp": "1700000000000",
            "hash": "0xdead",
            "tick_size": "0.01",
            "min_order_size": "5",
            "neg_risk": false
        }"#;

        let book: OrderBook = serde_json::from_str(raw).unwrap();
        assert_eq!(book.token_id, "7123");
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.best_bid(), Some(dec!(0.50)));
        assert_eq!(book.best_ask(), Some(dec!(0.52)));
        assert_eq!(book.tick_size, Some(dec!(0.01)));
        assert_eq!(book.mid_price(), Some(dec!(0.51)));

        let rendered = serde_json::to_value(&book).unwrap();
        assert_eq!(rendered["token_id"], "7123");
    }

    #[test]
    fn mid_price_needs_both_sides() {
        let one_sided = book(vec![level(dec!(0.4), dec!(10))], vec![]);
        assert_eq!(one_sided.mid_price(), None);
        assert_eq!(book(vec![], vec![]).mid_price(), None);
    }

    #[test]
    fn mid_price_rounds_to_four_places() {
        let book = book(
            vec![level(dec!(0.333), dec!(1))],
            vec![level(dec!(0.33351), dec!(1))],
        );
        assert_eq!(book.mid_price(), Some(dec!(0.3333)));
    }

    #[test]
    fn markets_page_reports_end_cursor() {
        let raw = r#"{"data": [], "next_cursor": "LTE=", "limit": 500, "count": 0}"#;
        let page: MarketsPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.next(), None);

        let raw = r#"{"data": [], "next_cursor": "MTAw"}"#;
        let page: MarketsPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.next(), Some("MTAw"));
    }

    #[test]
    fn market_tolerates_nulls_and_numbers() {
        let raw = r#"{
            "condition_id": "0xc0",
            "question_id": null,
            "question": "Will it rain?",
            "description": null,
            "market_slug": "will-it-rain",
            "end_date_iso": "2030-01-01T00:00:00Z",
            "active": true,
            "closed": false,
            "archived": null,
            "accepting_orders": true,
            "minimum_tick_size": 0.01,
            "tokens": [
                {"token_id": "1", "outcome": "Yes", "price": 0.62, "winner": false},
                {"token_id": "2", "outcome": "No", "price": 0.38, "winner": false}
            ],
            "tags": null
        }"#;

        let market: Market = serde_json::from_str(raw).unwrap();
        assert_eq!(market.tokens[0].price, Some(dec!(0.62)));
        assert_eq!(market.minimum_tick_size, Some(dec!(0.01)));
        assert!(market.tags.is_empty());

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(market.is_live(now));
        let later = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();
        assert!(!market.is_live(later));
    }

    #[test]
    fn encoded_lists_are_decoded() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "json_string_list")]
            values: Vec<String>,
            #[serde(default, deserialize_with = "string_or_number")]
            id: String,
        }

        let encoded: Holder =
            serde_json::from_str(r#"{"values": "[\"Yes\", \"No\"]", "id": 42}"#).unwrap();
        assert_eq!(encoded.values, vec!["Yes", "No"]);
        assert_eq!(encoded.id, "42");

        let plain: Holder = serde_json::from_str(r#"{"values": ["a"], "id": "x"}"#).unwrap();
        assert_eq!(plain.values, vec!["a"]);
        assert_eq!(plain.id, "x");

        let missing: Holder = serde_json::from_str(r#"{"values": null}"#).unwrap();
        assert!(missing.values.is_empty());
    }

    #[test]
    fn post_order_response_decodes_upstream_names() {
        let raw = r#"{
            "success": true,
            "errorMsg": "",
            "orderID": "0xorder",
            "transactionsHashes": null,
            "status": "live"
        }"#;
        let response: PostOrderResponse = serde_json::from_str(raw).unwrap();
        assert!(response.success);
        assert_eq!(response.order_id, "0xorder");
        assert!(response.transactions_hashes.is_empty());
        assert_eq!(response.status.as_deref(), Some("live"));
    }
}
