use std::time::Duration;

use alloy::primitives::{Address, U256};
use pm_core::config::AppConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::client::{build_http_client, execute_json};
use crate::eip712::encode_address;
use crate::error::{PolymarketError, Result};

/// `balanceOf(address)`
const BALANCE_OF_SELECTOR: &str = "70a08231";
const USDC_DECIMALS: u32 = 6;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Reads the USDC collateral balance of a wallet over Polygon JSON-RPC.
#[derive(Debug, Clone)]
pub struct UsdcBalanceReader {
    http: Client,
    rpc_url: String,
    token: Address,
}

impl UsdcBalanceReader {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let token = config.usdc_address.trim().parse::<Address>().map_err(|_| {
            PolymarketError::Rpc(format!("invalid USDC contract address {}", config.usdc_address))
        })?;
        Self::new(config.rpc_url.clone(), token, config.http_timeout())
    }

    pub fn new(rpc_url: impl Into<String>, token: Address, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            rpc_url: rpc_url.into(),
            token,
        })
    }

    /// Balance in whole USDC with 6 decimal places.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn balance_of(&self, owner: Address) -> Result<Decimal> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": self.token.to_checksum(None),
                    "data": balance_of_calldata(owner),
                },
                "latest"
            ]
        });

        let builder = self.http.post(&self.rpc_url).json(&request);
        let response: RpcResponse = execute_json(builder, "eth_call").await?;

        if let Some(error) = response.error {
            return Err(PolymarketError::Rpc(format!(
                "eth_call failed ({}): {}",
                error.code, error.message
            )));
        }
        let word = response
            .result
            .ok_or_else(|| PolymarketError::Rpc("eth_call returned no result".into()))?;
        parse_usdc_amount(&word)
    }
}

pub fn balance_of_calldata(owner: Address) -> String {
    format!("0x{BALANCE_OF_SELECTOR}{}", hex::encode(encode_address(owner)))
}

/// Converts an `eth_call` result word into a USDC amount.
pub fn parse_usdc_amount(word: &str) -> Result<Decimal> {
    let digits = word.trim().trim_start_matches("0x");
    let raw = if digits.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(digits, 16)
            .map_err(|_| PolymarketError::Rpc(format!("malformed balance word `{word}`")))?
    };

    let units = i128::try_from(raw)
        .map_err(|_| PolymarketError::Rpc(format!("balance {raw} is out of range")))?;
    Decimal::try_from_i128_with_scale(units, USDC_DECIMALS)
        .map(|value| value.normalize())
        .map_err(|err| PolymarketError::Rpc(err.to_string()))
}
