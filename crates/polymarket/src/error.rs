use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolymarketError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("failed to serialize request payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("signature error: {0}")]
    Signature(String),
    #[error("missing credentials: {0}")]
    Credentials(String),
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("no liquidity: {0}")]
    NoLiquidity(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl PolymarketError {
    /// Human readable upstream reason. JSON bodies of the form `{"error": "..."}`
    /// are unwrapped, anything else is returned as-is.
    pub fn upstream_message(&self) -> String {
        match self {
            PolymarketError::HttpStatus { body, .. } => extract_error_message(body),
            PolymarketError::Rejected(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PolymarketError::HttpStatus { status, .. } => Some(*status),
            PolymarketError::HttpClient(err) => err.status(),
            _ => None,
        }
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("errorMsg"))
                .and_then(|message| message.as_str())
                .map(|message| message.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string())
}

pub type Result<T> = std::result::Result<T, PolymarketError>;
