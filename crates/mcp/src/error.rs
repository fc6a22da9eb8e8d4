use polymarket::{is_not_found, PolymarketError};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure of a single tool call, as reported back to the MCP client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NoLiquidity(String),
    #[error("{0}")]
    RejectedByExchange(String),
    #[error("{0}")]
    InsufficientBalance(String),
    #[error("{0}")]
    UpstreamUnavailable(String),
    #[error("{0}")]
    CredentialError(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "InvalidArguments",
            ToolError::UnknownTool(_) => "UnknownTool",
            ToolError::NotFound(_) => "NotFound",
            ToolError::NoLiquidity(_) => "NoLiquidity",
            ToolError::RejectedByExchange(_) => "RejectedByExchange",
            ToolError::InsufficientBalance(_) => "InsufficientBalance",
            ToolError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            ToolError::CredentialError(_) => "CredentialError",
        }
    }

    /// `{"error": {"kind": ..., "message": ...}}`
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }

    /// Mapping for calls that submit or cancel orders: a 4xx from the exchange
    /// is a rejection carrying the upstream reason verbatim.
    pub fn from_order_error(err: PolymarketError) -> Self {
        if is_rejection_status(&err) && !is_not_found(&err) {
            return rejection(err.upstream_message());
        }
        ToolError::from(err)
    }
}

/// Mapping for read-only calls.
impl From<PolymarketError> for ToolError {
    fn from(err: PolymarketError) -> Self {
        if is_not_found(&err) {
            return ToolError::NotFound(err.upstream_message());
        }

        match err {
            PolymarketError::HttpStatus { status, .. }
                if status.as_u16() == 401 || status.as_u16() == 403 =>
            {
                ToolError::CredentialError(format!(
                    "upstream refused the request credentials: {}",
                    err.upstream_message()
                ))
            }
            PolymarketError::HttpStatus { status, .. }
                if status.is_client_error() && status.as_u16() != 429 =>
            {
                ToolError::UpstreamUnavailable(format!(
                    "upstream rejected the request ({status}): {}",
                    err.upstream_message()
                ))
            }
            PolymarketError::HttpStatus { .. }
            | PolymarketError::HttpClient(_)
            | PolymarketError::Decode { .. }
            | PolymarketError::Serialize(_)
            | PolymarketError::Rpc(_) => ToolError::UpstreamUnavailable(err.to_string()),
            PolymarketError::Signature(_)
            | PolymarketError::Credentials(_)
            | PolymarketError::Header(_) => ToolError::CredentialError(err.to_string()),
            PolymarketError::Rejected(reason) => rejection(reason),
            PolymarketError::InvalidOrder(reason) => ToolError::InvalidArguments(reason),
            PolymarketError::NoLiquidity(reason) => ToolError::NoLiquidity(reason),
        }
    }
}

fn is_rejection_status(err: &PolymarketError) -> bool {
    match err.status() {
        Some(status) => status.is_client_error() && ![401, 403, 429].contains(&status.as_u16()),
        None => false,
    }
}

fn rejection(reason: String) -> ToolError {
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("not enough balance") || lowered.contains("allowance") {
        ToolError::InsufficientBalance(reason)
    } else {
        ToolError::RejectedByExchange(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> PolymarketError {
        PolymarketError::HttpStatus {
            status: status.try_into().unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn renders_kind_and_message() {
        let rendered = ToolError::NoLiquidity("empty bids".into()).to_json();
        assert_eq!(rendered["error"]["kind"], "NoLiquidity");
        assert_eq!(rendered["error"]["message"], "empty bids");

        let unknown = ToolError::UnknownTool("nope".into()).to_json();
        assert_eq!(unknown["error"]["kind"], "UnknownTool");
        assert_eq!(unknown["error"]["message"], "unknown tool `nope`");
    }

    #[test]
    fn read_errors_map_by_status() {
        assert_eq!(
            ToolError::from(http(404, r#"{"error":"market not found"}"#)),
            ToolError::NotFound("market not found".into())
        );
        assert_eq!(
            ToolError::from(http(400, r#"{"error":"No orderbook exists for the requested token id"}"#))
                .kind(),
            "NotFound"
        );
        assert_eq!(
            ToolError::from(http(400, r#"{"error":"invalid token id"}"#)),
            ToolError::UpstreamUnavailable(
                "upstream rejected the request (400 Bad Request): invalid token id".into()
            )
        );
        assert_eq!(ToolError::from(http(422, "unprocessable")).kind(), "UpstreamUnavailable");
        assert_eq!(ToolError::from(http(503, "down")).kind(), "UpstreamUnavailable");
        assert_eq!(ToolError::from(http(429, "slow down")).kind(), "UpstreamUnavailable");
        assert_eq!(ToolError::from(http(401, "")).kind(), "CredentialError");
    }

    #[test]
    fn order_errors_keep_the_exchange_reason() {
        assert_eq!(
            ToolError::from_order_error(http(400, r#"{"error":"invalid price (0.999), min: 0.01 - max: 0.99"}"#)),
            ToolError::RejectedByExchange("invalid price (0.999), min: 0.01 - max: 0.99".into())
        );
        assert_eq!(
            ToolError::from_order_error(http(
                400,
                r#"{"error":"not enough balance / allowance"}"#
            ))
            .kind(),
            "InsufficientBalance"
        );
        assert_eq!(
            ToolError::from_order_error(PolymarketError::Rejected("order crosses book".into())),
            ToolError::RejectedByExchange("order crosses book".into())
        );
        assert_eq!(
            ToolError::from_order_error(http(404, "")).kind(),
            "NotFound"
        );
        assert_eq!(ToolError::from_order_error(http(500, "boom")).kind(), "UpstreamUnavailable");
    }

    #[test]
    fn local_failures_map_to_their_kind() {
        assert_eq!(
            ToolError::from(PolymarketError::InvalidOrder("price 1.5 out of range".into())).kind(),
            "InvalidArguments"
        );
        assert_eq!(
            ToolError::from(PolymarketError::Credentials("no key".into())).kind(),
            "CredentialError"
        );
        assert_eq!(
            ToolError::from(PolymarketError::NoLiquidity("thin".into())),
            ToolError::NoLiquidity("thin".into())
        );
        assert_eq!(
            ToolError::from(PolymarketError::Rpc("reverted".into())).kind(),
            "UpstreamUnavailable"
        );
    }
}
