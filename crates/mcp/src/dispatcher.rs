use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, JsonObject};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::ToolError;
use crate::gateway::MarketGateway;
use crate::registry::{ToolName, ToolRegistry};
use crate::types::{ToolInput, ToolInvocation, ToolReply};
use crate::{account, market, trade};

/// Routes tool calls to their handlers. Holds no mutable state, so concurrent
/// calls are independent.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    gateway: Arc<dyn MarketGateway>,
    search_max_pages: usize,
}

impl ToolDispatcher {
    pub fn new(
        registry: ToolRegistry,
        gateway: Arc<dyn MarketGateway>,
        search_max_pages: usize,
    ) -> Self {
        Self {
            registry,
            gateway,
            search_max_pages: search_max_pages.max(1),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve, validate and run one tool call.
    #[instrument(skip(self, arguments), fields(tool = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .registry
            .lookup(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments = Value::Object(arguments.unwrap_or_default());

        let result = self.run(tool, arguments).await;
        match &result {
            Ok(_) => info!("tool call succeeded"),
            Err(err) => warn!(kind = err.kind(), error = %err, "tool call failed"),
        }
        result
    }

    async fn run(&self, tool: ToolName, arguments: Value) -> Result<Value, ToolError> {
        let gateway = self.gateway.as_ref();
        match tool {
            ToolName::GetMarkets => render(market::get_markets(gateway, parse(arguments)?).await),
            ToolName::SearchMarkets => render(
                market::search_markets(gateway, parse(arguments)?, self.search_max_pages).await,
            ),
            ToolName::GetMarket => render(market::get_market(gateway, parse(arguments)?).await),
            ToolName::GetOrderBook => {
                render(market::get_order_book(gateway, parse(arguments)?).await)
            }
            ToolName::GetMidPrice => render(market::get_mid_price(gateway, parse(arguments)?).await),
            ToolName::GetPrice => render(market::get_price(gateway, parse(arguments)?).await),
            ToolName::PlaceLimitOrder => {
                render(trade::place_limit_order(gateway, parse(arguments)?).await)
            }
            ToolName::PlaceMarketOrder => {
                render(trade::place_market_order(gateway, parse(arguments)?).await)
            }
            ToolName::CancelOrder => render(trade::cancel_order(gateway, parse(arguments)?).await),
            ToolName::GetUsdcBalance => {
                render(account::get_usdc_balance(gateway, parse(arguments)?).await)
            }
            ToolName::GetPositions => {
                render(account::get_positions(gateway, parse(arguments)?).await)
            }
            ToolName::GetClosedPositions => {
                render(account::get_closed_positions(gateway, parse(arguments)?).await)
            }
            ToolName::GetTrades => render(account::get_trades(gateway, parse(arguments)?).await),
            ToolName::GetPortfolioValue => {
                render(account::get_portfolio_value(gateway, parse(arguments)?).await)
            }
        }
    }

    /// MCP envelope: success carries the JSON payload as text, failures set `isError`.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        match self.dispatch(name, arguments).await {
            Ok(value) => CallToolResult::success(vec![Content::text(value.to_string())]),
            Err(err) => CallToolResult::error(vec![Content::text(err.to_json().to_string())]),
        }
    }

    /// Envelope used by the CLI. A non-object payload counts as no arguments
    /// when it is `null`, and as invalid otherwise.
    pub async fn invoke(&self, invocation: &ToolInvocation) -> ToolReply {
        let arguments = match &invocation.payload {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(map.clone())),
            other => Err(ToolError::InvalidArguments(format!(
                "arguments must be a JSON object, got {other}"
            ))),
        };

        let result = match arguments {
            Ok(arguments) => self.dispatch(&invocation.tool, arguments).await,
            Err(err) => Err(err),
        };
        ToolReply::from_result(result)
    }
}

fn parse<T: ToolInput>(arguments: Value) -> Result<T, ToolError> {
    let request: T = serde_json::from_value(arguments)
        .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
    request.validate()?;
    Ok(request)
}

fn render<T: Serialize>(result: Result<T, ToolError>) -> Result<Value, ToolError> {
    let value = result?;
    serde_json::to_value(value).map_err(|err| {
        ToolError::UpstreamUnavailable(format!("failed to encode tool response: {err}"))
    })
}
