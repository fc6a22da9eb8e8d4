use std::time::Duration;

use chrono::Utc;
use pm_core::config::{AppConfig, ClobApiCredentials, SecretString};
use pm_core::types::{OrderType, Side};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::auth::WalletSigner;
use crate::error::{PolymarketError, Result};
use crate::models::{
    ApiKeyResponse, CancelOrderBody, CancelOrderResponse, MarketsPage, NegRiskResponse,
    OrderBook, PostOrderBody, PostOrderResponse, PriceResponse, TickSizeResponse,
};
use crate::order::{market_price, MarketOrderArgs, OrderArgs, OrderBuilder, SignedOrder};

pub(crate) const USER_AGENT: &str = "polymarket-mcp/0.1";

/// Client for the Polymarket CLOB REST API.
///
/// Public endpoints need nothing; API-key endpoints need a wallet signer and
/// trading endpoints additionally need level-2 API credentials.
#[derive(Debug, Clone)]
pub struct ClobRestClient {
    http: Client,
    base_url: String,
    signer: Option<WalletSigner>,
    credentials: Option<ClobApiCredentials>,
}

impl ClobRestClient {
    /// Public client; attach a signer and credentials separately.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.clob_host.clone(), config.http_timeout())
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = build_http_client(timeout)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer: None,
            credentials: None,
        })
    }

    pub fn with_signer(mut self, signer: WalletSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_api_credentials(mut self, credentials: ClobApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[instrument(skip(self))]
    pub async fn get_markets(&self, next_cursor: Option<&str>) -> Result<MarketsPage> {
        self.get_page("/markets", next_cursor).await
    }

    /// Markets currently eligible for rewards; in practice the live set.
    #[instrument(skip(self))]
    pub async fn get_sampling_markets(&self, next_cursor: Option<&str>) -> Result<MarketsPage> {
        self.get_page("/sampling-markets", next_cursor).await
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        self.get("/book", &[("token_id", token_id)]).await
    }

    /// Best price on `side` of the book, `None` when the side is empty.
    #[instrument(skip(self), fields(token_id = %token_id, side = %side))]
    pub async fn get_price(&self, token_id: &str, side: Side) -> Result<Option<Decimal>> {
        let response: PriceResponse = self
            .get("/price", &[("token_id", token_id), ("side", side.as_str())])
            .await?;

        match response.price.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<Decimal>()
                .map(Some)
                .map_err(|err| PolymarketError::Decode {
                    endpoint: "/price".into(),
                    reason: err.to_string(),
                }),
        }
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    pub async fn get_tick_size(&self, token_id: &str) -> Result<Decimal> {
        let response: TickSizeResponse = self.get("/tick-size", &[("token_id", token_id)]).await?;
        Ok(response.minimum_tick_size)
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    pub async fn get_neg_risk(&self, token_id: &str) -> Result<bool> {
        let response: NegRiskResponse = self.get("/neg-risk", &[("token_id", token_id)]).await?;
        Ok(response.neg_risk)
    }

    /// Registers a new API key for the wallet.
    #[instrument(skip(self))]
    pub async fn create_api_key(&self) -> Result<ClobApiCredentials> {
        let headers = self.require_signer()?.l1_headers(Utc::now().timestamp(), 0)?;
        let builder = self
            .http
            .request(Method::POST, self.url("/auth/api-key"))
            .headers(headers);
        let response: ApiKeyResponse = self.execute(builder, "/auth/api-key").await?;
        Ok(response.into())
    }

    /// Recovers the API key previously registered for the wallet.
    #[instrument(skip(self))]
    pub async fn derive_api_key(&self) -> Result<ClobApiCredentials> {
        let headers = self.require_signer()?.l1_headers(Utc::now().timestamp(), 0)?;
        let builder = self
            .http
            .request(Method::GET, self.url("/auth/derive-api-key"))
            .headers(headers);
        let response: ApiKeyResponse = self.execute(builder, "/auth/derive-api-key").await?;
        Ok(response.into())
    }

    pub async fn create_or_derive_api_credentials(&self) -> Result<ClobApiCredentials> {
        match self.create_api_key().await {
            Ok(credentials) => Ok(credentials),
            Err(err) => {
                tracing::info!(error = %err, "api key creation failed, deriving existing key");
                self.derive_api_key().await
            }
        }
    }

    /// Builds and signs a limit order using the token's live tick size and exchange.
    #[instrument(skip(self, args), fields(token_id = %args.token_id, side = %args.side))]
    pub async fn create_limit_order(&self, args: &OrderArgs) -> Result<SignedOrder> {
        let signer = self.require_signer()?;
        let tick_size = self.get_tick_size(&args.token_id).await?;
        let neg_risk = self.get_neg_risk(&args.token_id).await?;
        OrderBuilder::new(signer).build_limit_order(args, tick_size, neg_risk)
    }

    /// Prices a market order against the current book, then builds and signs it.
    #[instrument(skip(self), fields(token_id = %token_id, side = %side))]
    pub async fn create_market_order(
        &self,
        token_id: &str,
        side: Side,
        amount: Decimal,
        order_type: OrderType,
    ) -> Result<SignedOrder> {
        let signer = self.require_signer()?;
        let book = self.get_order_book(token_id).await?;
        let price = market_price(&book, side, amount, order_type)?;
        let tick_size = match book.tick_size {
            Some(tick) => tick,
            None => self.get_tick_size(token_id).await?,
        };
        let neg_risk = match book.neg_risk {
            Some(flag) => flag,
            None => self.get_neg_risk(token_id).await?,
        };

        let args = MarketOrderArgs {
            token_id: token_id.to_string(),
            amount,
            price,
            side,
        };
        OrderBuilder::new(signer).build_market_order(&args, tick_size, neg_risk)
    }

    #[instrument(skip(self, order), fields(order_type = %order_type))]
    pub async fn post_order(
        &self,
        order: &SignedOrder,
        order_type: OrderType,
    ) -> Result<PostOrderResponse> {
        let credentials = self.require_credentials()?;
        let payload = order.to_payload();
        let body = PostOrderBody {
            order: &payload,
            owner: &credentials.api_key,
            order_type,
        };

        let response: PostOrderResponse = self
            .authenticated(Method::POST, "/order", Some(serde_json::to_string(&body)?))
            .await?;

        if !response.success || !response.error_msg.is_empty() {
            let reason = if response.error_msg.is_empty() {
                "order was not accepted".to_string()
            } else {
                response.error_msg.clone()
            };
            return Err(PolymarketError::Rejected(reason));
        }
        Ok(response)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<CancelOrderResponse> {
        let body = serde_json::to_string(&CancelOrderBody { order_id })?;
        self.authenticated(Method::DELETE, "/order", Some(body)).await
    }

    async fn get_page(&self, path: &str, next_cursor: Option<&str>) -> Result<MarketsPage> {
        match next_cursor {
            Some(cursor) => self.get(path, &[("next_cursor", cursor)]).await,
            None => self.get(path, &[]).await,
        }
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        tracing::debug!("CLOB GET {} {:?}", path, query);
        let builder = self.http.get(self.url(path)).query(query);
        self.execute(builder, path).await
    }

    async fn authenticated<T>(&self, method: Method, path: &str, body: Option<String>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        tracing::debug!("CLOB {} {}", method, path);
        let builder = self.prepare_request(method, path, body)?;
        self.execute(builder, path).await
    }

    fn prepare_request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<RequestBuilder> {
        let signer = self.require_signer()?;
        let credentials = self.require_credentials()?;

        let mut headers: HeaderMap = signer.l2_headers(
            credentials,
            Utc::now().timestamp(),
            method.as_str(),
            path,
            body.as_deref(),
        )?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let builder = self.http.request(method, self.url(path)).headers(headers);
        Ok(match body {
            Some(payload) => builder.body(payload),
            None => builder,
        })
    }

    async fn execute<T>(&self, builder: RequestBuilder, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        execute_json(builder, endpoint).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn require_signer(&self) -> Result<&WalletSigner> {
        self.signer
            .as_ref()
            .ok_or_else(|| PolymarketError::Credentials("wallet private key is not configured".into()))
    }

    fn require_credentials(&self) -> Result<&ClobApiCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| PolymarketError::Credentials("CLOB API credentials are not available".into()))
    }
}

impl From<ApiKeyResponse> for ClobApiCredentials {
    fn from(response: ApiKeyResponse) -> Self {
        ClobApiCredentials {
            api_key: response.api_key,
            secret: SecretString::new(response.secret),
            passphrase: SecretString::new(response.passphrase),
        }
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(PolymarketError::from)
}

/// Sends the request and decodes a JSON body; non-2xx answers keep their body.
pub(crate) async fn execute_json<T>(builder: RequestBuilder, endpoint: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = builder.send().await?;
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());

    if !status.is_success() {
        return Err(PolymarketError::HttpStatus { status, body });
    }

    decode_body(&body, endpoint)
}

pub(crate) fn decode_body<T>(body: &str, endpoint: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|err| PolymarketError::Decode {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })
}

/// True for errors that mean the requested token or market does not exist.
pub fn is_not_found(err: &PolymarketError) -> bool {
    match err {
        PolymarketError::HttpStatus { status, .. } if *status == StatusCode::NOT_FOUND => true,
        PolymarketError::HttpStatus { .. } => err
            .upstream_message()
            .to_ascii_lowercase()
            .contains("no orderbook exists"),
        _ => false,
    }
}
