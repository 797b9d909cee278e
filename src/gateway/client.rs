//! HTTP client for the two upstream proxies

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::ProviderApi;
use crate::config::ProviderSettings;
use crate::core::GatewayError;
use crate::util::display::truncate;
use crate::util::extract::{first_string, FieldPath};

const SOLANA_CHAIN_HEADER: &str = "solana";
const MAX_ERROR_BODY_CHARS: usize = 200;

const ERROR_MESSAGE_PATHS: &[FieldPath] = &[
    &["message"],
    &["error"],
    &["error", "message"],
];

/// Thin client for proxy A (market data) and proxy B (EVM positions).
///
/// Proxy A: `GET /api/<market_proxy>?path=<upstream>&...` with an `x-chain`
/// header, answering `{ success, data, message? }`.
/// Proxy B: `GET /api/<positions_proxy>?address=...` answering `{ data: [...] }`.
pub struct ProxyClient {
    client: Client,
    base_url: Url,
    settings: ProviderSettings,
}

impl ProxyClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    fn endpoint(&self, proxy: &str) -> Result<Url, GatewayError> {
        Ok(self.base_url.join(&format!("api/{}", proxy))?)
    }

    #[instrument(skip(self, query))]
    async fn market_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let url = self.endpoint(&self.settings.market_proxy)?;
        let response = self
            .client
            .get(url)
            .header("x-chain", SOLANA_CHAIN_HEADER)
            .header("accept", "application/json")
            .query(&[("path", path)])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body = parse_body(status, &text)?;
        unwrap_envelope(body)
    }
}

fn parse_body(status: StatusCode, text: &str) -> Result<Value, GatewayError> {
    match serde_json::from_str::<Value>(text) {
        Ok(body) if status.is_success() => Ok(body),
        Ok(body) => Err(GatewayError::Status {
            status: status.as_u16(),
            message: first_string(&body, ERROR_MESSAGE_PATHS)
                .unwrap_or_else(|| truncate(text, MAX_ERROR_BODY_CHARS)),
        }),
        Err(_) if !status.is_success() => Err(GatewayError::Status {
            status: status.as_u16(),
            message: truncate(text, MAX_ERROR_BODY_CHARS),
        }),
        Err(e) => Err(GatewayError::Parse(format!("malformed JSON: {}", e))),
    }
}

/// Unwrap proxy A's `{ success, data, message }` envelope
pub fn unwrap_envelope(body: Value) -> Result<Value, GatewayError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = first_string(&body, ERROR_MESSAGE_PATHS)
            .unwrap_or_else(|| "upstream reported failure".to_string());
        return Err(GatewayError::Upstream(message));
    }
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Null) | None => Err(GatewayError::Parse("response has no data".to_string())),
            Some(data) => Ok(data),
        },
        _ => Err(GatewayError::Parse("response is not an object".to_string())),
    }
}

#[async_trait]
impl ProviderApi for ProxyClient {
    async fn solana_net_worth(&self, wallet: &str) -> Result<Value, GatewayError> {
        self.market_get(&self.settings.net_worth_path, &[("wallet", wallet.to_string())])
            .await
    }

    async fn solana_net_worth_history(&self, wallet: &str) -> Result<Value, GatewayError> {
        self.market_get(
            &self.settings.net_worth_history_path,
            &[("wallet", wallet.to_string()), ("type", "1d".to_string())],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn evm_positions(&self, wallet: &str) -> Result<Value, GatewayError> {
        let url = self.endpoint(&self.settings.positions_proxy)?;
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .query(&[
                ("address", wallet),
                ("filter[positions]", "only_simple"),
                ("filter[trash]", "only_non_trash"),
                ("currency", "usd"),
                ("sort", "value"),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!("Positions proxy answered {} ({} bytes)", status, text.len());
        parse_body(status, &text)
    }

    async fn token_price(&self, token: &str) -> Result<Value, GatewayError> {
        self.market_get(
            &self.settings.price_path,
            &[
                ("address", token.to_string()),
                ("include_liquidity", "true".to_string()),
            ],
        )
        .await
    }

    async fn token_overview(&self, token: &str) -> Result<Value, GatewayError> {
        self.market_get(&self.settings.overview_path, &[("address", token.to_string())])
            .await
    }

    async fn historical_price(&self, token: &str, unix_time: i64) -> Result<Value, GatewayError> {
        self.market_get(
            &self.settings.historical_price_path,
            &[
                ("address", token.to_string()),
                ("unixtime", unix_time.to_string()),
            ],
        )
        .await
    }

    async fn market_data(&self, token: &str) -> Result<Value, GatewayError> {
        self.market_get(&self.settings.market_data_path, &[("address", token.to_string())])
            .await
    }
}
