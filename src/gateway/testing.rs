//! In-memory `ProviderApi` for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::ProviderApi;
use crate::core::GatewayError;

/// Canned upstream. Unknown keys answer with an upstream error; every call
/// that actually starts is logged as `operation:key`.
#[derive(Default)]
pub struct FakeApi {
    responses: HashMap<String, Value>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, operation: &str, key: &str, value: Value) -> Self {
        self.responses.insert(format!("{}:{}", operation, key), value);
        self
    }

    pub fn with_solana_wallet(self, wallet: &str, data: Value) -> Self {
        self.with("net_worth", wallet, data)
    }

    pub fn with_net_worth_history(self, wallet: &str, data: Value) -> Self {
        self.with("net_worth_history", wallet, data)
    }

    pub fn with_evm_wallet(self, wallet: &str, body: Value) -> Self {
        self.with("positions", wallet, body)
    }

    pub fn with_price(self, token: &str, data: Value) -> Self {
        self.with("price", token, data)
    }

    pub fn with_overview(self, token: &str, data: Value) -> Self {
        self.with("overview", token, data)
    }

    pub fn with_historical(self, token: &str, data: Value) -> Self {
        self.with("historical", token, data)
    }

    pub fn with_market_data(self, token: &str, data: Value) -> Self {
        self.with("market_data", token, data)
    }

    /// Every request for this wallet or token fails
    pub fn with_failing_wallet(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// Every request for this wallet or token never completes
    pub fn with_hanging_wallet(mut self, key: &str) -> Self {
        self.hanging.insert(key.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    async fn respond(&self, operation: &str, key: &str) -> Result<Value, GatewayError> {
        self.calls.lock().push(format!("{}:{}", operation, key));

        if self.hanging.contains(key) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(key) {
            return Err(GatewayError::Upstream(format!("{} unavailable for {}", operation, key)));
        }
        self.responses
            .get(&format!("{}:{}", operation, key))
            .cloned()
            .ok_or_else(|| GatewayError::Upstream(format!("no {} data for {}", operation, key)))
    }
}

#[async_trait]
impl ProviderApi for FakeApi {
    async fn solana_net_worth(&self, wallet: &str) -> Result<Value, GatewayError> {
        self.respond("net_worth", wallet).await
    }

    async fn solana_net_worth_history(&self, wallet: &str) -> Result<Value, GatewayError> {
        self.respond("net_worth_history", wallet).await
    }

    async fn evm_positions(&self, wallet: &str) -> Result<Value, GatewayError> {
        self.respond("positions", wallet).await
    }

    async fn token_price(&self, token: &str) -> Result<Value, GatewayError> {
        self.respond("price", token).await
    }

    async fn token_overview(&self, token: &str) -> Result<Value, GatewayError> {
        self.respond("overview", token).await
    }

    async fn historical_price(&self, token: &str, _unix_time: i64) -> Result<Value, GatewayError> {
        self.respond("historical", token).await
    }

    async fn market_data(&self, token: &str) -> Result<Value, GatewayError> {
        self.respond("market_data", token).await
    }
}
