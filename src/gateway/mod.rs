//! Provider gateway: upstream proxy access and normalization into holdings
//!
//! Upstream payloads cross this boundary as loose JSON and leave it as
//! `HoldingRecord`s. Every public call takes the scan's cancellation token.

pub mod client;
pub mod evm;
pub mod solana;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{Chain, GatewayError, HoldingRecord};

pub use client::ProxyClient;

/// Raw upstream operations. Market calls return the unwrapped `data` payload.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Solana wallet net worth with its token items
    async fn solana_net_worth(&self, wallet: &str) -> Result<Value, GatewayError>;

    /// Solana wallet net-worth history
    async fn solana_net_worth_history(&self, wallet: &str) -> Result<Value, GatewayError>;

    /// EVM positions body as returned by the positions proxy
    async fn evm_positions(&self, wallet: &str) -> Result<Value, GatewayError>;

    async fn token_price(&self, token: &str) -> Result<Value, GatewayError>;

    async fn token_overview(&self, token: &str) -> Result<Value, GatewayError>;

    /// Price of `token` at `unix_time`
    async fn historical_price(&self, token: &str, unix_time: i64) -> Result<Value, GatewayError>;

    async fn market_data(&self, token: &str) -> Result<Value, GatewayError>;
}

/// Run `request` unless `cancel` fires first; the dropped request is aborted
pub async fn cancellable<T, F>(cancel: &CancellationToken, request: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    if cancel.is_cancelled() {
        return Err(GatewayError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = request => result,
    }
}

/// Fetch and normalize one wallet's holdings on one chain
pub async fn fetch_wallet_holdings(
    api: &dyn ProviderApi,
    wallet: &str,
    chain: Chain,
    cancel: &CancellationToken,
) -> Result<Vec<HoldingRecord>, GatewayError> {
    let holdings = match chain {
        Chain::Evm => {
            let body = cancellable(cancel, api.evm_positions(wallet)).await?;
            evm::normalize_positions(&body)?
        }
        Chain::Solana => {
            let data = cancellable(cancel, api.solana_net_worth(wallet)).await?;
            solana::normalize_items(&data)?
        }
    };
    debug!("Fetched {} {} holdings for {}", holdings.len(), chain, wallet);
    Ok(holdings)
}

/// Wallet-level day change from the Solana net-worth history
pub async fn fetch_wallet_day_change(
    api: &dyn ProviderApi,
    wallet: &str,
    cancel: &CancellationToken,
) -> Result<Option<f64>, GatewayError> {
    let data = cancellable(cancel, api.solana_net_worth_history(wallet)).await?;
    Ok(solana::day_change_from_history(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FakeApi;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pre_cancelled_token_issues_no_request() {
        let api = FakeApi::new().with_solana_wallet("w1", json!({ "items": [] }));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetch_wallet_holdings(&api, "w1", Chain::Solana, &cancel).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_request() {
        let api = std::sync::Arc::new(FakeApi::new().with_hanging_wallet("slow"));
        let cancel = CancellationToken::new();

        let task = {
            let api = api.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                fetch_wallet_holdings(api.as_ref(), "slow", Chain::Evm, &cancel).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(GatewayError::Cancelled)));
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces() {
        let api = FakeApi::new().with_failing_wallet("bad");
        let cancel = CancellationToken::new();
        let result = fetch_wallet_holdings(&api, "bad", Chain::Evm, &cancel).await;
        assert!(matches!(result, Err(GatewayError::Upstream(_))));
    }
}
