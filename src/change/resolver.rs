//! Solana 24h change resolution with tiered fallback, eligibility gating
//! and market-cap enrichment.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::delta::{holding_delta_usd, pct_from_prices};
use crate::config::{ChangeSettings, Config};
use crate::core::{GatewayError, HoldingRecord};
use crate::gateway::{cancellable, ProviderApi};
use crate::util::cache::Caches;
use crate::util::extract::*;

const DAY_SECS: i64 = 24 * 60 * 60;

const HISTORICAL_ITEM_PATHS: &[FieldPath] = &[&["items"], &["data", "items"]];

/// Where a resolved 24h change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Cache,
    Price,
    Overview,
    HistUnix,
    None,
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeSource::Cache => "cache",
            ChangeSource::Price => "price",
            ChangeSource::Overview => "overview",
            ChangeSource::HistUnix => "hist_unix",
            ChangeSource::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeResolution {
    /// Percent, 0 when unresolved
    pub pct: f64,
    pub source: ChangeSource,
}

impl ChangeResolution {
    fn unresolved() -> Self {
        Self {
            pct: 0.0,
            source: ChangeSource::None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.source != ChangeSource::None
    }
}

/// Resolves and attaches 24h change data to Solana holdings.
///
/// Tier failures are logged and skipped. Only cancellation is returned as an
/// error, and a cancelled resolution caches nothing.
pub struct ChangeResolver {
    api: Arc<dyn ProviderApi>,
    caches: Arc<Caches>,
    settings: ChangeSettings,
    enrichment_concurrency: usize,
    enrich_min_value_usd: f64,
}

impl ChangeResolver {
    pub fn new(api: Arc<dyn ProviderApi>, caches: Arc<Caches>, config: &Config) -> Self {
        Self {
            api,
            caches,
            settings: config.change.clone(),
            enrichment_concurrency: config.scan.enrichment_concurrency.max(1),
            enrich_min_value_usd: config.scan.enrich_min_value_usd,
        }
    }

    fn significant(&self, pct: Option<f64>) -> Option<f64> {
        pct.filter(|p| p.is_finite() && p.abs() > self.settings.zero_epsilon)
    }

    pub async fn resolve_change_pct(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<ChangeResolution, GatewayError> {
        if let Some(pct) = self.caches.change.get(token) {
            return Ok(match self.significant(Some(pct)) {
                Some(pct) => ChangeResolution {
                    pct,
                    source: ChangeSource::Cache,
                },
                None => ChangeResolution::unresolved(),
            });
        }

        let resolution = self.resolve_uncached(token, cancel).await?;
        self.caches.change.set(token, resolution.pct);
        debug!("24h change for {}: {:.4}% ({})", token, resolution.pct, resolution.source);
        Ok(resolution)
    }

    async fn resolve_uncached(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<ChangeResolution, GatewayError> {
        // Tier 1: price endpoint
        let price_data = tolerate(
            "price",
            token,
            cancellable(cancel, self.api.token_price(token)).await,
        )?;
        let mut price_now = price_data
            .as_ref()
            .and_then(|data| first_number(data, PRICE_PATHS));
        if let Some(pct) = self.significant(price_data.as_ref().and_then(|d| first_number(d, PRICE_CHANGE_PATHS))) {
            return Ok(ChangeResolution {
                pct,
                source: ChangeSource::Price,
            });
        }

        // Tier 2: token overview
        let overview = self.overview(token, cancel).await?;
        if let Some(pct) = self.significant(overview.as_ref().and_then(|d| first_number(d, OVERVIEW_CHANGE_PATHS))) {
            return Ok(ChangeResolution {
                pct,
                source: ChangeSource::Overview,
            });
        }

        // Tier 3: price 24h ago
        let then = Utc::now().timestamp() - DAY_SECS;
        let Some(historical) = tolerate(
            "historical",
            token,
            cancellable(cancel, self.api.historical_price(token, then)).await,
        )?
        else {
            return Ok(ChangeResolution::unresolved());
        };

        let pct = match first_number(&historical, HISTORICAL_CHANGE_PATHS) {
            Some(pct) => pct,
            None => {
                let Some(price_then) = historical_price(&historical) else {
                    return Ok(ChangeResolution::unresolved());
                };
                if price_now.is_none() {
                    price_now = tolerate(
                        "price",
                        token,
                        cancellable(cancel, self.api.token_price(token)).await,
                    )?
                    .and_then(|data| first_number(&data, PRICE_PATHS));
                }
                match price_now {
                    Some(now) => pct_from_prices(now, price_then),
                    None => 0.0,
                }
            }
        };

        Ok(match self.significant(Some(pct)) {
            Some(pct) => ChangeResolution {
                pct,
                source: ChangeSource::HistUnix,
            },
            None => ChangeResolution::unresolved(),
        })
    }

    /// Token overview through the overview cache
    async fn overview(&self, token: &str, cancel: &CancellationToken) -> Result<Option<Value>, GatewayError> {
        if let Some(overview) = self.caches.overview.get(token) {
            return Ok(Some(overview));
        }
        let overview = tolerate(
            "overview",
            token,
            cancellable(cancel, self.api.token_overview(token)).await,
        )?;
        if let Some(overview) = &overview {
            self.caches.overview.set(token, overview.clone());
        }
        Ok(overview)
    }

    /// Native asset, or liquidity / 24h volume at or above the thresholds
    pub async fn is_change_eligible(&self, token: &str, cancel: &CancellationToken) -> Result<bool, GatewayError> {
        if self.settings.is_native(token) {
            return Ok(true);
        }
        let Some(overview) = self.overview(token, cancel).await? else {
            return Ok(false);
        };

        let liquidity = first_number(&overview, LIQUIDITY_PATHS).unwrap_or(0.0);
        let volume = first_number(&overview, VOLUME_24H_PATHS).unwrap_or(0.0);
        Ok(liquidity >= self.settings.min_liquidity_usd || volume >= self.settings.min_volume_usd)
    }

    /// Market cap in USD, 0 when the provider has none
    pub async fn market_cap(&self, token: &str, cancel: &CancellationToken) -> Result<f64, GatewayError> {
        if let Some(mcap) = self.caches.market_cap.get(token) {
            return Ok(mcap);
        }
        let data = tolerate(
            "market_data",
            token,
            cancellable(cancel, self.api.market_data(token)).await,
        )?;
        let Some(mcap) = data.and_then(|data| first_number(&data, MARKET_CAP_PATHS)) else {
            return Ok(0.0);
        };
        self.caches.market_cap.set(token, mcap);
        Ok(mcap)
    }

    /// Attach change fields and market cap to every holding, preserving order
    pub async fn enrich_holdings(
        &self,
        holdings: Vec<HoldingRecord>,
        cancel: &CancellationToken,
    ) -> Result<Vec<HoldingRecord>, GatewayError> {
        let enriched: Vec<Result<HoldingRecord, GatewayError>> = stream::iter(holdings)
            .map(|holding| self.enrich_holding(holding, cancel))
            .buffered(self.enrichment_concurrency)
            .collect()
            .await;
        enriched.into_iter().collect()
    }

    async fn enrich_holding(
        &self,
        mut holding: HoldingRecord,
        cancel: &CancellationToken,
    ) -> Result<HoldingRecord, GatewayError> {
        holding.change_pct = 0.0;
        holding.change_usd = 0.0;
        holding.change_eligible = false;
        if holding.value_usd < self.enrich_min_value_usd {
            return Ok(holding);
        }

        let token = holding.token_address.clone();
        let resolution = self.resolve_change_pct(&token, cancel).await?;
        if resolution.is_found() {
            holding.change_pct = resolution.pct;
            holding.change_usd = holding_delta_usd(holding.value_usd, resolution.pct);
            holding.change_eligible = self.is_change_eligible(&token, cancel).await?;
        }

        if holding.market_cap_usd <= 0.0 {
            holding.market_cap_usd = self.market_cap(&token, cancel).await?;
        }
        Ok(holding)
    }
}

/// Swallow a tier failure, keeping cancellation as the only error
fn tolerate(tier: &str, token: &str, result: Result<Value, GatewayError>) -> Result<Option<Value>, GatewayError> {
    match result {
        Ok(data) => Ok(Some(data)),
        Err(GatewayError::Cancelled) => Err(GatewayError::Cancelled),
        Err(e) => {
            debug!("{} lookup failed for {}: {}", tier, token, e);
            Ok(None)
        }
    }
}

fn historical_price(data: &Value) -> Option<f64> {
    first_number(data, PRICE_PATHS).or_else(|| {
        first_array(data, HISTORICAL_ITEM_PATHS)
            .and_then(|items| items.last())
            .and_then(|item| first_number(item, PRICE_PATHS))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Chain;
    use crate::gateway::testing::FakeApi;
    use serde_json::json;
    use std::time::Duration;

    const SOL: &str = "So11111111111111111111111111111111111111112";
    const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    fn resolver(api: FakeApi) -> (ChangeResolver, Arc<FakeApi>) {
        let config = Config::default();
        let api = Arc::new(api);
        let caches = Arc::new(Caches::new(&config.cache, config.change.zero_epsilon));
        (ChangeResolver::new(api.clone(), caches, &config), api)
    }

    #[tokio::test]
    async fn test_price_tier_wins_when_nonzero() {
        let (resolver, api) = resolver(
            FakeApi::new().with_price(BONK, json!({ "value": 0.00002, "priceChange24h": 5.0 })),
        );
        let resolution = resolver
            .resolve_change_pct(BONK, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.source, ChangeSource::Price);
        assert_eq!(resolution.pct, 5.0);
        assert_eq!(api.calls_to("overview"), 0);
    }

    #[tokio::test]
    async fn test_zero_price_change_falls_through_to_overview() {
        let (resolver, _api) = resolver(
            FakeApi::new()
                .with_price(BONK, json!({ "value": 0.00002, "priceChange24h": 0.0 }))
                .with_overview(BONK, json!({ "frames": { "24h": { "priceChangePercent": -3.5 } } })),
        );
        let resolution = resolver
            .resolve_change_pct(BONK, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.source, ChangeSource::Overview);
        assert_eq!(resolution.pct, -3.5);
    }

    #[tokio::test]
    async fn test_historical_tier_computes_from_prices() {
        let (resolver, api) = resolver(
            FakeApi::new()
                .with_price(BONK, json!({ "value": 110.0 }))
                .with_overview(BONK, json!({ "liquidity": 10.0 }))
                .with_historical(BONK, json!({ "value": 100.0 })),
        );
        let resolution = resolver
            .resolve_change_pct(BONK, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.source, ChangeSource::HistUnix);
        assert!((resolution.pct - 10.0).abs() < 1e-9);
        // Current price from tier 1 is reused
        assert_eq!(api.calls_to("price"), 1);
    }

    #[tokio::test]
    async fn test_historical_tier_refetches_price_after_tier_one_failure() {
        let (resolver, api) = resolver(
            FakeApi::new()
                .with_historical(BONK, json!({ "items": [{ "unixTime": 1, "value": 50.0 }] })),
        );
        let resolution = resolver
            .resolve_change_pct(BONK, &CancellationToken::new())
            .await
            .unwrap();
        // Price never available, so nothing can be computed
        assert_eq!(resolution, ChangeResolution::unresolved());
        assert_eq!(api.calls_to("price"), 2);
    }

    #[tokio::test]
    async fn test_historical_tier_prefers_provider_change_field() {
        let (resolver, api) = resolver(
            FakeApi::new().with_historical(BONK, json!({ "priceChange24h": 7.0, "value": 100.0 })),
        );
        let resolution = resolver
            .resolve_change_pct(BONK, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.source, ChangeSource::HistUnix);
        assert_eq!(resolution.pct, 7.0);
        // No current price needed when the provider reports the change itself
        assert_eq!(api.calls_to("price"), 1);
        assert_eq!(api.calls_to("historical"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_is_cached_briefly() {
        let (resolver, api) = resolver(FakeApi::new());
        let cancel = CancellationToken::new();

        let first = resolver.resolve_change_pct(BONK, &cancel).await.unwrap();
        assert!(!first.is_found());
        let calls = api.call_count();
        assert_eq!(calls, 3);

        resolver.resolve_change_pct(BONK, &cancel).await.unwrap();
        assert_eq!(api.call_count(), calls);

        tokio::time::advance(Duration::from_secs(31)).await;
        resolver.resolve_change_pct(BONK, &cancel).await.unwrap();
        assert!(api.call_count() > calls);
    }

    #[tokio::test]
    async fn test_cancelled_resolution_caches_nothing() {
        let (resolver, api) = resolver(FakeApi::new().with_price(BONK, json!({ "priceChange24h": 4.0 })));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolver.resolve_change_pct(BONK, &cancel).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
        assert_eq!(api.call_count(), 0);
        assert!(resolver.caches.change.is_empty());
    }

    #[tokio::test]
    async fn test_eligibility_gate() {
        let (resolver, api) = resolver(
            FakeApi::new()
                .with_overview("liquid", json!({ "liquidity": 6000.0, "v24hUSD": 10.0 }))
                .with_overview("traded", json!({ "liquidity": 10.0, "v24hUSD": 5000.0 }))
                .with_overview("thin", json!({ "liquidity": 4999.0, "v24hUSD": 4999.0 })),
        );
        let cancel = CancellationToken::new();

        assert!(resolver.is_change_eligible(SOL, &cancel).await.unwrap());
        assert_eq!(api.call_count(), 0);
        assert!(resolver.is_change_eligible("liquid", &cancel).await.unwrap());
        assert!(resolver.is_change_eligible("traded", &cancel).await.unwrap());
        assert!(!resolver.is_change_eligible("thin", &cancel).await.unwrap());
        assert!(!resolver.is_change_eligible("missing", &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_enrich_holdings_attaches_change_and_mcap() {
        let (resolver, _api) = resolver(
            FakeApi::new()
                .with_price(SOL, json!({ "value": 200.0, "priceChange24h": 2.0 }))
                .with_market_data(SOL, json!({ "marketCap": 90000000000.0 })),
        );

        let mut sol = HoldingRecord::new(Chain::Solana, SOL);
        sol.value_usd = 500.0;
        let mut junk = HoldingRecord::new(Chain::Solana, "junk");
        junk.value_usd = 3.0;

        let enriched = resolver
            .enrich_holdings(vec![sol, junk], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(enriched[0].token_address, SOL);
        assert!(enriched[0].change_eligible);
        assert!((enriched[0].change_usd - 500.0 * 0.02 / 1.02).abs() < 1e-9);
        assert_eq!(enriched[0].market_cap_usd, 90000000000.0);

        assert_eq!(enriched[1].token_address, "junk");
        assert!(!enriched[1].change_eligible);
        assert_eq!(enriched[1].change_usd, 0.0);
        assert_eq!(enriched[1].market_cap_usd, 0.0);
    }
}
