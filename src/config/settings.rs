//! Configuration structures, loaded from TOML with every field defaulted

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "tallyfolio.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderSettings,
    pub scan: ScanSettings,
    pub cache: CacheSettings,
    pub change: ChangeSettings,
    pub render: RenderSettings,
    pub display: DisplaySettings,
}

/// Where the two upstream proxies live and which upstream paths they forward
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    /// Proxy A: market, price and Solana net-worth data
    pub market_proxy: String,
    /// Proxy B: EVM positions
    pub positions_proxy: String,
    pub timeout_secs: u64,
    pub net_worth_path: String,
    pub net_worth_history_path: String,
    pub price_path: String,
    pub overview_path: String,
    pub historical_price_path: String,
    pub market_data_path: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            market_proxy: "birdeye".to_string(),
            positions_proxy: "zerion".to_string(),
            timeout_secs: 20,
            net_worth_path: "/wallet/v2/net-worth".to_string(),
            net_worth_history_path: "/wallet/v2/net-worth-details".to_string(),
            price_path: "/defi/price".to_string(),
            overview_path: "/defi/token_overview".to_string(),
            historical_price_path: "/defi/historical_price_unix".to_string(),
            market_data_path: "/defi/v3/token/market-data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSettings {
    pub concurrency: usize,
    /// Pool size on constrained hosts
    pub constrained_concurrency: usize,
    pub constrained: bool,
    /// Parallel token lookups while enriching one Solana wallet
    pub enrichment_concurrency: usize,
    /// Re-run 24h enrichment on cached Solana holdings
    pub refresh_change_on_cache_hit: bool,
    /// Holdings below this value skip change resolution
    pub enrich_min_value_usd: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            constrained_concurrency: 2,
            constrained: false,
            enrichment_concurrency: 6,
            refresh_change_on_cache_hit: true,
            enrich_min_value_usd: 0.0,
        }
    }
}

impl ScanSettings {
    pub fn worker_count(&self) -> usize {
        let size = if self.constrained {
            self.constrained_concurrency
        } else {
            self.concurrency
        };
        size.max(1)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub wallet_ttl_secs: u64,
    pub change_ttl_secs: u64,
    pub change_zero_ttl_secs: u64,
    pub overview_ttl_secs: u64,
    pub market_cap_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            wallet_ttl_secs: 600,
            change_ttl_secs: 600,
            change_zero_ttl_secs: 30,
            overview_ttl_secs: 600,
            market_cap_ttl_secs: 600,
        }
    }
}

/// Eligibility gate and numeric tolerances for 24h change
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChangeSettings {
    pub min_liquidity_usd: f64,
    pub min_volume_usd: f64,
    /// Percent changes at or below this magnitude count as "not found"
    pub zero_epsilon: f64,
    pub native_mints: Vec<String>,
}

impl Default for ChangeSettings {
    fn default() -> Self {
        Self {
            min_liquidity_usd: 5000.0,
            min_volume_usd: 5000.0,
            zero_epsilon: 1e-9,
            native_mints: vec![
                "So11111111111111111111111111111111111111111".to_string(),
                "So11111111111111111111111111111111111111112".to_string(),
            ],
        }
    }
}

impl ChangeSettings {
    pub fn is_native(&self, token: &str) -> bool {
        self.native_mints.iter().any(|mint| mint == token)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSettings {
    pub frame_interval_ms: u64,
    /// Minimum spacing between renders while a scan is running
    pub scan_throttle_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            scan_throttle_ms: 650,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub dust_threshold_usd: f64,
    pub top_holdings: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            dust_threshold_usd: 1.0,
            top_holdings: 25,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load the explicit `path`, else `tallyfolio.toml` when present, else defaults.
    ///
    /// An explicit path that does not exist falls back to defaults with a warning.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match ConfigSource::locate(path) {
            ConfigSource::File(path) => Self::load_from_file(&path),
            ConfigSource::MissingExplicit(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            ConfigSource::Defaults => Ok(Self::default()),
        }
    }
}

/// Where `Config::load` reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Path given on the command line but absent on disk
    MissingExplicit(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn locate(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(path) if path.exists() => ConfigSource::File(path.to_path_buf()),
            Some(path) => ConfigSource::MissingExplicit(path.to_path_buf()),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    ConfigSource::File(default.to_path_buf())
                } else {
                    ConfigSource::Defaults
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[scan]\nconstrained = true\n\n[change]\nmin_liquidity_usd = 10000.0"
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.scan.worker_count(), 2);
        assert_eq!(config.change.min_liquidity_usd, 10000.0);
        assert_eq!(config.change.min_volume_usd, 5000.0);
        assert_eq!(config.cache.change_zero_ttl_secs, 30);
        assert_eq!(config.render.scan_throttle_ms, 650);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert_eq!(
            ConfigSource::locate(Some(path.as_path())),
            ConfigSource::MissingExplicit(path.clone())
        );
        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.scan.worker_count(), 4);
        assert!(config.change.is_native("So11111111111111111111111111111111111111112"));
    }

    #[test]
    fn test_explicit_existing_path_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nconcurrency = 6").unwrap();

        assert_eq!(
            ConfigSource::locate(Some(file.path())),
            ConfigSource::File(file.path().to_path_buf())
        );
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.scan.worker_count(), 6);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan\nconcurrency = ").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }
}
