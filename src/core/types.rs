//! Shared domain types for wallets, holdings and portfolio totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain family a wallet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Evm,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Evm => "evm",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, scan-eligible wallet address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletIdentifier {
    /// Text exactly as the user supplied it
    pub raw: String,
    pub chain: Chain,
    /// Canonical form used for requests and keys
    pub normalized: String,
}

impl WalletIdentifier {
    /// Storage key for this wallet's results (`chain:address`)
    pub fn key(&self) -> String {
        wallet_key(self.chain, &self.normalized)
    }
}

/// Key under which a wallet's scan results are stored
pub fn wallet_key(chain: Chain, wallet: &str) -> String {
    format!("{}:{}", chain, wallet)
}

/// One queue entry of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub wallet: String,
    pub chain: Chain,
    /// Position in the input wallet list, used for stable progress display
    pub index: usize,
}

impl ScanJob {
    pub fn key(&self) -> String {
        wallet_key(self.chain, &self.wallet)
    }
}

/// A single token position of one wallet, before aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    pub token_address: String,
    pub contract_address: Option<String>,
    pub symbol: String,
    pub name: String,
    pub logo_url: String,
    pub price_usd: f64,
    pub balance: f64,
    pub value_usd: f64,
    pub market_cap_usd: f64,
    pub change_usd: f64,
    pub change_pct: f64,
    pub chain: Chain,
    pub network: Option<String>,
    pub change_eligible: bool,
}

impl HoldingRecord {
    /// Empty record for a token; normalizers fill in the rest
    pub fn new(chain: Chain, token_address: impl Into<String>) -> Self {
        Self {
            token_address: token_address.into(),
            contract_address: None,
            symbol: String::new(),
            name: String::new(),
            logo_url: String::new(),
            price_usd: 0.0,
            balance: 0.0,
            value_usd: 0.0,
            market_cap_usd: 0.0,
            change_usd: 0.0,
            change_pct: 0.0,
            chain,
            network: None,
            change_eligible: false,
        }
    }

    /// Address used to deduplicate this holding across wallets
    pub fn resolved_address(&self) -> &str {
        match self.chain {
            Chain::Evm => self
                .contract_address
                .as_deref()
                .unwrap_or(&self.token_address),
            Chain::Solana => &self.token_address,
        }
    }

    /// Deduplication key `chain:address`
    pub fn dedup_key(&self) -> String {
        match self.chain {
            Chain::Evm => format!("{}:{}", self.chain, self.resolved_address().to_lowercase()),
            Chain::Solana => format!("{}:{}", self.chain, self.resolved_address()),
        }
    }
}

/// Settled result of one (wallet, chain) job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletScan {
    pub wallet: String,
    pub chain: Chain,
    pub holdings: Vec<HoldingRecord>,
    /// Wallet-level 24h change reported by the net-worth history, when available
    pub day_change_usd: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl WalletScan {
    pub fn key(&self) -> String {
        wallet_key(self.chain, &self.wallet)
    }
}

/// One row of the deduplicated portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedHolding {
    pub key: String,
    pub chain: Chain,
    pub address: String,
    pub contract_address: Option<String>,
    pub network: Option<String>,
    pub symbol: String,
    pub name: String,
    pub logo: String,
    pub price: f64,
    pub balance: f64,
    pub value: f64,
    pub mcap: f64,
    pub change_usd: f64,
    /// Wallets contributing to this row, sorted
    pub sources: Vec<String>,
}

/// Portfolio-level totals, recomputed on every aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub total_value: f64,
    pub total_sol_value: f64,
    pub total_evm_value: f64,
    pub total_change_sol_usd: f64,
    pub total_change_evm_usd: f64,
    /// Value of the holdings whose 24h change is counted
    pub total_value_for_change: f64,
    pub total_value_24h_ago: f64,
}

impl PortfolioTotals {
    pub fn total_change_usd(&self) -> f64 {
        self.total_change_sol_usd + self.total_change_evm_usd
    }

    /// Overall 24h change in percent, 0 when there is no baseline
    pub fn total_change_pct(&self) -> f64 {
        if self.total_value_24h_ago <= 0.0 {
            0.0
        } else {
            self.total_change_usd() / self.total_value_24h_ago * 100.0
        }
    }
}
