use serde::Serialize;
use std::collections::BTreeMap;

use super::{aggregate, wallet_change};
use crate::core::{AggregatedHolding, Chain, PortfolioTotals, WalletScan};

/// Per-wallet line of the portfolio view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletSummary {
    pub key: String,
    pub wallet: String,
    pub chain: Chain,
    pub value_usd: f64,
    pub holding_count: usize,
    /// Change counted toward the totals for this wallet
    pub change_usd: f64,
    /// Net-worth history day change, when the provider reported one
    pub day_change_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub label: String,
    pub value: f64,
    /// Share of the total value, in percent
    pub pct: f64,
}

/// Snapshot rendered to the user, rebuilt after every settled wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioView {
    pub holdings: Vec<AggregatedHolding>,
    pub totals: PortfolioTotals,
    pub wallets: Vec<WalletSummary>,
}

impl PortfolioView {
    pub fn build(scans: &BTreeMap<String, WalletScan>) -> Self {
        let aggregation = aggregate(scans.values());

        let wallets = scans
            .iter()
            .map(|(key, scan)| WalletSummary {
                key: key.clone(),
                wallet: scan.wallet.clone(),
                chain: scan.chain,
                value_usd: scan
                    .holdings
                    .iter()
                    .map(|h| h.value_usd)
                    .filter(|v| v.is_finite())
                    .sum(),
                holding_count: scan.holdings.len(),
                change_usd: wallet_change(scan).change_usd,
                day_change_usd: scan.day_change_usd,
            })
            .collect();

        Self {
            holdings: aggregation.holdings,
            totals: aggregation.totals,
            wallets,
        }
    }

    /// Holdings at or above the dust threshold unless dust is requested
    pub fn visible_holdings(&self, dust_threshold_usd: f64, include_dust: bool) -> Vec<&AggregatedHolding> {
        self.holdings
            .iter()
            .filter(|h| include_dust || h.value >= dust_threshold_usd)
            .collect()
    }

    pub fn dust_count(&self, dust_threshold_usd: f64) -> usize {
        self.holdings
            .iter()
            .filter(|h| h.value < dust_threshold_usd)
            .count()
    }

    pub fn allocation_by_chain(&self) -> Vec<AllocationSlice> {
        let slices = vec![
            (Chain::Solana.to_string(), self.totals.total_sol_value),
            (Chain::Evm.to_string(), self.totals.total_evm_value),
        ];
        self.slices(slices)
    }

    pub fn allocation_by_wallet(&self) -> Vec<AllocationSlice> {
        let slices = self
            .wallets
            .iter()
            .map(|w| (w.key.clone(), w.value_usd))
            .collect();
        self.slices(slices)
    }

    /// Largest `top` holdings, with the remainder folded into "other"
    pub fn allocation_by_token(&self, top: usize) -> Vec<AllocationSlice> {
        let mut slices: Vec<(String, f64)> = self
            .holdings
            .iter()
            .take(top)
            .map(|h| {
                let label = if h.symbol.is_empty() { h.key.clone() } else { h.symbol.clone() };
                (label, h.value)
            })
            .collect();
        let rest: f64 = self.holdings.iter().skip(top).map(|h| h.value).sum();
        if rest > 0.0 {
            slices.push(("other".to_string(), rest));
        }
        self.slices(slices)
    }

    fn slices(&self, mut slices: Vec<(String, f64)>) -> Vec<AllocationSlice> {
        slices.retain(|(_, value)| *value > 0.0);
        slices.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let total = self.totals.total_value;
        slices
            .into_iter()
            .map(|(label, value)| AllocationSlice {
                pct: if total > 0.0 { value / total * 100.0 } else { 0.0 },
                label,
                value,
            })
            .collect()
    }
}
