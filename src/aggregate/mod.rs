//! Cross-wallet holdings aggregation and portfolio totals
//!
//! Every pass rebuilds the whole holdings map from the settled wallet scans,
//! so the output depends only on the set of scans and not on arrival order.

pub mod view;

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::core::{AggregatedHolding, Chain, HoldingRecord, PortfolioTotals, WalletScan};

pub use view::{AllocationSlice, PortfolioView, WalletSummary};

/// Deduplicated holdings, sorted by value descending, plus totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub holdings: Vec<AggregatedHolding>,
    pub totals: PortfolioTotals,
}

/// Change contribution of one wallet, before it is added to the totals
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalletChange {
    pub change_usd: f64,
    pub value_for_change: f64,
    pub value_24h_ago: f64,
    /// Whether this wallet's change is counted at all
    pub counted: bool,
}

/// 24h change a wallet contributes to the totals.
///
/// EVM holdings always count. Solana holdings count only when eligible, and
/// only if the wallet has at least one eligible holding with positive value.
pub fn wallet_change(scan: &WalletScan) -> WalletChange {
    let mut change = WalletChange::default();
    for holding in &scan.holdings {
        let value = finite(holding.value_usd);
        let delta = finite(holding.change_usd);
        let counts = match holding.chain {
            Chain::Evm => true,
            Chain::Solana => holding.change_eligible,
        };
        if !counts {
            continue;
        }
        change.change_usd += delta;
        change.value_for_change += value;
        change.value_24h_ago += (value - delta).max(0.0);
        if holding.chain == Chain::Evm || value > 0.0 {
            change.counted = true;
        }
    }
    if !change.counted {
        return WalletChange::default();
    }
    change
}

pub fn aggregate<'a, I>(scans: I) -> Aggregation
where
    I: IntoIterator<Item = &'a WalletScan>,
{
    let mut rows: HashMap<String, AggregatedHolding> = HashMap::new();
    let mut totals = PortfolioTotals::default();

    for scan in scans {
        let mut wallet_value = 0.0;
        for holding in &scan.holdings {
            let value = finite(holding.value_usd);
            totals.total_value += value;
            wallet_value += value;
            merge(&mut rows, holding, &scan.wallet);
        }

        // Chain totals come from raw per-wallet subtotals, not the deduplicated rows
        match scan.chain {
            Chain::Solana => totals.total_sol_value += wallet_value,
            Chain::Evm => totals.total_evm_value += wallet_value,
        }

        let change = wallet_change(scan);
        if change.counted {
            match scan.chain {
                Chain::Solana => totals.total_change_sol_usd += change.change_usd,
                Chain::Evm => totals.total_change_evm_usd += change.change_usd,
            }
            totals.total_value_for_change += change.value_for_change;
            totals.total_value_24h_ago += change.value_24h_ago;
        }
    }

    let mut holdings: Vec<AggregatedHolding> = rows
        .into_values()
        .map(|mut row| {
            row.sources.sort();
            row
        })
        .collect();
    holdings.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));

    Aggregation { holdings, totals }
}

fn merge(rows: &mut HashMap<String, AggregatedHolding>, holding: &HoldingRecord, wallet: &str) {
    match rows.entry(holding.dedup_key()) {
        Entry::Occupied(mut entry) => {
            let row = entry.get_mut();
            row.balance += finite(holding.balance);
            row.value += finite(holding.value_usd);
            row.change_usd += finite(holding.change_usd);
            row.mcap = row.mcap.max(finite(holding.market_cap_usd));
            if row.price <= 0.0 {
                row.price = finite(holding.price_usd);
            }
            fill(&mut row.symbol, &holding.symbol);
            fill(&mut row.name, &holding.name);
            fill(&mut row.logo, &holding.logo_url);
            if row.network.is_none() {
                row.network = holding.network.clone();
            }
            if row.contract_address.is_none() {
                row.contract_address = holding.contract_address.clone();
            }
            if !row.sources.iter().any(|source| source == wallet) {
                row.sources.push(wallet.to_string());
            }
        }
        Entry::Vacant(entry) => {
            let key = entry.key().clone();
            entry.insert(AggregatedHolding {
                key,
                chain: holding.chain,
                address: holding.resolved_address().to_string(),
                contract_address: holding.contract_address.clone(),
                network: holding.network.clone(),
                symbol: holding.symbol.clone(),
                name: holding.name.clone(),
                logo: holding.logo_url.clone(),
                price: finite(holding.price_usd),
                balance: finite(holding.balance),
                value: finite(holding.value_usd),
                mcap: finite(holding.market_cap_usd),
                change_usd: finite(holding.change_usd),
                sources: vec![wallet.to_string()],
            });
        }
    }
}

fn fill(target: &mut String, candidate: &str) {
    if target.is_empty() && !candidate.is_empty() {
        *target = candidate.to_string();
    }
}

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::change::holding_delta_usd;
    use chrono::Utc;

    pub(crate) fn holding(chain: Chain, address: &str, value: f64, change: f64, eligible: bool) -> HoldingRecord {
        let mut holding = HoldingRecord::new(chain, address);
        holding.symbol = address.to_uppercase();
        holding.value_usd = value;
        holding.balance = value;
        holding.change_usd = change;
        holding.change_eligible = eligible;
        holding
    }

    pub(crate) fn scan(wallet: &str, chain: Chain, holdings: Vec<HoldingRecord>) -> WalletScan {
        WalletScan {
            wallet: wallet.to_string(),
            chain,
            holdings,
            day_change_usd: None,
            fetched_at: Utc::now(),
        }
    }

    fn scenario() -> Vec<WalletScan> {
        let sol = holding(Chain::Solana, "sol", 500.0, holding_delta_usd(500.0, 2.0), true);
        let usdc = holding(Chain::Evm, "0xusdc", 300.0, 0.0, true);
        vec![
            scan("solwallet", Chain::Solana, vec![sol]),
            scan("0xevmwallet", Chain::Evm, vec![usdc]),
        ]
    }

    #[test]
    fn test_two_wallet_scenario_totals() {
        let result = aggregate(&scenario());
        let totals = &result.totals;

        assert_eq!(totals.total_value, 800.0);
        assert_eq!(totals.total_sol_value, 500.0);
        assert_eq!(totals.total_evm_value, 300.0);
        assert!((totals.total_value_24h_ago - (500.0 / 1.02 + 300.0)).abs() < 1e-9);
        assert!((totals.total_value_24h_ago - 790.196).abs() < 1e-3);
        assert_eq!(totals.total_value_for_change, 800.0);
        assert_eq!(result.holdings[0].key, "solana:sol");
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let scans = scenario();
        assert_eq!(aggregate(&scans), aggregate(&scans));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let scans = vec![
            scan("a", Chain::Solana, vec![
                holding(Chain::Solana, "mint1", 0.1, 0.01, true),
                holding(Chain::Solana, "mint2", 1234.567, -12.5, true),
            ]),
            scan("b", Chain::Solana, vec![holding(Chain::Solana, "mint1", 0.2, 0.02, true)]),
            scan("0xc", Chain::Evm, vec![holding(Chain::Evm, "0xtoken", 0.3, 0.003, true)]),
        ];
        let forward = aggregate(&scans);
        let reversed: Vec<WalletScan> = scans.iter().rev().cloned().collect();
        let backward = aggregate(&reversed);

        let (f, b) = (&forward.totals, &backward.totals);
        assert!((f.total_value - b.total_value).abs() < 1e-6);
        assert!((f.total_value_24h_ago - b.total_value_24h_ago).abs() < 1e-6);
        assert!((f.total_change_usd() - b.total_change_usd()).abs() < 1e-6);

        let keys = |a: &Aggregation| a.holdings.iter().map(|h| h.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&forward), keys(&backward));
        let shared = forward.holdings.iter().find(|h| h.key == "solana:mint1").unwrap();
        assert_eq!(shared.sources, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_shared_token_is_one_row_but_counts_per_wallet() {
        let scans = vec![
            scan("a", Chain::Solana, vec![holding(Chain::Solana, "mint", 100.0, 0.0, false)]),
            scan("b", Chain::Solana, vec![holding(Chain::Solana, "mint", 50.0, 0.0, false)]),
        ];
        let result = aggregate(&scans);

        assert_eq!(result.holdings.len(), 1);
        assert_eq!(result.holdings[0].value, 150.0);
        assert_eq!(result.holdings[0].balance, 150.0);
        assert_eq!(result.totals.total_sol_value, 150.0);
        assert!((result.totals.total_value - (result.totals.total_sol_value + result.totals.total_evm_value)).abs() < 1e-9);
    }

    #[test]
    fn test_evm_contract_dedup_ignores_case() {
        let mut upper = holding(Chain::Evm, "0xABCDEF", 10.0, 1.0, true);
        upper.contract_address = Some("0xABCDEF".to_string());
        upper.market_cap_usd = 5.0;
        let mut lower = holding(Chain::Evm, "0xabcdef", 20.0, 2.0, true);
        lower.contract_address = Some("0xabcdef".to_string());
        lower.market_cap_usd = 9.0;

        let result = aggregate(&[
            scan("0x1", Chain::Evm, vec![upper]),
            scan("0x2", Chain::Evm, vec![lower]),
        ]);
        assert_eq!(result.holdings.len(), 1);
        assert_eq!(result.holdings[0].key, "evm:0xabcdef");
        assert_eq!(result.holdings[0].mcap, 9.0);
        assert_eq!(result.holdings[0].change_usd, 3.0);
    }

    #[test]
    fn test_ineligible_only_solana_wallet_adds_no_change() {
        let scans = vec![scan("a", Chain::Solana, vec![
            holding(Chain::Solana, "spam", 100.0, 40.0, false),
            holding(Chain::Solana, "dust", 0.0, 0.0, true),
        ])];
        let totals = aggregate(&scans).totals;

        assert_eq!(totals.total_value, 100.0);
        assert_eq!(totals.total_change_sol_usd, 0.0);
        assert_eq!(totals.total_value_for_change, 0.0);
        assert_eq!(totals.total_value_24h_ago, 0.0);
        assert_eq!(totals.total_change_pct(), 0.0);
    }

    #[test]
    fn test_baseline_never_negative() {
        let scans = vec![scan("0x1", Chain::Evm, vec![holding(Chain::Evm, "0xt", 10.0, 50.0, true)])];
        let totals = aggregate(&scans).totals;
        assert_eq!(totals.total_value_24h_ago, 0.0);
        assert_eq!(totals.total_change_evm_usd, 50.0);
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let scans = vec![scan("a", Chain::Solana, vec![holding(Chain::Solana, "nan", f64::NAN, f64::NAN, true)])];
        let result = aggregate(&scans);
        assert_eq!(result.totals.total_value, 0.0);
        assert_eq!(result.holdings[0].value, 0.0);
    }
}
