//! Candidate-path extraction from loosely typed upstream JSON.
//!
//! The upstream schema has drifted across endpoint versions, so each value is
//! looked up through an ordered table of paths; the first usable hit wins.
//! Adding a schema variant means adding a row, not another branch.

use serde_json::Value;

/// Path of object keys from the payload root
pub type FieldPath = &'static [&'static str];

/// 24h percent change on the price endpoint
pub const PRICE_CHANGE_PATHS: &[FieldPath] = &[
    &["priceChange24h"],
    &["priceChange24hPercent"],
    &["price_change_24h"],
    &["price_change_24h_percent"],
    &["priceChangePercent24h"],
    &["price_change_percent_24h"],
    &["change24h"],
    &["change_24h"],
    &["percentChange24h"],
    &["percent_change_24h"],
    &["priceChange", "h24"],
    &["price_change", "24h"],
];

/// 24h percent change on the token overview, including nested frames
pub const OVERVIEW_CHANGE_PATHS: &[FieldPath] = &[
    &["priceChange24hPercent"],
    &["price_change_24h_percent"],
    &["priceChange24h"],
    &["price_change_24h"],
    &["24h", "priceChangePercent"],
    &["24h", "price_change_percent"],
    &["h24", "priceChangePercent"],
    &["frames", "24h", "priceChangePercent"],
    &["frames", "24h", "price_change_percent"],
    &["frame", "24h", "priceChangePercent"],
];

/// Direct change field on the historical price payload
pub const HISTORICAL_CHANGE_PATHS: &[FieldPath] = &[
    &["priceChange24h"],
    &["priceChange24hPercent"],
    &["price_change_24h"],
    &["change24h"],
];

pub const PRICE_PATHS: &[FieldPath] = &[
    &["value"],
    &["price"],
    &["priceUsd"],
    &["price_usd"],
    &["usdPrice"],
    &["price", "value"],
];

pub const LIQUIDITY_PATHS: &[FieldPath] = &[
    &["liquidity"],
    &["liquidityUsd"],
    &["liquidity_usd"],
    &["liquidity", "usd"],
];

pub const VOLUME_24H_PATHS: &[FieldPath] = &[
    &["v24hUSD"],
    &["volume24hUSD"],
    &["v24h_usd"],
    &["volume_24h_usd"],
    &["volume24hUsd"],
    &["volume", "h24"],
    &["24h", "volumeUsd"],
    &["frames", "24h", "volumeUsd"],
];

pub const MARKET_CAP_PATHS: &[FieldPath] = &[
    &["marketCap"],
    &["market_cap"],
    &["marketcap"],
    &["mc"],
    &["market_data", "market_cap"],
    &["fdv"],
];

/// Net-worth history: direct day change, then the series itself
pub const NET_WORTH_CHANGE_PATHS: &[FieldPath] = &[
    &["net_worth_change"],
    &["netWorthChange"],
    &["change", "usd"],
    &["dayChangeUsd"],
];

pub const NET_WORTH_SERIES_PATHS: &[FieldPath] = &[&["history"], &["items"], &["points"]];

pub const NET_WORTH_POINT_PATHS: &[FieldPath] =
    &[&["net_worth"], &["netWorth"], &["total_value"], &["value"]];

// Solana net-worth items, already close to the holding shape
pub const ITEM_ADDRESS_PATHS: &[FieldPath] =
    &[&["tokenAddress"], &["address"], &["mint"], &["token_address"]];
pub const ITEM_SYMBOL_PATHS: &[FieldPath] = &[&["symbol"]];
pub const ITEM_NAME_PATHS: &[FieldPath] = &[&["name"]];
pub const ITEM_LOGO_PATHS: &[FieldPath] =
    &[&["logoUrl"], &["logoURI"], &["logo_uri"], &["logo"], &["icon"]];
pub const ITEM_PRICE_PATHS: &[FieldPath] = &[&["priceUsd"], &["price_usd"], &["price"]];
pub const ITEM_VALUE_PATHS: &[FieldPath] = &[&["valueUsd"], &["value_usd"], &["value"]];
pub const ITEM_BALANCE_PATHS: &[FieldPath] =
    &[&["uiAmount"], &["ui_amount"], &["balance"], &["amount"]];
pub const ITEM_NETWORK_PATHS: &[FieldPath] = &[&["network"], &["chain"]];

pub fn lookup<'a>(value: &'a Value, path: FieldPath) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Finite number from a JSON number or numeric string
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

pub fn first_number(value: &Value, paths: &[FieldPath]) -> Option<f64> {
    paths
        .iter()
        .find_map(|path| lookup(value, *path).and_then(as_number))
}

pub fn first_string(value: &Value, paths: &[FieldPath]) -> Option<String> {
    paths.iter().find_map(|path| {
        lookup(value, *path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

pub fn first_array<'a>(value: &'a Value, paths: &[FieldPath]) -> Option<&'a Vec<Value>> {
    paths
        .iter()
        .find_map(|path| lookup(value, *path).and_then(Value::as_array))
}
