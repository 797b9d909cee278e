//! Normalization of Solana net-worth payloads

use serde_json::Value;
use tracing::debug;

use crate::core::{Chain, GatewayError, HoldingRecord};
use crate::util::extract::*;

const TIMESTAMP_PATHS: &[FieldPath] = &[&["timestamp"], &["unixTime"], &["time"]];

/// Items of a net-worth payload, either `{ items: [...] }` or a bare array
pub fn normalize_items(data: &Value) -> Result<Vec<HoldingRecord>, GatewayError> {
    let items = match data {
        Value::Array(items) => items,
        _ => data
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::Parse("net worth payload has no items".to_string()))?,
    };

    let holdings: Vec<HoldingRecord> = items.iter().filter_map(normalize_item).collect();
    if holdings.len() < items.len() {
        debug!("Dropped {} net worth items without an address", items.len() - holdings.len());
    }
    Ok(holdings)
}

fn normalize_item(item: &Value) -> Option<HoldingRecord> {
    let address = first_string(item, ITEM_ADDRESS_PATHS)?;

    let balance = first_number(item, ITEM_BALANCE_PATHS).unwrap_or(0.0);
    let price = first_number(item, ITEM_PRICE_PATHS).unwrap_or(0.0);
    let value = first_number(item, ITEM_VALUE_PATHS).unwrap_or(price * balance);

    let mut holding = HoldingRecord::new(Chain::Solana, address);
    holding.symbol = first_string(item, ITEM_SYMBOL_PATHS).unwrap_or_default();
    holding.name = first_string(item, ITEM_NAME_PATHS).unwrap_or_default();
    holding.logo_url = first_string(item, ITEM_LOGO_PATHS).unwrap_or_default();
    holding.price_usd = price;
    holding.balance = balance;
    holding.value_usd = value;
    holding.market_cap_usd = first_number(item, MARKET_CAP_PATHS).unwrap_or(0.0);
    holding.network = Some(first_string(item, ITEM_NETWORK_PATHS).unwrap_or_else(|| "solana".to_string()));
    Some(holding)
}

/// Wallet day change: a direct field when present, else the last step of the series
pub fn day_change_from_history(data: &Value) -> Option<f64> {
    if let Some(change) = first_number(data, NET_WORTH_CHANGE_PATHS) {
        return Some(change);
    }

    let series = match data {
        Value::Array(points) => points,
        _ => first_array(data, NET_WORTH_SERIES_PATHS)?,
    };

    let mut points: Vec<(Option<f64>, f64)> = series
        .iter()
        .filter_map(|point| {
            let value = first_number(point, NET_WORTH_POINT_PATHS)?;
            Some((first_number(point, TIMESTAMP_PATHS), value))
        })
        .collect();

    if points.len() < 2 {
        return None;
    }
    if points.iter().all(|(timestamp, _)| timestamp.is_some()) {
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    }

    let latest = points[points.len() - 1].1;
    let previous = points[points.len() - 2].1;
    Some(latest - previous)
}
