//! Normalization of EVM positions from the positions proxy

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::change::holding_delta_usd;
use crate::core::{Chain, GatewayError, HoldingRecord};

#[derive(Debug, Deserialize)]
struct PositionsBody {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Position {
    attributes: Attributes,
    relationships: Relationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Attributes {
    quantity: Option<Quantity>,
    fungible_info: Option<FungibleInfo>,
    changes: Option<Changes>,
    value: Option<f64>,
    price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quantity {
    float: Option<f64>,
    numeric: Option<String>,
}

impl Quantity {
    fn amount(&self) -> Option<f64> {
        self.float
            .or_else(|| self.numeric.as_deref().and_then(|n| n.parse::<f64>().ok()))
            .filter(|n| n.is_finite())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FungibleInfo {
    name: Option<String>,
    symbol: Option<String>,
    icon: Option<Icon>,
    implementations: Vec<Implementation>,
    market_data: Option<MarketData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Icon {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Implementation {
    chain_id: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarketData {
    market_cap: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Changes {
    absolute_1d: Option<f64>,
    percent_1d: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Relationships {
    chain: Option<Related>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Related {
    data: Option<RelatedData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RelatedData {
    id: Option<String>,
}

/// Map every position of a positions body into a holding.
/// Positions that do not match the expected shape are skipped.
pub fn normalize_positions(body: &Value) -> Result<Vec<HoldingRecord>, GatewayError> {
    let parsed: PositionsBody = serde_json::from_value(body.clone())?;
    let items = parsed.data.unwrap_or_default();

    let mut holdings = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Position>(item) {
            Ok(position) => {
                if let Some(holding) = normalize_position(position) {
                    holdings.push(holding);
                }
            }
            Err(e) => debug!("Skipping malformed position: {}", e),
        }
    }
    Ok(holdings)
}

fn normalize_position(position: Position) -> Option<HoldingRecord> {
    let attributes = position.attributes;
    let info = attributes.fungible_info?;

    let chain_id = position
        .relationships
        .chain
        .and_then(|chain| chain.data)
        .and_then(|data| data.id)
        .unwrap_or_else(|| "unknown".to_string());
    let symbol = info.symbol.clone().unwrap_or_default();

    // Contract on this position's own chain; natives have none
    let contract = info
        .implementations
        .iter()
        .filter(|implementation| implementation.chain_id.as_deref() == Some(chain_id.as_str()))
        .find_map(|implementation| implementation.address.as_deref())
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_lowercase);

    let token_address = contract
        .clone()
        .unwrap_or_else(|| format!("native:{}:{}", chain_id, symbol));

    let balance = attributes
        .quantity
        .as_ref()
        .and_then(Quantity::amount)
        .unwrap_or(0.0);
    let value = finite(attributes.value);
    let price = match finite(attributes.price) {
        p if p > 0.0 => p,
        _ if balance > 0.0 => value / balance,
        _ => 0.0,
    };

    let changes = attributes.changes.unwrap_or_default();
    let change_pct = finite(changes.percent_1d);
    let change_usd = match changes.absolute_1d.filter(|c| c.is_finite()) {
        Some(absolute) => absolute,
        None => holding_delta_usd(value, change_pct),
    };

    let mut holding = HoldingRecord::new(Chain::Evm, token_address);
    holding.contract_address = contract;
    holding.symbol = symbol;
    holding.name = info.name.unwrap_or_default();
    holding.logo_url = info.icon.and_then(|icon| icon.url).unwrap_or_default();
    holding.price_usd = price;
    holding.balance = balance;
    holding.value_usd = value;
    holding.market_cap_usd = finite(info.market_data.and_then(|m| m.market_cap));
    holding.change_usd = change_usd;
    holding.change_pct = change_pct;
    holding.network = Some(chain_id);
    holding.change_eligible = true;
    Some(holding)
}

fn finite(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usdc_position() -> Value {
        json!({
            "attributes": {
                "quantity": { "float": 300.0, "numeric": "300.000000" },
                "value": 300.0,
                "price": 1.0,
                "changes": { "absolute_1d": 0.0, "percent_1d": 0.0 },
                "fungible_info": {
                    "name": "USD Coin",
                    "symbol": "USDC",
                    "icon": { "url": "https://icons/usdc.png" },
                    "implementations": [
                        { "chain_id": "ethereum", "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48" },
                        { "chain_id": "base", "address": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913" }
                    ]
                }
            },
            "relationships": { "chain": { "data": { "type": "chains", "id": "base" } } }
        })
    }

    #[test]
    fn test_token_uses_contract_of_own_chain() {
        let holdings = normalize_positions(&json!({ "data": [usdc_position()] })).unwrap();
        assert_eq!(holdings.len(), 1);

        let usdc = &holdings[0];
        assert_eq!(usdc.token_address, "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913");
        assert_eq!(usdc.contract_address.as_deref(), Some(usdc.token_address.as_str()));
        assert_eq!(usdc.network.as_deref(), Some("base"));
        assert_eq!(usdc.value_usd, 300.0);
        assert_eq!(usdc.balance, 300.0);
        assert_eq!(usdc.logo_url, "https://icons/usdc.png");
        assert!(usdc.change_eligible);
    }

    #[test]
    fn test_native_gets_synthetic_key() {
        let eth = json!({
            "attributes": {
                "quantity": { "numeric": "2" },
                "value": 5000.0,
                "changes": { "percent_1d": 10.0 },
                "fungible_info": {
                    "name": "Ethereum",
                    "symbol": "ETH",
                    "implementations": [{ "chain_id": "ethereum", "address": null }]
                }
            },
            "relationships": { "chain": { "data": { "id": "ethereum" } } }
        });
        let holdings = normalize_positions(&json!({ "data": [eth] })).unwrap();
        let eth = &holdings[0];

        assert_eq!(eth.token_address, "native:ethereum:ETH");
        assert_eq!(eth.contract_address, None);
        assert_eq!(eth.price_usd, 2500.0);
        // Derived from the percent when no absolute change is given
        assert!((eth.change_usd - 5000.0 * 0.1 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_positions_are_skipped() {
        let body = json!({ "data": [
            { "attributes": "nope" },
            { "attributes": { "value": 1.0 } },
            usdc_position()
        ] });
        let holdings = normalize_positions(&body).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "USDC");
    }

    #[test]
    fn test_non_object_body_is_parse_error() {
        assert!(matches!(
            normalize_positions(&json!("oops")),
            Err(GatewayError::Parse(_))
        ));
    }
}
