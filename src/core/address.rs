//! Address classification for user supplied wallet strings.
//!
//! Pure functions: no lookups, no I/O. A `.sol` domain is recognised but never
//! resolved, so it cannot enter a scan.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::types::{Chain, WalletIdentifier};

const SOLANA_MIN_LEN: usize = 32;
const SOLANA_MAX_LEN: usize = 44;
const EVM_HEX_LEN: usize = 40;

/// Outcome of classifying one input string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressKind {
    Solana,
    Evm,
    SolanaDomain,
    Unknown,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: AddressKind,
    pub value: String,
}

impl Classification {
    fn new(kind: AddressKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Chain to scan, if the address is directly usable
    pub fn chain(&self) -> Option<Chain> {
        match self.kind {
            AddressKind::Solana => Some(Chain::Solana),
            AddressKind::Evm => Some(Chain::Evm),
            _ => None,
        }
    }
}

/// Classify a raw input string
pub fn classify(raw: &str) -> Classification {
    let input = raw.trim();
    if input.is_empty() {
        return Classification::new(AddressKind::Empty, "");
    }

    if is_evm_address(input) {
        return Classification::new(AddressKind::Evm, input.to_lowercase());
    }

    if is_solana_address(input) {
        return Classification::new(AddressKind::Solana, input);
    }

    if input.to_lowercase().ends_with(".sol") {
        return Classification::new(AddressKind::SolanaDomain, input);
    }

    // Prefixed forms such as "solana:<addr>" or a pasted explorer URL
    if let Some(embedded) = find_embedded_solana(input) {
        return Classification::new(AddressKind::Solana, embedded);
    }

    Classification::new(AddressKind::Unknown, input)
}

/// `0x` followed by exactly 40 hex digits, any case
pub fn is_evm_address(input: &str) -> bool {
    let hex = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(rest) => rest,
        None => return false,
    };
    hex.len() == EVM_HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Base58 string of plausible length that is not one repeated character
pub fn is_solana_address(input: &str) -> bool {
    let len = input.len();
    if !(SOLANA_MIN_LEN..=SOLANA_MAX_LEN).contains(&len) {
        return false;
    }
    if bs58::decode(input).into_vec().is_err() {
        return false;
    }
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => chars.any(|c| c != first),
        None => false,
    }
}

fn find_embedded_solana(input: &str) -> Option<String> {
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|candidate| is_solana_address(candidate))
        .map(str::to_string)
}

impl WalletIdentifier {
    /// Classify `raw` and keep it only if it is a scannable address
    pub fn parse(raw: &str) -> Option<Self> {
        let classification = classify(raw);
        let chain = classification.chain()?;
        Some(Self {
            raw: raw.to_string(),
            chain,
            normalized: classification.value,
        })
    }
}

/// Result of parsing a free-form list of addresses
#[derive(Debug, Clone, Default)]
pub struct ParsedAddressList {
    pub wallets: Vec<WalletIdentifier>,
    pub rejected: Vec<(String, AddressKind)>,
}

/// Split free-form text into wallets, dropping duplicates and keeping first-seen order
pub fn parse_address_list(text: &str) -> ParsedAddressList {
    let mut parsed = ParsedAddressList::default();
    let mut seen = HashSet::new();

    for entry in text
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|entry| !entry.is_empty())
    {
        match WalletIdentifier::parse(entry) {
            Some(wallet) => {
                if seen.insert((wallet.chain, wallet.normalized.clone())) {
                    parsed.wallets.push(wallet);
                }
            }
            None => {
                let kind = classify(entry).kind;
                parsed.rejected.push((entry.to_string(), kind));
            }
        }
    }

    parsed
}
