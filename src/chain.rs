//! Per-currency parameters shared by the wallet math modules.
//!
//! Everything chain-specific that the converters, codecs, and managers need
//! lives here, so adding a currency is one constant plus a factory arm.

use serde::{Deserialize, Serialize};

/// CryptoNote network selector. The numeric index matches the daemon's
/// convention (0 = mainnet, 1 = testnet, 2 = stagenet) and participates in
/// address derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Mainnet,
    Testnet,
    Stagenet,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Stagenet => "stagenet",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(NetworkType::Mainnet),
            "testnet" | "test" => Some(NetworkType::Testnet),
            "stagenet" | "stage" => Some(NetworkType::Stagenet),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            NetworkType::Mainnet => 0,
            NetworkType::Testnet => 1,
            NetworkType::Stagenet => 2,
        }
    }
}

/// Static description of one supported currency.
#[derive(Debug, Clone, Copy)]
pub struct ChainParams {
    pub name: &'static str,
    /// Ticker shown to users and sent to the device, e.g. "SAL".
    pub ticker: &'static str,
    /// Factory / device tag, e.g. "sal". Lowercase.
    pub tag: &'static str,
    /// Payment URI scheme, e.g. "salvium".
    pub uri_scheme: &'static str,
    /// Display decimals. One display unit = 10^decimals atomic units.
    pub decimals: u32,
    pub address_prefix: &'static str,
    /// Inclusive total-length band for any address of this chain.
    pub address_min: usize,
    pub address_max: usize,
    /// Classification thresholds (total length). Addresses below
    /// `subaddress_min` are standard, below `integrated_min` subaddresses,
    /// the rest integrated.
    pub subaddress_min: usize,
    pub integrated_min: usize,
    pub default_daemon_url: &'static str,
}

impl ChainParams {
    /// Body length of a freshly derived standard address (prefix excluded).
    pub fn standard_body_len(&self) -> usize {
        self.address_min - self.address_prefix.len()
    }
}

/// Salvium mainnet parameters (CARROT address format).
pub const SALVIUM: ChainParams = ChainParams {
    name: "Salvium",
    ticker: "SAL",
    tag: "sal",
    uri_scheme: "salvium",
    decimals: 12,
    address_prefix: "SC1",
    address_min: 95,
    address_max: 110,
    subaddress_min: 100,
    integrated_min: 106,
    // salviumd listens on 19081, not monerod's 18081
    default_daemon_url: "http://127.0.0.1:19081",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_round_trips_through_str() {
        for net in [
            NetworkType::Mainnet,
            NetworkType::Testnet,
            NetworkType::Stagenet,
        ] {
            assert_eq!(NetworkType::from_str(net.as_str()), Some(net));
        }
        assert_eq!(NetworkType::from_str("moonnet"), None);
    }

    #[test]
    fn salvium_length_bands_are_ordered() {
        assert!(SALVIUM.address_min < SALVIUM.subaddress_min);
        assert!(SALVIUM.subaddress_min < SALVIUM.integrated_min);
        assert!(SALVIUM.integrated_min <= SALVIUM.address_max);
        assert_eq!(SALVIUM.standard_body_len(), 92);
    }
}
