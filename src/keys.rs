//! Deterministic key and address derivation.
//!
//! These are digest-based placeholders pending a real CryptoNote
//! cryptography backend: one-way, pure, and byte-identical across calls —
//! the shape a real ed25519 implementation can slot into without touching
//! callers. They are NOT consensus-valid on any network.

use sha2::{Digest, Sha256, Sha512};

use crate::address::BASE58_ALPHABET;
use crate::chain::{ChainParams, NetworkType};
use crate::error::{WalletError, WalletResult};

/// Private keys are 32 bytes, hex-encoded: exactly 64 hex characters.
pub fn validate_private_key(key_hex: &str) -> WalletResult<()> {
    if key_hex.len() == 64 && key_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(WalletError::InvalidKeyFormat)
    }
}

/// Derive the private view key from the private spend key.
pub fn derive_view_key(spend_key_hex: &str) -> WalletResult<String> {
    validate_private_key(spend_key_hex)?;
    Ok(hex::encode(Sha256::digest(spend_key_hex.as_bytes())))
}

/// Derive the primary address from both private keys and the network type.
/// Output always satisfies the chain's [`AddressCodec`] and classifies as a
/// standard address.
///
/// [`AddressCodec`]: crate::address::AddressCodec
pub fn derive_address(
    spend_key_hex: &str,
    view_key_hex: &str,
    network: NetworkType,
    params: &ChainParams,
) -> WalletResult<String> {
    validate_private_key(spend_key_hex)?;
    validate_private_key(view_key_hex)?;

    let seed = format!("{spend_key_hex}{view_key_hex}{}", network.index());
    let body_len = params.standard_body_len();

    // Expand the digest until it covers the address body, then map each
    // byte into the chain's alphabet.
    let mut material = Vec::with_capacity(body_len);
    let mut block = Sha512::digest(seed.as_bytes());
    material.extend_from_slice(&block);
    while material.len() < body_len {
        let mut hasher = Sha512::new();
        hasher.update(block);
        hasher.update(seed.as_bytes());
        block = hasher.finalize();
        material.extend_from_slice(&block);
    }

    let body: String = material[..body_len]
        .iter()
        .map(|b| BASE58_ALPHABET[(*b as usize) % BASE58_ALPHABET.len()] as char)
        .collect();

    Ok(format!("{}{}", params.address_prefix, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressCodec, AddressKind};
    use crate::chain::SALVIUM;

    const SPEND_KEY: &str =
        "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn private_key_format_is_enforced() {
        assert!(validate_private_key(SPEND_KEY).is_ok());
        for bad in ["", "abc", &SPEND_KEY[..63], "zz", &format!("{SPEND_KEY}0")] {
            assert!(
                matches!(validate_private_key(bad), Err(WalletError::InvalidKeyFormat)),
                "expected InvalidKeyFormat for {bad:?}"
            );
        }
    }

    #[test]
    fn view_key_is_deterministic_and_well_formed() {
        let first = derive_view_key(SPEND_KEY).unwrap();
        let second = derive_view_key(SPEND_KEY).unwrap();
        assert_eq!(first, second);
        assert!(validate_private_key(&first).is_ok());
        assert_ne!(first, SPEND_KEY);
    }

    #[test]
    fn derived_address_is_deterministic_and_valid() {
        let view = derive_view_key(SPEND_KEY).unwrap();
        let a = derive_address(SPEND_KEY, &view, NetworkType::Mainnet, &SALVIUM).unwrap();
        let b = derive_address(SPEND_KEY, &view, NetworkType::Mainnet, &SALVIUM).unwrap();
        assert_eq!(a, b);

        let codec = AddressCodec::new(SALVIUM);
        assert!(codec.is_valid(&a));
        assert_eq!(codec.classify(&a), Some(AddressKind::Standard));
    }

    #[test]
    fn address_depends_on_every_input() {
        let view = derive_view_key(SPEND_KEY).unwrap();
        let mainnet =
            derive_address(SPEND_KEY, &view, NetworkType::Mainnet, &SALVIUM).unwrap();
        let testnet =
            derive_address(SPEND_KEY, &view, NetworkType::Testnet, &SALVIUM).unwrap();
        assert_ne!(mainnet, testnet);

        let other_spend =
            "0202020202020202020202020202020202020202020202020202020202020202";
        let other_view = derive_view_key(other_spend).unwrap();
        let other =
            derive_address(other_spend, &other_view, NetworkType::Mainnet, &SALVIUM)
                .unwrap();
        assert_ne!(mainnet, other);
    }
}
