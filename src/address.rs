//! Address validation, classification, and payment URIs.
//!
//! This is a best-effort syntactic filter: prefix, length band, and Base58
//! alphabet only. No checksum verification is performed — that requires
//! Base58 decoding plus CryptoNote address-structure parsing — so a "valid"
//! result is not proof of spendability.

use regex::Regex;
use url::Url;

use crate::chain::ChainParams;
use crate::error::{WalletError, WalletResult};

/// Base58 alphabet (no `0`, `O`, `I`, `l`). Shared with address derivation.
pub const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Standard,
    Subaddress,
    /// Embeds a payment id; used for return-payment matching.
    Integrated,
}

pub struct AddressCodec {
    params: ChainParams,
    body: Regex,
}

impl AddressCodec {
    pub fn new(params: ChainParams) -> Self {
        let alphabet = std::str::from_utf8(BASE58_ALPHABET).unwrap();
        let body = Regex::new(&format!("^[{alphabet}]+$")).unwrap();
        Self { params, body }
    }

    pub fn is_valid(&self, address: &str) -> bool {
        if address.is_empty() || !address.starts_with(self.params.address_prefix) {
            return false;
        }
        if address.len() < self.params.address_min
            || address.len() > self.params.address_max
        {
            return false;
        }
        let body = &address[self.params.address_prefix.len()..];
        self.body.is_match(body)
    }

    /// Classify by length thresholds only (no structural decode).
    /// Returns `None` for addresses that fail [`is_valid`](Self::is_valid).
    pub fn classify(&self, address: &str) -> Option<AddressKind> {
        if !self.is_valid(address) {
            return None;
        }
        Some(if address.len() >= self.params.integrated_min {
            AddressKind::Integrated
        } else if address.len() >= self.params.subaddress_min {
            AddressKind::Subaddress
        } else {
            AddressKind::Standard
        })
    }

    /// Parse a payment URI, e.g.
    /// `salvium:SC1...?amount=1.5&message=lunch&tx_payment_id=abcd`.
    /// Unknown query parameters are ignored.
    pub fn parse_uri(&self, uri: &str) -> WalletResult<PaymentRequest> {
        let url = Url::parse(uri)
            .map_err(|e| WalletError::InvalidInput(format!("bad URI: {e}")))?;
        if url.scheme() != self.params.uri_scheme {
            return Err(WalletError::InvalidInput(format!(
                "expected {}: URI, got {}:",
                self.params.uri_scheme,
                url.scheme()
            )));
        }

        let address = {
            let path = url.path().trim_start_matches('/');
            if path.is_empty() {
                url.host_str().unwrap_or_default().to_string()
            } else {
                path.to_string()
            }
        };
        if address.is_empty() {
            return Err(WalletError::InvalidInput("URI carries no address".into()));
        }

        let mut request = PaymentRequest {
            address,
            ..PaymentRequest::default()
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "amount" => request.amount = Some(value.into_owned()),
                "message" => request.message = Some(value.into_owned()),
                "tx_payment_id" => request.payment_id = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(request)
    }

    /// Produce a payment URI from its parts. The inverse of
    /// [`parse_uri`](Self::parse_uri).
    pub fn build_uri(&self, request: &PaymentRequest) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(amount) = &request.amount {
            query.append_pair("amount", amount);
        }
        if let Some(message) = &request.message {
            query.append_pair("message", message);
        }
        if let Some(payment_id) = &request.payment_id {
            query.append_pair("tx_payment_id", payment_id);
        }
        let query = query.finish();

        if query.is_empty() {
            format!("{}:{}", self.params.uri_scheme, request.address)
        } else {
            format!("{}:{}?{}", self.params.uri_scheme, request.address, query)
        }
    }
}

/// Parsed form of a payment URI. `amount` stays in display units; callers
/// convert with [`UnitConverter`](crate::units::UnitConverter) when needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentRequest {
    pub address: String,
    pub amount: Option<String>,
    pub message: Option<String>,
    pub payment_id: Option<String>,
}
