//! Shared wallet data model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::chain::NetworkType;
use crate::error::WalletResult;

/// Active wallet session. Owned by exactly one manager; replaced wholesale
/// on re-initialize or key rotation. Key material is zeroized on drop and
/// redacted from debug output.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletSession {
    #[zeroize(skip)]
    pub primary_address: String,
    pub private_spend_key: String,
    pub private_view_key: String,
    #[zeroize(skip)]
    pub network: NetworkType,
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("primary_address", &self.primary_address)
            .field("private_spend_key", &"<redacted>")
            .field("private_view_key", &"<redacted>")
            .field("network", &self.network)
            .finish()
    }
}

/// Wallet balance snapshot. Recomputed on every query; a failed query
/// produces a fallback value (`authoritative == false`), never a silently
/// reused stale one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub total_atomic: u128,
    pub unlocked_atomic: u128,
    /// Chain height at query time, when the daemon answered.
    pub sync_height: Option<u64>,
    /// True only when the wallet RPC supplied the amounts.
    pub authoritative: bool,
}

impl Balance {
    pub fn fallback(sync_height: Option<u64>) -> Self {
        Self {
            sync_height,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Received,
    Sent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    Pending,
    Confirmed,
}

/// One history entry, merged from the wallet RPC's in/out/pending/pool
/// result sets. Amounts are unsigned; `direction` carries the sign.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    pub txid: String,
    pub height: Option<u64>,
    pub amount_atomic: u128,
    pub fee_atomic: u128,
    pub timestamp: u64,
    pub direction: Direction,
    pub confirmations: u64,
    pub unlock_time: u64,
    pub payment_id: Option<String>,
    pub counterparty: Option<String>,
    pub status: TransferStatus,
}

/// Outgoing payment request in display units.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub address: String,
    pub amount: String,
}

/// Result of a broadcast `transfer`. Optional fields are surfaced as the
/// wallet returned them; their absence is uncertainty, not failure.
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub tx_hash: String,
    pub fee_atomic: u128,
    pub tx_key: Option<String>,
    pub tx_hex: Option<String>,
    pub tx_metadata: Option<String>,
}

/// Daemon-derived chain snapshot; `online == false` when the daemon is
/// unreachable (offline mode, not an error).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainStatus {
    pub online: bool,
    pub height: u64,
    pub target_height: u64,
    pub network: Option<NetworkType>,
    pub synced: bool,
    pub connections: u64,
    pub tx_pool_size: u64,
}

impl ChainStatus {
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Completed hardware key import.
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub primary_address: String,
    pub rotation_index: u32,
}

/// Source of scanned key payloads during a hardware key import.
///
/// `capture` is polled with a fixed backoff: `Ok(Some(_))` delivers a
/// payload, `Ok(None)` means nothing scanned yet, and `Err` means the
/// source is gone (scan aborts promptly instead of polling on).
#[async_trait]
pub trait KeyScanner: Send + Sync {
    async fn capture(&self) -> WalletResult<Option<String>>;
}

/// Wallet endpoint configuration. The password lives only in memory; it is
/// never written to the blob store.
#[derive(Debug, Clone)]
pub struct WalletRpcConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl WalletRpcConfig {
    pub fn auth(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }
}

/// Manager configuration. Higher layers construct this.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: NetworkType,
    pub daemon_url: String,
    pub wallet_rpc: Option<WalletRpcConfig>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::Mainnet,
            daemon_url: crate::chain::SALVIUM.default_daemon_url.to_string(),
            wallet_rpc: None,
        }
    }
}

impl WalletConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: NetworkType) -> Self {
        self.network = network;
        self
    }

    pub fn with_daemon(mut self, url: impl Into<String>) -> Self {
        self.daemon_url = url.into();
        self
    }

    pub fn with_wallet_rpc(
        mut self,
        url: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        self.wallet_rpc = Some(WalletRpcConfig {
            url: url.into(),
            username,
            password,
        });
        self
    }
}
