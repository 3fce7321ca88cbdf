//! The polymorphic wallet contract and its factory.

use std::sync::Arc;

use async_trait::async_trait;

use crate::chain::ChainParams;
use crate::error::{WalletError, WalletResult};
use crate::rpc::FeeEstimate;
use crate::store::BlobStore;

use super::salvium::SalviumWallet;
use super::types::{
    Balance, ChainStatus, KeyScanner, Recipient, RotationOutcome, SendReceipt, Transfer,
    WalletConfig, WalletSession,
};

/// Shown to the user before a hardware key import. The payload crosses the
/// external channel in the clear, so this path is unsuitable for non-test
/// funds.
pub const KEY_IMPORT_NOTICE: &str =
    "The scanned payload exposes the UNPROTECTED private spend key. \
     Anyone observing the channel can steal funds. Test amounts only.";

/// Uniform per-chain wallet contract.
///
/// One implementation per blockchain family; instances live for the process
/// lifetime and move `Uninitialized -> Initialized` on the first successful
/// `initialize` (re-entrant afterwards). Callers serialize mutating
/// operations; read queries may run concurrently.
#[async_trait]
pub trait WalletManager: Send + Sync {
    fn params(&self) -> &ChainParams;

    /// Snapshot of the current session, if any.
    fn session(&self) -> Option<WalletSession>;

    /// Derive missing key material, derive the primary address, persist the
    /// session. Replaces any previous session. Idempotent for equal inputs.
    async fn initialize(
        &self,
        spend_key: &str,
        view_key: Option<&str>,
    ) -> WalletResult<WalletSession>;

    /// Restore the session from the persisted blob. Returns false when no
    /// blob exists.
    async fn load_session(&self) -> WalletResult<bool>;

    /// Authoritative balance from the wallet RPC, or a fallback balance
    /// annotated with the current chain height. Never fails.
    async fn balance(&self) -> Balance;

    /// Merged in/out/pending/pool transfers, newest first. Empty without a
    /// wallet endpoint. Never fails.
    async fn history(&self) -> Vec<Transfer>;

    /// Validate every recipient up front (all-or-nothing), then broadcast
    /// through the wallet RPC.
    async fn send(&self, recipients: &[Recipient]) -> WalletResult<SendReceipt>;

    /// Rotation-indexed receive address: integrated (payment-id keyed) or
    /// subaddress via the wallet RPC, degrading to the primary address.
    async fn receive_address(
        &self,
        rotation: u32,
        prefer_integrated: bool,
    ) -> WalletResult<String>;

    /// Daemon fee estimate, degrading to static defaults. Never fails.
    async fn fee_estimate(&self) -> FeeEstimate;

    /// Daemon reachability / sync snapshot. Never fails.
    async fn chain_status(&self) -> ChainStatus;

    /// Hardware-driven key import: scan, re-initialize, refresh. See
    /// [`KEY_IMPORT_NOTICE`].
    async fn rotate_key(&self, scanner: &dyn KeyScanner) -> WalletResult<RotationOutcome>;
}

/// Select a manager by chain tag ("sal" for Salvium). Unknown tags are
/// rejected, not defaulted.
pub fn wallet_manager_for(
    tag: &str,
    config: WalletConfig,
    store: Arc<dyn BlobStore>,
) -> WalletResult<Arc<dyn WalletManager>> {
    match tag.trim().to_ascii_lowercase().as_str() {
        "sal" => Ok(Arc::new(SalviumWallet::new(config, store)?)),
        other => Err(WalletError::InvalidInput(format!(
            "unsupported blockchain: {other}"
        ))),
    }
}
