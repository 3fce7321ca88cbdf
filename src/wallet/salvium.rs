//! Salvium (CryptoNote family) wallet manager.
//!
//! Wallet logic lives in the remote `salvium-wallet-rpc` process; this
//! manager derives deterministic key material locally, shapes the RPC
//! results for display, and degrades to daemon-only behavior whenever the
//! optional wallet endpoint is absent or failing.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::address::AddressCodec;
use crate::chain::{ChainParams, NetworkType, SALVIUM};
use crate::error::{WalletError, WalletResult};
use crate::keys;
use crate::rpc::{
    DaemonClient, Destination, FeeEstimate, TransferEntry, TransferParams,
    TransferSelector, WalletRpcClient,
};
use crate::store::BlobStore;
use crate::units::UnitConverter;

use super::manager::{WalletManager, KEY_IMPORT_NOTICE};
use super::types::{
    Balance, ChainStatus, Direction, KeyScanner, Recipient, RotationOutcome, SendReceipt,
    Transfer, TransferStatus, WalletConfig, WalletSession,
};

const ACCOUNT_INDEX: u32 = 0;
const DEFAULT_PRIORITY: u32 = 0;

/// Scan loop bound: 100 attempts at a fixed 300 ms backoff.
const MAX_SCAN_ATTEMPTS: u32 = 100;
const SCAN_BACKOFF: Duration = Duration::from_millis(300);

/// Fallback fee ladder in atomic units (0.001 / 0.005 / 0.01 / 0.05 SAL),
/// used when the daemon cannot answer.
const FALLBACK_FEES: [u64; 4] = [
    1_000_000_000,
    5_000_000_000,
    10_000_000_000,
    50_000_000_000,
];

pub struct SalviumWallet {
    params: ChainParams,
    network: NetworkType,
    units: UnitConverter,
    codec: AddressCodec,
    daemon: DaemonClient,
    wallet_rpc: Option<WalletRpcClient>,
    store: Arc<dyn BlobStore>,
    session: RwLock<Option<WalletSession>>,
}

impl SalviumWallet {
    pub fn new(config: WalletConfig, store: Arc<dyn BlobStore>) -> WalletResult<Self> {
        let params = SALVIUM;
        let daemon = DaemonClient::new(&config.daemon_url)?;

        let wallet_rpc = match &config.wallet_rpc {
            Some(rpc) => {
                // URL and username are remembered; the password never is.
                store.put(&Self::key(&params, "wallet_rpc_url"), &rpc.url)?;
                match &rpc.username {
                    Some(user) => store.put(&Self::key(&params, "wallet_rpc_user"), user)?,
                    None => store.remove(&Self::key(&params, "wallet_rpc_user"))?,
                }
                Some(WalletRpcClient::new(&rpc.url, rpc.auth())?)
            }
            None => None,
        };

        Ok(Self {
            params,
            network: config.network,
            units: UnitConverter::new(params),
            codec: AddressCodec::new(params),
            daemon,
            wallet_rpc,
            store,
            session: RwLock::new(None),
        })
    }

    fn key(params: &ChainParams, suffix: &str) -> String {
        format!("{}/{}", params.tag, suffix)
    }

    fn session_key(&self) -> String {
        Self::key(&self.params, "session")
    }

    fn primary_address(&self) -> Option<String> {
        self.session
            .read()
            .ok()?
            .as_ref()
            .map(|s| s.primary_address.clone())
    }

    fn wallet_rpc(&self) -> WalletResult<&WalletRpcClient> {
        self.wallet_rpc.as_ref().ok_or(WalletError::NotConfigured)
    }

    /// Chain height for balance annotations; None when the daemon is down.
    async fn chain_height(&self) -> Option<u64> {
        match self.daemon.get_block_count().await {
            Ok(count) => Some(count.count),
            Err(e) => {
                debug!(error = %e, "daemon height unavailable");
                None
            }
        }
    }

    fn convert_transfer(
        &self,
        entry: &TransferEntry,
        direction: Direction,
        status: TransferStatus,
    ) -> Transfer {
        Transfer {
            txid: entry.txid.clone(),
            height: (entry.height != 0).then_some(entry.height),
            amount_atomic: entry.amount as u128,
            fee_atomic: entry.fee as u128,
            timestamp: entry.timestamp,
            direction,
            confirmations: entry.confirmations,
            unlock_time: entry.unlock_time,
            payment_id: (!entry.payment_id.is_empty()).then(|| entry.payment_id.clone()),
            counterparty: if entry.address.is_empty() {
                self.primary_address()
            } else {
                Some(entry.address.clone())
            },
            status,
        }
    }

    /// Payloads arrive as `spendKey|rotation[|chainTag]`.
    fn parse_key_payload(&self, payload: &str) -> WalletResult<(String, u32)> {
        let parts: Vec<&str> = payload.split('|').collect();
        if parts.len() < 2 {
            return Err(WalletError::InvalidInput(
                "malformed key payload".into(),
            ));
        }
        if let Some(tag) = parts.get(2) {
            if !tag.is_empty() && *tag != self.params.tag {
                return Err(WalletError::InvalidInput(format!(
                    "wrong blockchain selected on device: expected {}, got {tag}",
                    self.params.tag
                )));
            }
        }
        let rotation = parts[1].parse::<u32>().unwrap_or(0);
        Ok((parts[0].to_string(), rotation))
    }
}

#[async_trait]
impl WalletManager for SalviumWallet {
    fn params(&self) -> &ChainParams {
        &self.params
    }

    fn session(&self) -> Option<WalletSession> {
        self.session.read().ok()?.clone()
    }

    async fn initialize(
        &self,
        spend_key: &str,
        view_key: Option<&str>,
    ) -> WalletResult<WalletSession> {
        keys::validate_private_key(spend_key)?;
        let view_key = match view_key {
            Some(view) => {
                keys::validate_private_key(view)?;
                view.to_string()
            }
            None => keys::derive_view_key(spend_key)?,
        };
        let primary_address =
            keys::derive_address(spend_key, &view_key, self.network, &self.params)?;

        let session = WalletSession {
            primary_address: primary_address.clone(),
            private_spend_key: spend_key.to_string(),
            private_view_key: view_key,
            network: self.network,
        };

        let blob = serde_json::to_string(&session)
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        self.store.put(&self.session_key(), &blob)?;

        *self
            .session
            .write()
            .map_err(|_| WalletError::Storage("session lock".into()))? = Some(session.clone());

        let preview = &primary_address[..20.min(primary_address.len())];
        info!(address = %preview, "wallet initialized");
        Ok(session)
    }

    async fn load_session(&self) -> WalletResult<bool> {
        let Some(blob) = self.store.get(&self.session_key())? else {
            return Ok(false);
        };
        let stored: WalletSession = serde_json::from_str(&blob)
            .map_err(|e| WalletError::Storage(format!("corrupt session blob: {e}")))?;

        // Re-derive instead of trusting the stored address; the address is a
        // pure function of the keys and the network.
        let session = self
            .initialize(&stored.private_spend_key, Some(&stored.private_view_key))
            .await?;
        if session.primary_address != stored.primary_address {
            warn!("stored primary address did not match derivation; re-derived");
        }
        Ok(true)
    }

    async fn balance(&self) -> Balance {
        // Height annotation and the wallet query are independent; neither
        // waits on the other's timeout.
        let (sync_height, wallet_balance) = match &self.wallet_rpc {
            Some(rpc) => {
                let (height, balance) =
                    tokio::join!(self.chain_height(), rpc.get_balance(ACCOUNT_INDEX));
                (height, Some(balance))
            }
            None => {
                debug!("wallet RPC not configured, balance requires wallet RPC sync");
                (self.chain_height().await, None)
            }
        };

        match wallet_balance {
            Some(Ok(result)) => Balance {
                total_atomic: result.balance as u128,
                unlocked_atomic: result.unlocked_balance as u128,
                sync_height,
                authoritative: true,
            },
            Some(Err(e)) => {
                warn!(error = %e, "wallet RPC balance failed, using fallback");
                Balance::fallback(sync_height)
            }
            None => Balance::fallback(sync_height),
        }
    }

    async fn history(&self) -> Vec<Transfer> {
        let Ok(rpc) = self.wallet_rpc() else {
            debug!("wallet RPC not configured, history is empty");
            return Vec::new();
        };

        let result = match rpc.get_transfers(&TransferSelector::default()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "get_transfers failed, history is empty");
                return Vec::new();
            }
        };

        let mut transfers = Vec::with_capacity(
            result.incoming.len() + result.out.len() + result.pending.len() + result.pool.len(),
        );
        for entry in &result.incoming {
            transfers.push(self.convert_transfer(
                entry,
                Direction::Received,
                TransferStatus::Confirmed,
            ));
        }
        for entry in &result.out {
            transfers.push(self.convert_transfer(
                entry,
                Direction::Sent,
                TransferStatus::Confirmed,
            ));
        }
        for entry in &result.pending {
            transfers.push(self.convert_transfer(
                entry,
                Direction::Sent,
                TransferStatus::Pending,
            ));
        }
        for entry in &result.pool {
            transfers.push(self.convert_transfer(
                entry,
                Direction::Received,
                TransferStatus::Pending,
            ));
        }

        // Stable sort: equal timestamps keep their fetch order.
        transfers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transfers
    }

    async fn send(&self, recipients: &[Recipient]) -> WalletResult<SendReceipt> {
        if recipients.is_empty() {
            return Err(WalletError::InvalidInput("no recipients".into()));
        }

        // All-or-nothing pre-check: every address and amount is validated
        // before the first network call.
        let mut destinations = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            if !self.codec.is_valid(&recipient.address) {
                return Err(WalletError::InvalidInput(format!(
                    "invalid {} address: {}",
                    self.params.name, recipient.address
                )));
            }
            let atomic = self.units.to_atomic(&recipient.amount)?;
            if atomic == 0 {
                return Err(WalletError::InvalidAmount(format!(
                    "amount must be positive: {}",
                    recipient.amount
                )));
            }
            let amount = u64::try_from(atomic).map_err(|_| {
                WalletError::InvalidAmount(format!("amount out of range: {}", recipient.amount))
            })?;
            destinations.push(Destination {
                address: recipient.address.clone(),
                amount,
            });
        }

        let rpc = self
            .wallet_rpc
            .as_ref()
            .ok_or(WalletError::WalletRpcRequired("send"))?;

        let result = rpc
            .transfer(&TransferParams {
                destinations,
                account_index: ACCOUNT_INDEX,
                priority: DEFAULT_PRIORITY,
                get_tx_key: true,
                get_tx_hex: true,
                get_tx_metadata: true,
            })
            .await?;

        let tx_preview = &result.tx_hash[..16.min(result.tx_hash.len())];
        info!(
            tx = %tx_preview,
            fee = %self.units.format(result.fee as u128),
            "transaction broadcast"
        );

        Ok(SendReceipt {
            tx_hash: result.tx_hash,
            fee_atomic: result.fee as u128,
            tx_key: result.tx_key,
            tx_hex: result.tx_blob,
            tx_metadata: result.tx_metadata,
        })
    }

    async fn receive_address(
        &self,
        rotation: u32,
        prefer_integrated: bool,
    ) -> WalletResult<String> {
        let primary = self.primary_address().ok_or(WalletError::Uninitialized)?;

        if let Some(rpc) = &self.wallet_rpc {
            if prefer_integrated {
                // Rotation-derived payment id supports asynchronous
                // return-payment matching (CARROT).
                let payment_id = format!("{rotation:016x}");
                match rpc.make_integrated_address(&primary, &payment_id).await {
                    Ok(result) => return Ok(result.integrated_address),
                    Err(e) => {
                        warn!(error = %e, "make_integrated_address failed, using primary")
                    }
                }
            } else if rotation > 0 {
                match rpc
                    .create_address(ACCOUNT_INDEX, &format!("Rotation {rotation}"))
                    .await
                {
                    Ok(result) => return Ok(result.address),
                    Err(e) => warn!(error = %e, "create_address failed, using primary"),
                }
            }
        }

        Ok(primary)
    }

    async fn fee_estimate(&self) -> FeeEstimate {
        match self.daemon.get_fee_estimate().await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(error = %e, "get_fee_estimate failed, using defaults");
                FeeEstimate {
                    fee: FALLBACK_FEES[0],
                    fees: FALLBACK_FEES.to_vec(),
                    quantization_mask: 1,
                    status: "fallback".into(),
                }
            }
        }
    }

    async fn chain_status(&self) -> ChainStatus {
        match self.daemon.get_info().await {
            Ok(info) => ChainStatus {
                online: true,
                height: info.height,
                target_height: info.target_height,
                network: Some(info.network()),
                synced: info.is_synced(),
                connections: info.connections(),
                tx_pool_size: info.tx_pool_size,
            },
            Err(e) => {
                warn!(error = %e, "daemon unavailable, running in offline mode");
                ChainStatus::offline()
            }
        }
    }

    async fn rotate_key(&self, scanner: &dyn KeyScanner) -> WalletResult<RotationOutcome> {
        warn!("{KEY_IMPORT_NOTICE}");

        let mut payload = None;
        for _ in 0..MAX_SCAN_ATTEMPTS {
            // An Err from the scanner means the source disconnected; abort
            // rather than keep polling.
            match scanner.capture().await? {
                Some(data) => {
                    payload = Some(data);
                    break;
                }
                None => tokio::time::sleep(SCAN_BACKOFF).await,
            }
        }
        let payload = payload.ok_or(WalletError::ScanTimeout)?;

        let (spend_key, rotation) = self.parse_key_payload(&payload)?;
        let session = self.initialize(&spend_key, None).await?;

        if rotation > 0 {
            if let Some(rpc) = &self.wallet_rpc {
                if let Err(e) = rpc
                    .create_address(ACCOUNT_INDEX, &format!("Rotation {rotation}"))
                    .await
                {
                    warn!(error = %e, "could not create rotation subaddress");
                }
            }
        }

        let balance = self.balance().await;
        debug!(
            total = balance.total_atomic,
            authoritative = balance.authoritative,
            "post-rotation balance refresh"
        );

        Ok(RotationOutcome {
            primary_address: session.primary_address.clone(),
            rotation_index: rotation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const SPEND_KEY: &str =
        "0101010101010101010101010101010101010101010101010101010101010101";

    fn wallet() -> SalviumWallet {
        SalviumWallet::new(WalletConfig::new(), Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let wallet = wallet();
        let first = wallet.initialize(SPEND_KEY, None).await.unwrap();
        let second = wallet.initialize(SPEND_KEY, None).await.unwrap();
        assert_eq!(first.primary_address, second.primary_address);
        assert_eq!(first.private_view_key, second.private_view_key);
    }

    #[tokio::test]
    async fn initialize_rejects_bad_keys() {
        let wallet = wallet();
        assert!(matches!(
            wallet.initialize("not-hex", None).await,
            Err(WalletError::InvalidKeyFormat)
        ));
        assert!(matches!(
            wallet.initialize(SPEND_KEY, Some("short")).await,
            Err(WalletError::InvalidKeyFormat)
        ));
    }

    #[tokio::test]
    async fn session_blob_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let address = {
            let wallet =
                SalviumWallet::new(WalletConfig::new(), store.clone()).unwrap();
            wallet
                .initialize(SPEND_KEY, None)
                .await
                .unwrap()
                .primary_address
                .clone()
        };

        let restored = SalviumWallet::new(WalletConfig::new(), store).unwrap();
        assert!(restored.session().is_none());
        assert!(restored.load_session().await.unwrap());
        assert_eq!(restored.session().unwrap().primary_address, address);
    }

    #[tokio::test]
    async fn load_session_without_blob_reports_absent() {
        let wallet = wallet();
        assert!(!wallet.load_session().await.unwrap());
    }

    #[test]
    fn key_payload_parsing() {
        let wallet = wallet();
        let (key, rotation) = wallet
            .parse_key_payload(&format!("{SPEND_KEY}|3|sal"))
            .unwrap();
        assert_eq!(key, SPEND_KEY);
        assert_eq!(rotation, 3);

        assert!(matches!(
            wallet.parse_key_payload(SPEND_KEY),
            Err(WalletError::InvalidInput(_))
        ));
        assert!(matches!(
            wallet.parse_key_payload(&format!("{SPEND_KEY}|1|yda")),
            Err(WalletError::InvalidInput(_))
        ));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let session = WalletSession {
            primary_address: "SC1example".into(),
            private_spend_key: SPEND_KEY.into(),
            private_view_key: SPEND_KEY.into(),
            network: NetworkType::Mainnet,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains(SPEND_KEY));
        assert!(rendered.contains("<redacted>"));
    }
}
