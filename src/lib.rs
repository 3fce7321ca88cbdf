//! Keywallet: multi-chain wallet client core. Remote RPC does the heavy
//! lifting; this crate owns the wallet math, the session, and the wire to
//! the hardware key-custody device.
//!
//! # Architecture
//!
//! ```text
//! wallet_manager_for(tag) ──► WalletManager (one impl per chain family)
//!   │
//!   ├── rpc      ── DaemonClient (public chain state)
//!   │              WalletRpcClient (optional, key-aware, basic auth)
//!   ├── keys     ── deterministic view-key / address derivation
//!   ├── address  ── syntactic validation, classification, payment URIs
//!   ├── units    ── exact atomic ⇄ display arithmetic
//!   └── store    ── opaque blob persistence (session, endpoint config)
//!
//! DeviceLink ──► SerialTransport (115200 8-N-1, newline-framed)
//!   │              one read task dispatches replies by prefix
//!   └── shares addresses/balances with the wallet via callbacks
//! ```
//!
//! # Operations
//!
//! | Operation | Degraded mode (no wallet RPC) |
//! |-----------|-------------------------------|
//! | `initialize` / `load_session` | works — derivation is local |
//! | `balance` | fallback balance + chain height |
//! | `history` | empty list |
//! | `send` | fails with `WalletRpcRequired` |
//! | `receive_address` | primary address |
//! | `rotate_key` | works; subaddress creation skipped |
//!
//! # Usage
//!
//! ```ignore
//! use keywallet::{wallet_manager_for, MemoryStore, WalletConfig};
//! use std::sync::Arc;
//!
//! let config = WalletConfig::new()
//!     .with_daemon("http://127.0.0.1:19081")
//!     .with_wallet_rpc("http://127.0.0.1:19083", None, None);
//! let wallet = wallet_manager_for("sal", config, Arc::new(MemoryStore::new()))?;
//!
//! let session = wallet.initialize(spend_key_hex, None).await?;
//! let balance = wallet.balance().await;
//! ```
//!
//! The derivation routines are deterministic digest placeholders pending a
//! real CryptoNote cryptography backend; see the `keys` module notes.

pub mod address;
pub mod chain;
pub mod device;
pub mod error;
pub mod keys;
pub mod logging;
pub mod rpc;
pub mod store;
pub mod units;
pub mod wallet;

pub use address::{AddressCodec, AddressKind, PaymentRequest};
pub use chain::{ChainParams, NetworkType, SALVIUM};
pub use device::{DeviceCallbacks, DeviceLink, SerialTransport, BAUD_RATE};
pub use error::{WalletError, WalletResult};
pub use logging::init_logging;
pub use rpc::{DaemonClient, DaemonInfo, FeeEstimate, WalletRpcClient};
pub use store::{BlobStore, FileStore, MemoryStore};
pub use units::UnitConverter;
pub use wallet::{
    wallet_manager_for, Balance, ChainStatus, KeyScanner, Recipient, SalviumWallet,
    Transfer, WalletConfig, WalletManager, WalletSession, KEY_IMPORT_NOTICE,
};
