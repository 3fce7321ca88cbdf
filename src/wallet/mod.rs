//! Wallet managers - one implementation per blockchain family.
//!
//! # Architecture
//!
//! ```text
//! wallet_manager_for("sal")
//!     │
//!     ▼
//! SalviumWallet (WalletManager trait)
//!     │
//!     ├── DaemonClient ────── public chain state (height, info, fees)
//!     ├── WalletRpcClient ─── optional key-aware service (balance,
//!     │                       transfers, send, address generation)
//!     ├── keys / address / units ── wallet math
//!     └── BlobStore ───────── persisted session blob
//! ```
//!
//! # Operations
//!
//! | Operation | Without wallet RPC |
//! |-----------|--------------------|
//! | `initialize` | works (pure derivation) |
//! | `balance` | fallback balance, chain height annotated |
//! | `history` | empty list |
//! | `send` | fails with `WalletRpcRequired` |
//! | `receive_address` | primary address |
//! | `rotate_key` | works; subaddress creation skipped |
//!
//! Read paths never surface transport errors; write paths always do.

mod manager;
mod salvium;
mod types;

pub use manager::{wallet_manager_for, WalletManager, KEY_IMPORT_NOTICE};
pub use salvium::SalviumWallet;
pub use types::{
    Balance, ChainStatus, Direction, KeyScanner, Recipient, RotationOutcome, SendReceipt,
    Transfer, TransferStatus, WalletConfig, WalletRpcConfig, WalletSession,
};
