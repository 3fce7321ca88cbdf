//! Crate-wide error taxonomy.
//!
//! Read paths (balance, history, fee estimate) degrade to safe defaults at
//! the call site instead of surfacing these; write paths (`send`,
//! `rotate_key`) always propagate them.

use thiserror::Error;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    /// Bad address, amount, payload, or chain tag. Rejected before any
    /// network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid private key: expected 64 hex characters")]
    InvalidKeyFormat,

    /// The optional wallet RPC endpoint has not been configured. Recoverable;
    /// callers fall back to daemon-only behavior.
    #[error("wallet RPC endpoint not configured")]
    NotConfigured,

    /// The operation cannot degrade and needs a wallet RPC endpoint.
    #[error("wallet RPC required for {0}")]
    WalletRpcRequired(&'static str),

    /// No wallet session exists yet; call `initialize` first.
    #[error("wallet not initialized")]
    Uninitialized,

    #[error("rpc timeout (method {method})")]
    Timeout { method: String },

    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The daemon or wallet RPC returned an explicit error. Surfaced verbatim.
    #[error("rpc error (method {method}) code={code} message={message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(String),

    /// A key rotation is already awaiting the device's acknowledgement.
    #[error("key rotation already in progress")]
    RotationInProgress,

    /// The hardware scan loop exhausted its retry budget.
    #[error("no key payload scanned within the retry budget")]
    ScanTimeout,

    #[error("serial transport unavailable: {0}")]
    UnsupportedTransport(String),

    #[error("device connection failed: {0}")]
    ConnectFailed(String),

    #[error("device not connected")]
    NotConnected,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
