//! Command vocabulary, response dispatch, and the key-rotation handshake.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::transport::SerialTransport;
use crate::error::{WalletError, WalletResult};

/// How long an acknowledged `ROTATE_KEY` may stay unanswered before the
/// rotation fails.
const ROTATION_ACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// Command written to the wire.
    Sent,
    /// Waiting for `ROTATION:...` from the device.
    AwaitingAck,
    Succeeded,
    Failed,
}

impl RotationState {
    fn is_terminal(&self) -> bool {
        matches!(self, RotationState::Succeeded | RotationState::Failed)
    }
}

/// One hardware key rotation. At most one may be outstanding per connection.
#[derive(Debug, Clone)]
pub struct RotationRequest {
    pub chain_tag: String,
    pub old_address: String,
    pub new_address: String,
    pub state: RotationState,
    id: u64,
}

type ConnectedCallback = Box<dyn Fn() + Send + Sync>;
type AddressCallback = Box<dyn Fn(&str, &str) + Send + Sync>;
type StatusCallback = Box<dyn Fn(&str) + Send + Sync>;
type RotationCallback = Box<dyn Fn(bool) + Send + Sync>;
type SignatureCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Typed callbacks invoked by the read task, in the order lines were framed
/// off the wire. All optional.
#[derive(Default)]
pub struct DeviceCallbacks {
    on_connected: Option<ConnectedCallback>,
    on_address: Option<AddressCallback>,
    on_status: Option<StatusCallback>,
    on_rotation_complete: Option<RotationCallback>,
    on_signature: Option<SignatureCallback>,
}

impl DeviceCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `PONG` received; the device is alive.
    pub fn on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Box::new(f));
        self
    }

    /// `ADDRESS:<COIN>:<addr>` — the device reports an address for a coin.
    pub fn on_address(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_address = Some(Box::new(f));
        self
    }

    /// `STATUS:...` snapshot.
    pub fn on_status(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    /// Rotation outcome: `true` only for `ROTATION:SUCCESS`.
    pub fn on_rotation_complete(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_rotation_complete = Some(Box::new(f));
        self
    }

    /// `SIGNATURE:<hex>` — signed payload.
    pub fn on_signature(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_signature = Some(Box::new(f));
        self
    }
}

struct LinkShared {
    callbacks: DeviceCallbacks,
    rotation: Mutex<Option<RotationRequest>>,
    confirmed: AtomicBool,
    rotation_ids: AtomicU64,
}

impl LinkShared {
    fn dispatch(&self, line: &str) {
        debug!(line, "device line");

        if line == "PONG" {
            self.confirmed.store(true, Ordering::SeqCst);
            if let Some(cb) = &self.callbacks.on_connected {
                cb();
            }
        } else if let Some(rest) = line.strip_prefix("ADDRESS:") {
            match rest.split_once(':') {
                Some((coin, address)) if !address.is_empty() => {
                    if let Some(cb) = &self.callbacks.on_address {
                        cb(coin, address);
                    }
                }
                _ => debug!(line, "malformed ADDRESS line ignored"),
            }
        } else if let Some(status) = line.strip_prefix("STATUS:") {
            if let Some(cb) = &self.callbacks.on_status {
                cb(status);
            }
        } else if let Some(outcome) = line.strip_prefix("ROTATION:") {
            self.complete_rotation(outcome == "SUCCESS");
        } else if let Some(signature) = line.strip_prefix("SIGNATURE:") {
            if let Some(cb) = &self.callbacks.on_signature {
                cb(signature);
            }
        } else if line.starts_with("[KEY_ROTATION]")
            || line.starts_with("[OK]")
            || line.starts_with("[BUTTON]")
        {
            info!(line, "device");
        }
        // Unrecognized lines are ignored so newer firmware keeps working.
    }

    /// Resolve the outstanding rotation exactly once.
    fn complete_rotation(&self, success: bool) {
        let resolved = {
            let mut guard = match self.rotation.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_mut() {
                Some(request) if !request.state.is_terminal() => {
                    request.state = if success {
                        RotationState::Succeeded
                    } else {
                        RotationState::Failed
                    };
                    true
                }
                Some(_) => false,
                None => {
                    debug!("rotation ack with no rotation outstanding");
                    false
                }
            }
        };

        if resolved {
            if let Some(cb) = &self.callbacks.on_rotation_complete {
                cb(success);
            }
        }
    }

    /// Watchdog path: fail the rotation `id` if it never got an ack.
    fn expire_rotation(&self, id: u64) {
        let expired = {
            let mut guard = match self.rotation.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_mut() {
                Some(request) if request.id == id && !request.state.is_terminal() => {
                    request.state = RotationState::Failed;
                    true
                }
                _ => false,
            }
        };

        if expired {
            warn!("rotation timed out waiting for device ack");
            if let Some(cb) = &self.callbacks.on_rotation_complete {
                cb(false);
            }
        }
    }
}

/// One logical device connection: a shared write path plus a single read
/// task that owns the line sequence for the connection's lifetime.
/// Reconnecting means building a fresh link; there is no resumption.
pub struct DeviceLink {
    transport: Arc<SerialTransport>,
    shared: Arc<LinkShared>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceLink {
    /// Take ownership of the transport, start the read task, and probe the
    /// device with `PING` (the `PONG` reply flips [`is_confirmed`]).
    ///
    /// [`is_confirmed`]: Self::is_confirmed
    pub async fn connect(
        transport: SerialTransport,
        callbacks: DeviceCallbacks,
    ) -> WalletResult<Self> {
        let transport = Arc::new(transport);
        let mut lines = transport.lines().await?;

        let shared = Arc::new(LinkShared {
            callbacks,
            rotation: Mutex::new(None),
            confirmed: AtomicBool::new(false),
            rotation_ids: AtomicU64::new(0),
        });

        let reader_shared = shared.clone();
        let reader_task = tokio::spawn(async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            reader_shared.dispatch(line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "device read failed");
                        break;
                    }
                }
            }
            debug!("device read task finished");
        });

        let link = Self {
            transport,
            shared,
            reader_task: Mutex::new(Some(reader_task)),
        };
        link.ping().await?;
        Ok(link)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    /// True once the device has answered a `PING`.
    pub fn is_confirmed(&self) -> bool {
        self.shared.confirmed.load(Ordering::SeqCst)
    }

    /// Snapshot of the current (possibly resolved) rotation.
    pub fn rotation(&self) -> Option<RotationRequest> {
        match self.shared.rotation.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn ping(&self) -> WalletResult<()> {
        self.transport.write_line("PING").await
    }

    /// Push a display balance to the device screen.
    pub async fn update_balance(&self, coin: &str, amount: &str) -> WalletResult<()> {
        self.transport
            .write_line(&format!("BALANCE:{coin}:{amount}"))
            .await
    }

    /// Addresses arrive asynchronously via the address callback.
    pub async fn request_addresses(&self) -> WalletResult<()> {
        self.transport.write_line("GET_ADDRESSES").await
    }

    pub async fn request_status(&self) -> WalletResult<()> {
        self.transport.write_line("GET_STATUS").await
    }

    /// Start the key-rotation handshake. Fails fast with
    /// `RotationInProgress` while an earlier rotation is still unresolved;
    /// the outcome arrives through the rotation callback.
    pub async fn rotate_key(
        &self,
        coin_tag: &str,
        old_address: &str,
        new_address: &str,
    ) -> WalletResult<()> {
        let id = {
            let mut guard = match self.shared.rotation.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if matches!(guard.as_ref(), Some(r) if !r.state.is_terminal()) {
                return Err(WalletError::RotationInProgress);
            }
            let id = self.shared.rotation_ids.fetch_add(1, Ordering::SeqCst);
            *guard = Some(RotationRequest {
                chain_tag: coin_tag.to_string(),
                old_address: old_address.to_string(),
                new_address: new_address.to_string(),
                state: RotationState::Sent,
                id,
            });
            id
        };

        let command = format!("ROTATE_KEY:{coin_tag}:{old_address}:{new_address}");
        if let Err(e) = self.transport.write_line(&command).await {
            // Never reached the wire; clear the slot instead of failing it
            // through the callback.
            let mut guard = match self.shared.rotation.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if matches!(guard.as_ref(), Some(r) if r.id == id) {
                *guard = None;
            }
            return Err(e);
        }

        {
            let mut guard = match self.shared.rotation.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(request) = guard.as_mut() {
                if request.id == id && request.state == RotationState::Sent {
                    request.state = RotationState::AwaitingAck;
                }
            }
        }

        let watchdog = self.shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ROTATION_ACK_TIMEOUT).await;
            watchdog.expire_rotation(id);
        });

        Ok(())
    }

    /// Hand transaction data to the device for signing; the signature
    /// arrives through the signature callback.
    pub async fn sign_transaction(&self, coin_tag: &str, tx_data: &str) -> WalletResult<()> {
        self.transport
            .write_line(&format!("SIGN_TX:{coin_tag}:{tx_data}"))
            .await
    }

    /// Stop the read task, then tear the transport down. Safe to call more
    /// than once.
    pub async fn disconnect(&self) {
        let task = match self.reader_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
        }
        self.transport.disconnect().await;
        self.shared.confirmed.store(false, Ordering::SeqCst);
    }
}
