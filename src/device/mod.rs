//! Hardware wallet link - line-oriented serial protocol.
//!
//! # Architecture
//!
//! ```text
//! DeviceLink::connect(transport, callbacks)
//!     │
//!     ├── spawns one read task: SerialTransport::lines() → dispatch
//!     │
//!     └── commands: PING / BALANCE / GET_ADDRESSES / GET_STATUS /
//!                   ROTATE_KEY / SIGN_TX  (write_line, any caller)
//! ```
//!
//! # Inbound dispatch
//!
//! Replies are not request-correlated; dispatch is by prefix, in the order
//! lines were framed off the wire:
//!
//! | Prefix | Effect |
//! |--------|--------|
//! | `PONG` | connection confirmed |
//! | `ADDRESS:<COIN>:<addr>` | address callback |
//! | `STATUS:...` | status callback |
//! | `ROTATION:SUCCESS` / other | rotation outcome |
//! | `SIGNATURE:<hex>` | signature callback |
//! | `[KEY_ROTATION]` `[OK]` `[BUTTON]` | log only |
//! | anything else | ignored (forward compatible) |

mod protocol;
mod transport;

pub use protocol::{DeviceCallbacks, DeviceLink, RotationRequest, RotationState};
pub use transport::{LineReader, SerialTransport, BAUD_RATE};
