//! Device protocol tests over an in-memory byte pipe.
//!
//! These tests verify:
//! 1. The key-rotation handshake resolves exactly once, success or failure
//! 2. A second rotation is refused while one is outstanding
//! 3. Unrecognized lines are ignored without errors or callbacks
//! 4. Dispatch-by-prefix reaches the right typed callback
//! 5. An unanswered rotation fails via the ack watchdog

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

use keywallet::device::{DeviceCallbacks, DeviceLink, RotationState, SerialTransport};
use keywallet::WalletError;

/// The far side of the wire, standing in for the hardware wallet.
struct FakeDevice {
    lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeDevice {
    fn new(stream: DuplexStream) -> Self {
        let (read, writer) = tokio::io::split(stream);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn expect_line(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a command")
            .expect("read failed")
            .expect("stream closed")
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("device write");
    }
}

#[derive(Default)]
struct Recorded {
    connected: AtomicUsize,
    rotations: Mutex<Vec<bool>>,
    addresses: Mutex<Vec<(String, String)>>,
    statuses: Mutex<Vec<String>>,
    signatures: Mutex<Vec<String>>,
}

fn recording_callbacks(recorded: &Arc<Recorded>) -> DeviceCallbacks {
    let connected = recorded.clone();
    let rotations = recorded.clone();
    let addresses = recorded.clone();
    let statuses = recorded.clone();
    let signatures = recorded.clone();
    DeviceCallbacks::new()
        .on_connected(move || {
            connected.connected.fetch_add(1, Ordering::SeqCst);
        })
        .on_rotation_complete(move |ok| {
            rotations.rotations.lock().unwrap().push(ok);
        })
        .on_address(move |coin, address| {
            addresses
                .addresses
                .lock()
                .unwrap()
                .push((coin.to_string(), address.to_string()));
        })
        .on_status(move |status| {
            statuses.statuses.lock().unwrap().push(status.to_string());
        })
        .on_signature(move |hex| {
            signatures.signatures.lock().unwrap().push(hex.to_string());
        })
}

async fn connect() -> (DeviceLink, FakeDevice, Arc<Recorded>) {
    let (device_side, host_side) = tokio::io::duplex(1024);
    let recorded = Arc::new(Recorded::default());
    let transport = SerialTransport::from_stream(host_side);
    let link = DeviceLink::connect(transport, recording_callbacks(&recorded))
        .await
        .expect("connect");
    let mut device = FakeDevice::new(device_side);
    assert_eq!(device.expect_line().await, "PING");
    (link, device, recorded)
}

/// Poll until `predicate` holds; the read task dispatches asynchronously.
async fn wait_for(mut predicate: impl FnMut() -> bool) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Test: PONG confirms the connection and fires the connected callback.
#[tokio::test]
async fn pong_confirms_connection() {
    let (link, mut device, recorded) = connect().await;
    assert!(!link.is_confirmed());

    device.send("PONG").await;
    wait_for(|| link.is_confirmed()).await;
    assert_eq!(recorded.connected.load(Ordering::SeqCst), 1);

    link.disconnect().await;
}

/// Test: ROTATION:SUCCESS resolves the handshake with true, exactly once.
#[tokio::test]
async fn rotation_success_invokes_callback_once() {
    let (link, mut device, recorded) = connect().await;

    link.rotate_key("SAL", "addrA", "addrB").await.expect("rotate");
    assert_eq!(
        device.expect_line().await,
        "ROTATE_KEY:SAL:addrA:addrB"
    );
    assert_eq!(
        link.rotation().expect("outstanding").state,
        RotationState::AwaitingAck
    );

    device.send("ROTATION:SUCCESS").await;
    wait_for(|| !recorded.rotations.lock().unwrap().is_empty()).await;

    // A duplicate ack must not fire the callback again.
    device.send("ROTATION:SUCCESS").await;
    device.send("GET_NOOP").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*recorded.rotations.lock().unwrap(), vec![true]);
    assert_eq!(link.rotation().unwrap().state, RotationState::Succeeded);

    link.disconnect().await;
}

/// Test: any non-SUCCESS rotation outcome resolves with false.
#[tokio::test]
async fn rotation_failure_invokes_callback_with_false() {
    let (link, mut device, recorded) = connect().await;

    link.rotate_key("SAL", "addrA", "addrB").await.expect("rotate");
    device.expect_line().await;
    device.send("ROTATION:FAILED").await;

    wait_for(|| !recorded.rotations.lock().unwrap().is_empty()).await;
    assert_eq!(*recorded.rotations.lock().unwrap(), vec![false]);
    assert_eq!(link.rotation().unwrap().state, RotationState::Failed);

    link.disconnect().await;
}

/// Test: a second rotation while one awaits its ack fails fast and leaves
/// the first untouched.
#[tokio::test]
async fn concurrent_rotation_is_refused() {
    let (link, mut device, recorded) = connect().await;

    link.rotate_key("SAL", "addrA", "addrB").await.expect("first");
    device.expect_line().await;

    let err = link.rotate_key("SAL", "addrC", "addrD").await.unwrap_err();
    assert!(matches!(err, WalletError::RotationInProgress));

    let outstanding = link.rotation().expect("first still outstanding");
    assert_eq!(outstanding.new_address, "addrB");

    // The first rotation still resolves normally.
    device.send("ROTATION:SUCCESS").await;
    wait_for(|| !recorded.rotations.lock().unwrap().is_empty()).await;
    assert_eq!(*recorded.rotations.lock().unwrap(), vec![true]);

    // And a new rotation is allowed after resolution.
    link.rotate_key("SAL", "addrB", "addrE").await.expect("second");
    assert_eq!(device.expect_line().await, "ROTATE_KEY:SAL:addrB:addrE");

    link.disconnect().await;
}

/// Test: unrecognized lines are ignored — no error, no callback.
#[tokio::test]
async fn unrecognized_lines_are_ignored() {
    let (link, mut device, recorded) = connect().await;

    device.send("FOO:bar").await;
    device.send("[EEPROM] Loading keys...").await;
    device.send("").await;
    device.send("PONG").await;
    wait_for(|| link.is_confirmed()).await;

    assert!(recorded.rotations.lock().unwrap().is_empty());
    assert!(recorded.addresses.lock().unwrap().is_empty());
    assert!(recorded.statuses.lock().unwrap().is_empty());
    assert!(recorded.signatures.lock().unwrap().is_empty());

    link.disconnect().await;
}

/// Test: prefix dispatch reaches the matching typed callback with the
/// payload intact.
#[tokio::test]
async fn prefixes_dispatch_to_typed_callbacks() {
    let (link, mut device, recorded) = connect().await;

    device.send("ADDRESS:SAL:SC1somewhere").await;
    device.send("STATUS:DEVICE:ESP32-2432S028:TOUCH:YES").await;
    device.send("SIGNATURE:deadbeef").await;

    wait_for(|| !recorded.signatures.lock().unwrap().is_empty()).await;

    assert_eq!(
        *recorded.addresses.lock().unwrap(),
        vec![("SAL".to_string(), "SC1somewhere".to_string())]
    );
    assert_eq!(
        *recorded.statuses.lock().unwrap(),
        vec!["DEVICE:ESP32-2432S028:TOUCH:YES".to_string()]
    );
    assert_eq!(*recorded.signatures.lock().unwrap(), vec!["deadbeef".to_string()]);

    link.disconnect().await;
}

/// Test: commands issued by the wallet side arrive framed one per line.
#[tokio::test]
async fn commands_are_framed_one_per_line() {
    let (link, mut device, _recorded) = connect().await;

    link.update_balance("SAL", "12.50").await.expect("balance");
    link.request_addresses().await.expect("addresses");
    link.request_status().await.expect("status");
    link.sign_transaction("SAL", "txdata").await.expect("sign");

    assert_eq!(device.expect_line().await, "BALANCE:SAL:12.50");
    assert_eq!(device.expect_line().await, "GET_ADDRESSES");
    assert_eq!(device.expect_line().await, "GET_STATUS");
    assert_eq!(device.expect_line().await, "SIGN_TX:SAL:txdata");

    link.disconnect().await;
}

/// Test: writes after disconnect fail with NotConnected.
#[tokio::test]
async fn disconnect_stops_the_link() {
    let (link, _device, _recorded) = connect().await;
    assert!(link.is_connected());

    link.disconnect().await;
    assert!(!link.is_connected());
    assert!(matches!(link.ping().await, Err(WalletError::NotConnected)));
}

/// Test: an unanswered ROTATE_KEY fails through the ack watchdog with the
/// callback invoked exactly once.
#[tokio::test(start_paused = true)]
async fn unanswered_rotation_times_out() {
    let (link, mut device, recorded) = connect().await;

    link.rotate_key("SAL", "addrA", "addrB").await.expect("rotate");
    assert_eq!(device.expect_line().await, "ROTATE_KEY:SAL:addrA:addrB");

    // No ack ever arrives; paused time fast-forwards through the watchdog
    // deadline before this sleep resolves.
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(*recorded.rotations.lock().unwrap(), vec![false]);
    assert_eq!(link.rotation().unwrap().state, RotationState::Failed);

    link.disconnect().await;
}
