//! Byte-stream transport framed into newline-delimited text lines.
//!
//! Real devices connect through tokio-serial at 115200 / 8-N-1; tests (and
//! any other byte pipe) go through [`SerialTransport::from_stream`]. Partial
//! lines are buffered across reads and never yielded early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf,
    WriteHalf,
};
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;
use tracing::warn;

use crate::error::{WalletError, WalletResult};

/// ESP32 framing: 115200 baud, 8 data bits, no parity, 1 stop bit.
pub const BAUD_RATE: u32 = 115_200;

pub trait SerialIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> SerialIo for T {}

type Stream = Box<dyn SerialIo>;

pub struct SerialTransport {
    writer: Mutex<Option<WriteHalf<Stream>>>,
    reader: Mutex<Option<LineReader>>,
    open: Arc<AtomicBool>,
}

impl SerialTransport {
    /// Open a serial port with the device framing. A missing enumeration
    /// capability maps to `UnsupportedTransport`; a rejected open (device
    /// gone, busy, bad framing) to `ConnectFailed`.
    pub fn open(path: &str, baud: u32) -> WalletResult<Self> {
        let stream = tokio_serial::new(path, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::NoDevice => {
                    WalletError::ConnectFailed(format!("no device at {path}"))
                }
                _ => WalletError::ConnectFailed(format!("{path}: {e}")),
            })?;
        Ok(Self::from_stream(stream))
    }

    /// List candidate serial ports. `UnsupportedTransport` when the host
    /// offers no serial capability at all.
    pub fn available_ports() -> WalletResult<Vec<String>> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| WalletError::UnsupportedTransport(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    /// Wrap any async byte stream (tests use `tokio::io::duplex`).
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: Stream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        let open = Arc::new(AtomicBool::new(true));
        Self {
            writer: Mutex::new(Some(write_half)),
            reader: Mutex::new(Some(LineReader {
                inner: BufReader::new(read_half).lines(),
                open: open.clone(),
            })),
            open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Write one command line (newline appended) and flush. Concurrent
    /// writers serialize here; the protocol imposes no backpressure.
    pub async fn write_line(&self, line: &str) -> WalletResult<()> {
        if !self.is_open() {
            return Err(WalletError::NotConnected);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(WalletError::NotConnected)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Hand the buffered read half to its single consumer. Fails once taken
    /// or after disconnect.
    pub async fn lines(&self) -> WalletResult<LineReader> {
        self.reader
            .lock()
            .await
            .take()
            .ok_or(WalletError::NotConnected)
    }

    /// Ordered, best-effort teardown: mark closed (pending reads observe it),
    /// drop an unclaimed reader, shut the writer down, release the port.
    /// Later steps run even when earlier ones fail.
    pub async fn disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);

        if let Some(reader) = self.reader.lock().await.take() {
            drop(reader);
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!(error = %e, "writer shutdown failed during disconnect");
            }
            // Port half dropped here; the peer half follows with the reader.
        }
    }
}

/// Lazy line sequence over the transport's read half. Yields on each
/// newline boundary; incomplete trailing data stays buffered.
pub struct LineReader {
    inner: Lines<BufReader<ReadHalf<Stream>>>,
    open: Arc<AtomicBool>,
}

impl LineReader {
    /// Next complete line (without the terminator), or `None` at end of
    /// stream or after the transport disconnected.
    pub async fn next_line(&mut self) -> WalletResult<Option<String>> {
        if !self.open.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.inner.next_line().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn partial_lines_are_buffered_until_newline() {
        let (device, host) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);
        let mut lines = transport.lines().await.expect("reader");

        let (_read, mut write) = tokio::io::split(device);
        write.write_all(b"STATUS:RE").await.unwrap();
        write.write_all(b"ADY\nPO").await.unwrap();
        write.write_all(b"NG\n").await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("STATUS:READY"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("PONG"));
    }

    #[tokio::test]
    async fn write_line_appends_newline() {
        let (device, host) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);
        transport.write_line("PING").await.unwrap();

        let (read, _write) = tokio::io::split(device);
        let mut lines = BufReader::new(read).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("PING"));
    }

    #[tokio::test]
    async fn reader_can_only_be_taken_once() {
        let (_device, host) = tokio::io::duplex(64);
        let transport = SerialTransport::from_stream(host);
        let _lines = transport.lines().await.expect("first take");
        assert!(matches!(
            transport.lines().await,
            Err(WalletError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_rejects_further_writes() {
        let (_device, host) = tokio::io::duplex(64);
        let transport = SerialTransport::from_stream(host);
        transport.disconnect().await;
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write_line("PING").await,
            Err(WalletError::NotConnected)
        ));
    }
}
