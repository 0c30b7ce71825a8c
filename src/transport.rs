//! Device addressing, stream opening, and MockPort for testing.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const TCP_SCHEME: &str = "tcp://";
const SOCKET_SCHEME: &str = "socket://";

/// A byte stream the IO task can own.
pub trait Port: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Port for T {}

pub type BoxedPort = Box<dyn Port>;

/// Where the switcher is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    /// Local serial device, e.g. `/dev/ttyUSB0` or `COM3`.
    Serial(String),
    /// Raw TCP tunnel to a serial server.
    Socket { host: String, port: u16 },
}

impl DeviceAddress {
    /// Parse a user-supplied address. `tcp://host:port` is accepted as an
    /// alias for `socket://host:port`.
    pub fn parse(url: &str) -> Result<Self> {
        let url = normalize_url(url.trim());
        if url.is_empty() {
            return Err(Error::InvalidAddress("empty device address".into()));
        }

        let Some(endpoint) = url.strip_prefix(SOCKET_SCHEME) else {
            return Ok(DeviceAddress::Serial(url));
        };

        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidAddress(format!("missing port in {url}")))?;
        if host.is_empty() {
            return Err(Error::InvalidAddress(format!("missing host in {url}")));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid port in {url}")))?;

        Ok(DeviceAddress::Socket {
            host: host.to_string(),
            port,
        })
    }

    /// Socket-style URL or device path.
    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAddress::Serial(path) => f.write_str(path),
            DeviceAddress::Socket { host, port } => write!(f, "{SOCKET_SCHEME}{host}:{port}"),
        }
    }
}

/// Rewrite `tcp://host:port` to the socket-style `socket://host:port`.
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix(TCP_SCHEME) {
        Some(rest) => format!("{SOCKET_SCHEME}{rest}"),
        None => url.to_string(),
    }
}

/// Link-level parameters used when opening a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    /// Bound on a single read; also how often the reader re-checks its stop
    /// signal when the line is idle.
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Open the byte stream for `address`.
pub async fn open(address: &DeviceAddress, settings: &LinkSettings) -> Result<BoxedPort> {
    info!(%address, "opening switcher stream");
    match address {
        DeviceAddress::Serial(path) => {
            let port: BoxedPort = Box::new(open_serial(path, settings)?);
            Ok(port)
        }
        DeviceAddress::Socket { host, port } => {
            let stream = tokio::time::timeout(
                settings.connect_timeout,
                TcpStream::connect((host.as_str(), *port)),
            )
            .await
            .map_err(|_| Error::Connection(format!("timed out connecting to {address}")))?
            .map_err(|e| Error::Connection(format!("failed to connect to {address}: {e}")))?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%address, "could not set TCP_NODELAY: {e}");
            }
            let port: BoxedPort = Box::new(stream);
            Ok(port)
        }
    }
}

/// Open a serial port for SIS communication.
///
/// Parameters: 8N1, no flow control, baud rate and timeout from `settings`.
pub fn open_serial(path: &str, settings: &LinkSettings) -> Result<tokio_serial::SerialStream> {
    let builder = tokio_serial::new(path, settings.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(settings.read_timeout);

    tokio_serial::SerialStream::open(&builder)
        .map_err(|e| Error::Connection(format!("failed to open {path}: {e}")))
}

/// Open the stream at `url` and close it again immediately.
///
/// Used to validate an address before committing it to configuration.
pub async fn probe(url: &str) -> Result<()> {
    let address = DeviceAddress::parse(url)?;
    let port = open(&address, &LinkSettings::default()).await?;
    drop(port);
    debug!(%address, "probe succeeded");
    Ok(())
}

// ---------------------------------------------------------------------------
// MockPort for testing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    /// Bytes available for the reader (device → host).
    read_buf: Vec<u8>,
    /// All bytes written by the host (host → device).
    write_log: Vec<u8>,
    /// Set by `close()` or by the host shutting the stream down.
    closed: bool,
    /// Set by `fail_writes()`; reads keep working.
    writes_fail: bool,
    read_waker: Option<Waker>,
}

/// An in-memory switcher port implementing `AsyncRead + AsyncWrite`.
///
/// Queue device lines with [`queue_line()`](MockPort::queue_line), then
/// inspect the commands the host sent with
/// [`written_lines()`](MockPort::written_lines). Reads with nothing queued
/// stay pending, like an idle serial line.
#[derive(Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for the reader. Wakes any pending read.
    pub fn queue_read(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.read_buf.extend_from_slice(data);
        if let Some(waker) = state.read_waker.take() {
            waker.wake();
        }
    }

    /// Queue one device line terminated with CR LF.
    pub fn queue_line(&self, line: &str) {
        self.queue_read(format!("{line}\r\n").as_bytes());
    }

    /// All bytes written by the host.
    pub fn written_data(&self) -> Vec<u8> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// Written commands split on their CR terminators.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written_data())
            .split_terminator('\r')
            .map(str::to_string)
            .collect()
    }

    /// Forget everything written so far.
    pub fn clear_written(&self) {
        self.state.lock().unwrap().write_log.clear();
    }

    /// True once the host shut the stream down or `close()` was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Make every later write and flush fail while reads keep working.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().writes_fail = true;
    }

    /// Simulate the device dropping the link: reads and writes fail.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        if let Some(waker) = state.read_waker.take() {
            waker.wake();
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "mock port closed")
}

impl AsyncRead for MockPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Poll::Ready(Err(closed_error()));
        }

        if state.read_buf.is_empty() {
            state.read_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = buf.remaining().min(state.read_buf.len());
        buf.put_slice(&state.read_buf[..n]);
        state.read_buf.drain(..n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock().unwrap();
        if state.closed || state.writes_fail {
            return Poll::Ready(Err(closed_error()));
        }
        state.write_log.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let state = self.state.lock().unwrap();
        if state.closed || state.writes_fail {
            return Poll::Ready(Err(closed_error()));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        if let Some(waker) = state.read_waker.take() {
            waker.wake();
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serial_path() {
        assert_eq!(
            DeviceAddress::parse("/dev/ttyUSB0").unwrap(),
            DeviceAddress::Serial("/dev/ttyUSB0".into())
        );
        assert_eq!(
            DeviceAddress::parse(" COM3 ").unwrap(),
            DeviceAddress::Serial("COM3".into())
        );
    }

    #[test]
    fn tcp_is_rewritten_to_socket() {
        assert_eq!(normalize_url("tcp://10.0.0.5:4001"), "socket://10.0.0.5:4001");
        assert_eq!(normalize_url("/dev/ttyS0"), "/dev/ttyS0");

        let address = DeviceAddress::parse("tcp://10.0.0.5:4001").unwrap();
        assert_eq!(
            address,
            DeviceAddress::Socket {
                host: "10.0.0.5".into(),
                port: 4001
            }
        );
        assert_eq!(address.url(), "socket://10.0.0.5:4001");
    }

    #[test]
    fn socket_scheme_accepted() {
        let address = DeviceAddress::parse("socket://switcher.local:23").unwrap();
        assert_eq!(address.to_string(), "socket://switcher.local:23");
    }

    #[test]
    fn invalid_addresses() {
        assert!(DeviceAddress::parse("").is_err());
        assert!(DeviceAddress::parse("   ").is_err());
        assert!(DeviceAddress::parse("tcp://host").is_err());
        assert!(DeviceAddress::parse("tcp://host:notaport").is_err());
        assert!(DeviceAddress::parse("tcp://:4001").is_err());
    }

    #[test]
    fn default_link_settings() {
        let settings = LinkSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn mock_written_lines() {
        let mock = MockPort::new();
        mock.state.lock().unwrap().write_log.extend_from_slice(b"F1\r3!\r");
        assert_eq!(mock.written_lines(), vec!["F1", "3!"]);
        mock.clear_written();
        assert!(mock.written_lines().is_empty());
    }

    #[tokio::test]
    async fn mock_failed_writes_keep_reads() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut mock = MockPort::new();
        mock.fail_writes();
        assert!(mock.write_all(b"I\r").await.is_err());
        assert!(mock.written_data().is_empty());

        mock.queue_line("C3");
        let mut buf = [0u8; 4];
        mock.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"C3\r\n");
        assert!(!mock.is_closed());
    }

    #[tokio::test]
    async fn probe_rejects_closed_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(probe(&format!("tcp://{addr}")).await.is_err());
    }

    #[tokio::test]
    async fn probe_accepts_listening_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        probe(&format!("tcp://{addr}")).await.unwrap();
    }
}
