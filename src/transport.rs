//! # SIM900 Transport Layer
//!
//! This module provides the transport abstraction the mainframe link is
//! built on, plus the serial implementation used against real hardware.
//!
//! ## The Transport capability
//!
//! The core only requires `{write, read, close}` over ASCII lines. The
//! mainframe protocol has no acknowledgement framing and no length prefixes
//! on the wire, so the transport's job is deliberately small: move one
//! terminated ASCII line at a time and enforce the per-call deadline.
//!
//! ## Serial transport (`SerialTransport`)
//!
//! - Serial port communication (RS-232 via USB adapters)
//! - Line-terminated ASCII send/receive
//! - Configurable baud rate and per-call timeout
//! - Available-port enumeration for failed-open diagnostics
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sim900::transport::{SerialTransport, Transport};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = SerialTransport::open(
//!         "/dev/ttyUSB0",
//!         9600,
//!         Duration::from_millis(2000),
//!     )?;
//!
//!     transport.write("*IDN?").await?;
//!     let reply = transport.read().await?;
//!     println!("Mainframe: {}", reply);
//!
//!     let stats = transport.stats();
//!     println!("Writes sent: {}", stats.writes_sent);
//!
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transport Statistics
//!
//! ```rust,no_run
//! # use sim900::transport::{Transport, TransportStats};
//! # fn example(transport: &impl Transport) {
//! let stats = transport.stats();
//!
//! println!("Communication Statistics:");
//! println!("  Writes sent: {}", stats.writes_sent);
//! println!("  Replies received: {}", stats.replies_received);
//! println!("  Errors: {}", stats.errors);
//! println!("  Timeouts: {}", stats.timeouts);
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::info;

use crate::error::{SimError, SimResult};

/// Line terminator appended to outgoing commands
const TERMINATOR: u8 = b'\n';

/// Upper bound on a single reply line; anything longer means the channel is
/// streaming garbage rather than a mainframe reply
const MAX_REPLY_LEN: usize = 4096;

/// Render a line for trace output, escaping non-printable bytes
fn printable(line: &str) -> String {
    line.chars()
        .flat_map(|c| c.escape_default())
        .collect::<String>()
}

/// Log one line with direction for debugging
fn log_line(direction: &str, line: &str) {
    info!("[SIM900] {} {}", direction, printable(line));
}

/// Transport capability consumed by the mainframe link
///
/// This trait defines the minimal interface the core requires from the
/// physical channel. The mainframe link never touches serial details; it
/// only writes command lines and reads reply lines through this trait, which
/// also makes the whole protocol layer testable against a mock.
///
/// ## Thread Safety
///
/// All implementations must be `Send + Sync`; the link serializes access
/// itself, so implementations do not need internal locking.
///
/// ## Error Handling
///
/// All methods return `SimResult<T>`. Deadline expiry must surface as
/// `SimError::Timeout` and must never be converted into an empty success.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one ASCII command line (terminator handled by the transport)
    async fn write(&mut self, message: &str) -> SimResult<()>;

    /// Receive one ASCII reply line, trimmed of its terminator
    ///
    /// # Errors
    ///
    /// - `SimError::Timeout` - no complete line arrived within the deadline
    /// - `SimError::Io` - the channel failed mid-read
    async fn read(&mut self) -> SimResult<String>;

    /// Close the channel and release the resource
    ///
    /// After calling this method the transport must not be used for further
    /// communication.
    async fn close(&mut self) -> SimResult<()>;

    /// Check if the transport believes it holds an open channel
    ///
    /// This is a local check; it does not verify the remote device is
    /// responsive.
    fn is_connected(&self) -> bool;

    /// Get communication statistics
    fn stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub writes_sent: u64,
    pub replies_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Serial transport implementation
///
/// Wraps a `tokio_serial::SerialStream` and enforces the per-call deadline
/// on both writes and reads. The mainframe is half-duplex and host-polled,
/// so there is exactly one outstanding line in either direction at a time.
pub struct SerialTransport {
    /// Serial port connection
    port: Option<tokio_serial::SerialStream>,
    /// Resource name/path the port was opened from
    resource: String,
    /// Baud rate
    baud_rate: u32,
    /// Per-call deadline for writes and reads
    timeout: Duration,
    /// Transport statistics
    stats: TransportStats,
    /// Enable line logging for debugging
    line_logging: bool,
}

impl SerialTransport {
    /// Open a serial transport on the given resource
    ///
    /// # Arguments
    ///
    /// * `resource` - Serial port path (e.g., "/dev/ttyUSB0" or "COM4")
    /// * `baud_rate` - Communication speed (the SIM900 ships at 9600)
    /// * `timeout` - Per-call deadline for every write and read
    ///
    /// # Errors
    ///
    /// Returns `SimError::ConnectionUnavailable` when the port cannot be
    /// opened; callers are expected to fall back to simulation mode.
    pub fn open(resource: &str, baud_rate: u32, timeout: Duration) -> SimResult<Self> {
        let mut transport = Self {
            port: None,
            resource: resource.to_string(),
            baud_rate,
            timeout,
            stats: TransportStats::default(),
            line_logging: false,
        };

        transport.connect()?;

        Ok(transport)
    }

    /// Enable or disable line logging
    pub fn set_line_logging(&mut self, enabled: bool) {
        self.line_logging = enabled;
    }

    /// The resource name this transport was opened on
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Connect to the serial port
    fn connect(&mut self) -> SimResult<()> {
        let builder = tokio_serial::new(&self.resource, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(self.timeout);

        let port = tokio_serial::SerialStream::open(&builder).map_err(|e| {
            SimError::unavailable(format!(
                "Failed to open serial port {}: {}",
                self.resource, e
            ))
        })?;

        self.port = Some(port);

        Ok(())
    }

    /// List serial resources visible on this host
    ///
    /// Used to print alternatives when an open attempt fails, so a user can
    /// spot a renamed adapter without external tooling.
    pub fn available_resources() -> Vec<String> {
        tokio_serial::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default()
    }

    /// Read bytes until the terminator, bounded by `MAX_REPLY_LEN`
    async fn read_until_terminator(&mut self) -> SimResult<String> {
        let port = self
            .port
            .as_mut()
            .ok_or(SimError::ConnectionClosed)?;

        let mut line = Vec::new();
        let mut buffer = [0u8; 1];

        loop {
            match port.read_exact(&mut buffer).await {
                Ok(_) => {
                    if buffer[0] == TERMINATOR {
                        break;
                    }
                    line.push(buffer[0]);

                    if line.len() > MAX_REPLY_LEN {
                        return Err(SimError::protocol("reply line too large"));
                    }
                }
                Err(e) => {
                    return Err(SimError::io(format!("Serial read error: {}", e)));
                }
            }
        }

        Ok(String::from_utf8_lossy(&line)
            .trim_end_matches('\r')
            .to_string())
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, message: &str) -> SimResult<()> {
        let port = self
            .port
            .as_mut()
            .ok_or(SimError::ConnectionClosed)?;

        let mut frame = message.as_bytes().to_vec();
        frame.push(TERMINATOR);

        let send_result = timeout(self.timeout, port.write_all(&frame)).await;
        match send_result {
            Ok(Ok(_)) => {
                let _ = timeout(self.timeout, port.flush()).await;
            }
            Ok(Err(e)) => {
                self.stats.errors += 1;
                return Err(SimError::io(format!("Failed to send command: {}", e)));
            }
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                return Err(SimError::timeout(
                    "send command",
                    self.timeout.as_millis() as u64,
                ));
            }
        }

        self.stats.writes_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        if self.line_logging {
            log_line("send", message);
        }

        Ok(())
    }

    async fn read(&mut self) -> SimResult<String> {
        let deadline = self.timeout;

        let line = match timeout(deadline, self.read_until_terminator()).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                self.stats.errors += 1;
                return Err(e);
            }
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                return Err(SimError::timeout(
                    "read reply",
                    deadline.as_millis() as u64,
                ));
            }
        };

        self.stats.replies_received += 1;
        self.stats.bytes_received += line.len() as u64;

        if self.line_logging {
            log_line("receive", &line);
        }

        Ok(line)
    }

    async fn close(&mut self) -> SimResult<()> {
        if let Some(_port) = self.port.take() {
            // SerialStream doesn't need explicit close, it will be dropped
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
