/// Mainframe link implementations
///
/// This module owns the hard part of the protocol: multiplexing a
/// byte-oriented, half-duplex, buffer-bearing channel among eight logical
/// peers, with a host interface that is polling-only (no interrupts, no
/// framed acknowledgements).
///
/// The key insight is that the only way to know a port's response is ready
/// is to wait a fixed settle delay and then poll the byte-count command. The
/// settle delay is a tunable constant, not a computed backoff: it trades
/// worst-case latency for implementation simplicity, accepting that a very
/// slow module may require the caller to retry at a higher layer.
///
/// The link is generic over the `Transport` capability, so the same
/// application logic runs against real serial hardware and against the mock
/// transports used in tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{SimError, SimResult};
use crate::logging::CallbackLogger;
use crate::protocol::{parse_byte_count, Command, Port};
use crate::transport::{SerialTransport, Transport, TransportStats};

/// Pre-query flush discipline
///
/// A port's buffer must not hold stale bytes from a prior, unconsumed
/// exchange when a fresh query is issued. Two policies satisfy this and the
/// deployment picks one explicitly:
///
/// - `Always`: unconditional pre-flush before every exchange. Simplest,
///   always correct, costs one extra round trip.
/// - `WhenPending`: flush only when `in_waiting(port) != 0`. Saves a round
///   trip on an already-empty port; the precondition check is race-free
///   because the protocol is strictly synchronous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlushPolicy {
    #[default]
    Always,
    WhenPending,
}

/// Link configuration
///
/// An explicit value passed at construction; there is no process-wide
/// mutable state. Defaults match the hardware's shipping configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Fixed wait between a write and the subsequent read (default 300 ms)
    pub settle_delay: Duration,
    /// Shorter wait used by the one-pass port scanner (default 100 ms)
    pub scan_settle: Duration,
    /// Per-transport-call deadline (default 2000 ms)
    pub timeout: Duration,
    /// Serial baud rate (default 9600)
    pub baud_rate: u32,
    /// Pre-query flush discipline (default `Always`)
    pub flush_policy: FlushPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(crate::DEFAULT_SETTLE_DELAY_MS),
            scan_settle: Duration::from_millis(crate::DEFAULT_SCAN_SETTLE_MS),
            timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
            baud_rate: 9600,
            flush_policy: FlushPolicy::Always,
        }
    }
}

impl LinkConfig {
    /// Validate the configuration
    pub fn validate(&self) -> SimResult<()> {
        if self.timeout.is_zero() {
            return Err(SimError::config("timeout must be nonzero"));
        }
        if self.baud_rate == 0 {
            return Err(SimError::config("baud rate must be nonzero"));
        }
        Ok(())
    }
}

/// Port-addressed operations against the mainframe
///
/// Implemented by the serial link and by the simulation fallback; module
/// handles, drivers and the port scanner are written purely against this
/// trait. Control flow is strictly synchronous: the caller must not issue a
/// second operation before the previous one returns, even for a different
/// port, because the channel is physically shared.
#[async_trait]
pub trait MainframeLink: Send + Sync {
    /// Frame `message` as `SNDT <port>,'<message>'` and forward it
    ///
    /// Side effect on the device: the target module begins producing a
    /// response that accumulates in the mainframe's per-port buffer.
    async fn write_port(&mut self, port: Port, message: &str) -> SimResult<()>;

    /// Query the number of bytes waiting in the port's input buffer
    ///
    /// # Errors
    ///
    /// `SimError::Protocol` when the reply is not a valid integer (the
    /// device returned garbage or the link is desynchronized).
    async fn in_waiting(&mut self, port: Port) -> SimResult<usize>;

    /// Read buffered bytes from a port
    ///
    /// When `nbytes` is `None`, the byte count is discovered with
    /// `in_waiting` first. Exactly `nbytes` bytes are requested with
    /// `RAWN?`; there is no implicit retry.
    async fn read_port(&mut self, port: Port, nbytes: Option<usize>) -> SimResult<String>;

    /// Mainframe-global write + settle delay + direct read (not
    /// port-addressed); used for top-level identification and global
    /// commands only
    async fn query(&mut self, message: &str) -> SimResult<String>;

    /// The principal synchronized request/response primitive:
    /// flush discipline + write + settle delay + read
    async fn query_port(
        &mut self,
        port: Port,
        message: &str,
        nbytes: Option<usize>,
    ) -> SimResult<String>;

    /// Discard buffered-but-unread bytes for one port, or all ports
    async fn flush(&mut self, port: Option<Port>) -> SimResult<()>;

    /// Flush all mainframe-level buffers (`FLSH`)
    async fn flush_all_buffers(&mut self) -> SimResult<()>;

    /// Close the underlying channel
    async fn close(&mut self) -> SimResult<()>;

    /// Check if the link holds an open channel
    fn is_connected(&self) -> bool;

    /// Get transport statistics
    fn stats(&self) -> TransportStats;
}

/// Mainframe link over any transport
///
/// Translates port-addressed operations into mainframe command frames and
/// manages the write/settle/read timing. One instance exclusively owns its
/// transport.
pub struct SerialLink<T: Transport> {
    transport: T,
    config: LinkConfig,
    logger: Option<CallbackLogger>,
}

impl<T: Transport> SerialLink<T> {
    /// Create a new link over the given transport
    pub fn new(transport: T, config: LinkConfig) -> Self {
        Self {
            transport,
            config,
            logger: None,
        }
    }

    /// Create a new link with callback logging
    pub fn with_logger(transport: T, config: LinkConfig, logger: CallbackLogger) -> Self {
        Self {
            transport,
            config,
            logger: Some(logger),
        }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The link configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Encode and send one command frame
    async fn send_command(&mut self, command: &Command) -> SimResult<()> {
        if let Some(ref logger) = self.logger {
            logger.log_command(command);
        }
        debug!("send_command {}", command);
        self.transport.write(&command.encode()).await
    }

    /// Wait the fixed settle delay between a write and the following read
    async fn settle(&self) {
        sleep(self.config.settle_delay).await;
    }

    /// Read one trimmed reply line from the host queue
    async fn read_reply(&mut self, port: Option<Port>) -> SimResult<String> {
        let reply = self.transport.read().await?;
        let reply = reply.trim().to_string();
        if let Some(ref logger) = self.logger {
            logger.log_response(port, &reply);
        }
        Ok(reply)
    }
}

#[async_trait]
impl<T: Transport + Send + Sync> MainframeLink for SerialLink<T> {
    async fn write_port(&mut self, port: Port, message: &str) -> SimResult<()> {
        crate::utils::validation::validate_message(message)?;
        self.send_command(&Command::Send {
            port,
            message: message.to_string(),
        })
        .await
    }

    async fn in_waiting(&mut self, port: Port) -> SimResult<usize> {
        self.send_command(&Command::BytesWaiting(port)).await?;
        self.settle().await;
        let reply = self.read_reply(Some(port)).await?;
        parse_byte_count(&reply)
    }

    async fn read_port(&mut self, port: Port, nbytes: Option<usize>) -> SimResult<String> {
        // Determine the number of bytes waiting in the port input buffer
        let nbytes = match nbytes {
            Some(n) => n,
            None => self.in_waiting(port).await?,
        };
        crate::utils::validation::validate_nbytes(nbytes)?;

        // Request exactly nbytes from the port
        self.send_command(&Command::RawRead { port, nbytes }).await?;

        // Wait for the bytes to arrive in the host queue
        self.settle().await;

        self.read_reply(Some(port)).await
    }

    async fn query(&mut self, message: &str) -> SimResult<String> {
        self.transport.write(message).await?;
        self.settle().await;
        self.read_reply(None).await
    }

    async fn query_port(
        &mut self,
        port: Port,
        message: &str,
        nbytes: Option<usize>,
    ) -> SimResult<String> {
        match self.config.flush_policy {
            FlushPolicy::Always => {
                self.flush(Some(port)).await?;
            }
            FlushPolicy::WhenPending => {
                // Race-free: the channel is strictly synchronous, so the
                // count cannot change between the check and the flush.
                if self.in_waiting(port).await? != 0 {
                    self.flush(Some(port)).await?;
                }
            }
        }

        self.write_port(port, message).await?;
        self.settle().await;
        self.read_port(port, nbytes).await
    }

    async fn flush(&mut self, port: Option<Port>) -> SimResult<()> {
        self.send_command(&Command::FlushInput(port)).await
    }

    async fn flush_all_buffers(&mut self) -> SimResult<()> {
        self.send_command(&Command::FlushBuffers).await
    }

    async fn close(&mut self) -> SimResult<()> {
        self.transport.close().await
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn stats(&self) -> TransportStats {
        self.transport.stats()
    }
}

/// Degenerate mainframe link used when no physical connection exists
///
/// Every operation returns a fixed neutral value (empty string for reads,
/// zero for byte counts) and never raises a connectivity error, so the rest
/// of the system keeps operating deterministically. Selected automatically
/// at connection-open time and never re-attempted; a caller must explicitly
/// open again to get a real link.
#[derive(Debug, Default)]
pub struct SimulatedLink {
    stats: TransportStats,
}

impl SimulatedLink {
    /// Create a new simulated link
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MainframeLink for SimulatedLink {
    async fn write_port(&mut self, _port: Port, _message: &str) -> SimResult<()> {
        Ok(())
    }

    async fn in_waiting(&mut self, _port: Port) -> SimResult<usize> {
        Ok(0)
    }

    async fn read_port(&mut self, _port: Port, _nbytes: Option<usize>) -> SimResult<String> {
        Ok(String::new())
    }

    async fn query(&mut self, _message: &str) -> SimResult<String> {
        Ok(String::new())
    }

    async fn query_port(
        &mut self,
        _port: Port,
        _message: &str,
        _nbytes: Option<usize>,
    ) -> SimResult<String> {
        Ok(String::new())
    }

    async fn flush(&mut self, _port: Option<Port>) -> SimResult<()> {
        Ok(())
    }

    async fn flush_all_buffers(&mut self) -> SimResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> SimResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

/// Open outcome of a connection attempt
///
/// A tagged result rather than a caught exception: callers must handle both
/// branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Physical link established; carries the mainframe identity reply
    Connected { identity: String },
    /// No physical link; all operations return neutral values
    Simulated,
}

/// Internal link state behind the connection mutex
enum LinkState {
    Open(Box<dyn MainframeLink>),
    Closed,
}

impl LinkState {
    fn link_mut(&mut self) -> SimResult<&mut dyn MainframeLink> {
        match self {
            LinkState::Open(link) => Ok(link.as_mut()),
            LinkState::Closed => Err(SimError::ConnectionClosed),
        }
    }
}

/// Shared handle to one mainframe connection
///
/// The connection exclusively owns the transport (through its link); module
/// handles hold cheap clones of this handle, never the transport itself.
/// A `tokio::sync::Mutex` serializes every operation, which is exactly the
/// protocol's requirement: at most one write/settle/read cycle in flight per
/// connection, regardless of which port it targets.
///
/// `close()` moves the link to a closed state; operations attempted through
/// any clone afterwards fail with `SimError::ConnectionClosed` rather than
/// silently behaving like the simulation fallback.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Mutex<LinkState>>,
    resource: String,
    outcome: OpenOutcome,
    config: LinkConfig,
    opened_at: Instant,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("resource", &self.resource)
            .field("outcome", &self.outcome)
            .field("config", &self.config)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection to the mainframe, falling back to simulation
    ///
    /// The open attempt and the initial identification probe can both fail
    /// without this function failing: connectivity problems are recovered
    /// locally into simulation mode, and the available serial resources are
    /// logged to aid diagnosis. Only an unusable configuration is an error.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sim900::{Connection, LinkConfig, OpenOutcome};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let conn = Connection::open("/dev/ttyUSB0", LinkConfig::default()).await?;
    /// match conn.outcome() {
    ///     OpenOutcome::Connected { identity } => println!("ID: {}", identity),
    ///     OpenOutcome::Simulated => println!("running in simulation mode"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(resource: &str, config: LinkConfig) -> SimResult<Self> {
        Self::open_inner(resource, config, None).await
    }

    /// Open a connection with callback logging on the link
    pub async fn open_with_logger(
        resource: &str,
        config: LinkConfig,
        logger: CallbackLogger,
    ) -> SimResult<Self> {
        Self::open_inner(resource, config, Some(logger)).await
    }

    /// Build a connection over an already-constructed link
    ///
    /// For callers that bring their own `MainframeLink` implementation (a
    /// custom transport wrapped in a [`SerialLink`], or a test fixture). No
    /// probe is performed; the caller supplies the identity, or `None` to
    /// mark the connection simulated.
    pub fn over(
        link: Box<dyn MainframeLink>,
        resource: &str,
        identity: Option<String>,
        config: LinkConfig,
    ) -> Self {
        let outcome = match identity {
            Some(identity) => OpenOutcome::Connected { identity },
            None => OpenOutcome::Simulated,
        };
        Self {
            inner: Arc::new(Mutex::new(LinkState::Open(link))),
            resource: resource.to_string(),
            outcome,
            config,
            opened_at: Instant::now(),
        }
    }

    async fn open_inner(
        resource: &str,
        config: LinkConfig,
        logger: Option<CallbackLogger>,
    ) -> SimResult<Self> {
        config.validate()?;

        let state = match SerialTransport::open(resource, config.baud_rate, config.timeout) {
            Ok(transport) => {
                let mut link = match logger {
                    Some(logger) => SerialLink::with_logger(transport, config.clone(), logger),
                    None => SerialLink::new(transport, config.clone()),
                };

                // Probe the device: flush stale data from every buffer,
                // then ask for the model identifier.
                match Self::probe(&mut link).await {
                    Ok(identity) => {
                        debug!("mainframe ID: {}", identity);
                        (
                            LinkState::Open(Box::new(link)),
                            OpenOutcome::Connected { identity },
                        )
                    }
                    Err(e) => {
                        warn!(
                            "mainframe did not reply to ID query ({}); entering simulation mode",
                            e
                        );
                        let _ = link.close().await;
                        (
                            LinkState::Open(Box::new(SimulatedLink::new())),
                            OpenOutcome::Simulated,
                        )
                    }
                }
            }
            Err(e) => {
                warn!("could not open {} ({}); entering simulation mode", resource, e);
                for name in SerialTransport::available_resources() {
                    warn!("available resource: {}", name);
                }
                (
                    LinkState::Open(Box::new(SimulatedLink::new())),
                    OpenOutcome::Simulated,
                )
            }
        };

        let (state, outcome) = state;
        Ok(Self {
            inner: Arc::new(Mutex::new(state)),
            resource: resource.to_string(),
            outcome,
            config,
            opened_at: Instant::now(),
        })
    }

    /// Flush all buffers and identify the device
    async fn probe(link: &mut SerialLink<SerialTransport>) -> SimResult<String> {
        link.flush_all_buffers().await?;
        let identity = link.query("*IDN?").await?;
        if identity.is_empty() {
            return Err(SimError::protocol("empty identification reply"));
        }
        Ok(identity)
    }

    /// The tagged result of the open attempt
    pub fn outcome(&self) -> &OpenOutcome {
        &self.outcome
    }

    /// The mainframe identity string, absent when simulated
    pub fn identity(&self) -> Option<&str> {
        match &self.outcome {
            OpenOutcome::Connected { identity } => Some(identity),
            OpenOutcome::Simulated => None,
        }
    }

    /// Check whether this connection runs in simulation mode
    pub fn is_simulated(&self) -> bool {
        matches!(self.outcome, OpenOutcome::Simulated)
    }

    /// The resource name the connection was opened on
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The link configuration in effect
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Time elapsed since the connection was opened
    ///
    /// Monotonic reference time for timestamping acquired samples.
    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Check whether the connection has been closed
    pub async fn is_closed(&self) -> bool {
        matches!(*self.inner.lock().await, LinkState::Closed)
    }

    /// Close the connection
    ///
    /// Invalidates every clone of this handle and every module handle bound
    /// to it: subsequent operations fail with `SimError::ConnectionClosed`.
    pub async fn close(&self) -> SimResult<()> {
        let mut state = self.inner.lock().await;
        if let Ok(link) = state.link_mut() {
            link.close().await?;
        }
        *state = LinkState::Closed;
        Ok(())
    }

    /// See [`MainframeLink::write_port`]
    pub async fn write_port(&self, port: Port, message: &str) -> SimResult<()> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.write_port(port, message).await
    }

    /// See [`MainframeLink::in_waiting`]
    pub async fn in_waiting(&self, port: Port) -> SimResult<usize> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.in_waiting(port).await
    }

    /// See [`MainframeLink::read_port`]
    pub async fn read_port(&self, port: Port, nbytes: Option<usize>) -> SimResult<String> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.read_port(port, nbytes).await
    }

    /// See [`MainframeLink::query`]
    pub async fn query(&self, message: &str) -> SimResult<String> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.query(message).await
    }

    /// See [`MainframeLink::query_port`]
    pub async fn query_port(
        &self,
        port: Port,
        message: &str,
        nbytes: Option<usize>,
    ) -> SimResult<String> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.query_port(port, message, nbytes).await
    }

    /// See [`MainframeLink::flush`]
    pub async fn flush(&self, port: Option<Port>) -> SimResult<()> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.flush(port).await
    }

    /// See [`MainframeLink::flush_all_buffers`]
    pub async fn flush_all_buffers(&self) -> SimResult<()> {
        let mut state = self.inner.lock().await;
        state.link_mut()?.flush_all_buffers().await
    }

    /// Scan all eight ports for connected modules
    ///
    /// Diagnostic one-pass discovery; see [`crate::scanner::scan_ports`].
    pub async fn scan_ports(&self) -> SimResult<crate::scanner::PortScan> {
        let scan_settle = self.config.scan_settle;
        let mut state = self.inner.lock().await;
        crate::scanner::scan_ports(state.link_mut()?, scan_settle).await
    }

    /// Transport statistics for this connection
    pub async fn stats(&self) -> TransportStats {
        let mut state = self.inner.lock().await;
        match state.link_mut() {
            Ok(link) => link.stats(),
            Err(_) => TransportStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted transport: replays queued replies, records every line sent
    struct ScriptedTransport {
        sent: Vec<String>,
        replies: std::collections::VecDeque<SimResult<String>>,
        connected: bool,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<SimResult<String>>) -> Self {
            Self {
                sent: Vec::new(),
                replies: replies.into(),
                connected: true,
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn write(&mut self, message: &str) -> SimResult<()> {
            self.sent.push(message.to_string());
            Ok(())
        }

        async fn read(&mut self) -> SimResult<String> {
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(SimError::timeout("read reply", 0)))
        }

        async fn close(&mut self) -> SimResult<()> {
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn stats(&self) -> TransportStats {
            TransportStats::default()
        }
    }

    fn fast_config() -> LinkConfig {
        LinkConfig {
            settle_delay: Duration::from_millis(1),
            scan_settle: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
            ..LinkConfig::default()
        }
    }

    #[tokio::test]
    async fn test_in_waiting_parses_count() {
        let transport = ScriptedTransport::new(vec![Ok("17".to_string())]);
        let mut link = SerialLink::new(transport, fast_config());
        let port = Port::new(3).unwrap();

        assert_eq!(link.in_waiting(port).await.unwrap(), 17);
        assert_eq!(link.transport().sent, vec!["NINP? 3"]);
    }

    #[tokio::test]
    async fn test_in_waiting_garbage_is_protocol_error() {
        let transport = ScriptedTransport::new(vec![Ok("not-a-number".to_string())]);
        let mut link = SerialLink::new(transport, fast_config());
        let port = Port::new(1).unwrap();

        let err = link.in_waiting(port).await.unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[tokio::test]
    async fn test_read_port_discovers_byte_count() {
        // NINP? answers 5, then RAWN? answers the payload.
        let transport = ScriptedTransport::new(vec![
            Ok("5".to_string()),
            Ok("HELLO".to_string()),
        ]);
        let mut link = SerialLink::new(transport, fast_config());
        let port = Port::new(2).unwrap();

        let reply = link.read_port(port, None).await.unwrap();
        assert_eq!(reply, "HELLO");
        assert_eq!(link.transport().sent, vec!["NINP? 2", "RAWN? 2,5"]);
    }

    #[tokio::test]
    async fn test_read_port_explicit_nbytes_skips_count_query() {
        let transport = ScriptedTransport::new(vec![Ok("ABCD".to_string())]);
        let mut link = SerialLink::new(transport, fast_config());
        let port = Port::new(7).unwrap();

        let reply = link.read_port(port, Some(4)).await.unwrap();
        assert_eq!(reply, "ABCD");
        assert_eq!(link.transport().sent, vec!["RAWN? 7,4"]);
    }

    #[tokio::test]
    async fn test_query_port_flush_always() {
        let transport = ScriptedTransport::new(vec![
            Ok("6".to_string()),       // NINP? after the send
            Ok("REPLY!".to_string()),  // RAWN? payload
        ]);
        let mut link = SerialLink::new(transport, fast_config());
        let port = Port::new(4).unwrap();

        let reply = link.query_port(port, "*IDN?", None).await.unwrap();
        assert_eq!(reply, "REPLY!");
        assert_eq!(
            link.transport().sent,
            vec!["FLSI 4", "SNDT 4,'*IDN?'", "NINP? 4", "RAWN? 4,6"]
        );
    }

    #[tokio::test]
    async fn test_query_port_flush_when_pending_skips_clean_port() {
        let config = LinkConfig {
            flush_policy: FlushPolicy::WhenPending,
            ..fast_config()
        };
        let transport = ScriptedTransport::new(vec![
            Ok("0".to_string()),      // precondition check: empty, no flush
            Ok("4".to_string()),      // NINP? after the send
            Ok("DATA".to_string()),   // RAWN? payload
        ]);
        let mut link = SerialLink::new(transport, config);
        let port = Port::new(5).unwrap();

        let reply = link.query_port(port, "VOLT? 1", None).await.unwrap();
        assert_eq!(reply, "DATA");
        assert_eq!(
            link.transport().sent,
            vec!["NINP? 5", "SNDT 5,'VOLT? 1'", "NINP? 5", "RAWN? 5,4"]
        );
    }

    #[tokio::test]
    async fn test_query_port_flush_when_pending_flushes_dirty_port() {
        let config = LinkConfig {
            flush_policy: FlushPolicy::WhenPending,
            ..fast_config()
        };
        let transport = ScriptedTransport::new(vec![
            Ok("12".to_string()),     // stale bytes present
            Ok("4".to_string()),
            Ok("DATA".to_string()),
        ]);
        let mut link = SerialLink::new(transport, config);
        let port = Port::new(5).unwrap();

        link.query_port(port, "VOLT? 1", None).await.unwrap();
        assert_eq!(
            link.transport().sent,
            vec!["NINP? 5", "FLSI 5", "SNDT 5,'VOLT? 1'", "NINP? 5", "RAWN? 5,4"]
        );
    }

    #[tokio::test]
    async fn test_timeout_propagates_unmodified() {
        let transport =
            ScriptedTransport::new(vec![Err(SimError::timeout("read reply", 2000))]);
        let mut link = SerialLink::new(transport, fast_config());
        let port = Port::new(1).unwrap();

        let err = link.in_waiting(port).await.unwrap_err();
        assert!(matches!(
            err,
            SimError::Timeout {
                timeout_ms: 2000,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_simulated_link_neutral_values() {
        let mut link = SimulatedLink::new();
        let port = Port::new(8).unwrap();

        assert_eq!(link.in_waiting(port).await.unwrap(), 0);
        assert_eq!(link.read_port(port, None).await.unwrap(), "");
        assert_eq!(link.query("*IDN?").await.unwrap(), "");
        assert_eq!(link.query_port(port, "*IDN?", None).await.unwrap(), "");
        assert!(link.write_port(port, "EXON 1,1").await.is_ok());
        assert!(link.flush(None).await.is_ok());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_open_missing_resource_falls_back_to_simulation() {
        let conn = Connection::open("/dev/definitely-not-a-sim900", fast_config())
            .await
            .unwrap();

        assert!(conn.is_simulated());
        assert_eq!(conn.identity(), None);
        assert_eq!(*conn.outcome(), OpenOutcome::Simulated);

        // Simulation still answers every operation with neutral values.
        let port = Port::new(1).unwrap();
        assert_eq!(conn.in_waiting(port).await.unwrap(), 0);
        assert_eq!(conn.query_port(port, "*IDN?", None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_operations() {
        let conn = Connection::open("/dev/definitely-not-a-sim900", fast_config())
            .await
            .unwrap();
        let clone = conn.clone();

        conn.close().await.unwrap();
        assert!(conn.is_closed().await);

        let port = Port::new(1).unwrap();
        let err = clone.query_port(port, "*IDN?", None).await.unwrap_err();
        assert!(matches!(err, SimError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_zero_timeout_is_config_error() {
        let config = LinkConfig {
            timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        let err = Connection::open("/dev/null", config).await.unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }
}
