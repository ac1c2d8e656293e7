//! # SIM900 Error Handling
//!
//! This module provides comprehensive error handling for the SIM900 library,
//! covering transport failures, mainframe protocol desynchronization, module
//! binding problems and precondition violations.
//!
//! ## Overview
//!
//! The error system is designed so that every failure a caller can receive is
//! distinguishable by kind, not just by message text. All errors implement the
//! standard Rust error traits and carry enough context to diagnose a stuck
//! mainframe exchange.
//!
//! ## Error Categories
//!
//! ### Transport Errors
//! - **I/O Errors**: serial port read/write failures
//! - **Connection Unavailable**: the open attempt failed; the system falls
//!   back to simulation mode (a designed degraded mode, not a fatal error)
//! - **Connection Closed**: an operation was attempted through a connection
//!   that has been explicitly closed
//! - **Timeout Errors**: a transport call exceeded its configured deadline
//!
//! ### Protocol Errors
//! - **Protocol Errors**: the mainframe returned a reply the host cannot
//!   parse (most commonly a non-numeric `NINP?` byte count), which indicates
//!   the host and mainframe buffers are desynchronized
//! - **Bind Errors**: a port's identification query returned empty or
//!   malformed data at module bind time
//!
//! ### Precondition Errors
//! - **Invalid Port**: a port number outside [1, 8] was rejected before any
//!   bytes were transmitted
//! - **Configuration Errors**: unusable link configuration
//!
//! ## Error Recovery
//!
//! ```rust
//! use sim900::{SimError, SimResult};
//!
//! fn handle_error(result: SimResult<String>) {
//!     match result {
//!         Ok(reply) => println!("Reply: {}", reply),
//!         Err(error) => {
//!             if error.is_recoverable() {
//!                 println!("Retryable error: {}", error);
//!                 // Retry policy belongs to the caller, never to the core.
//!             } else {
//!                 println!("Fatal error: {}", error);
//!             }
//!         }
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for SIM900 operations
///
/// Convenience alias that uses `SimError` as the error type for all
/// mainframe operations, providing consistent error handling throughout the
/// codebase.
pub type SimResult<T> = Result<T, SimError>;

/// Comprehensive SIM900 error types
///
/// This enumeration covers all failure conditions that can occur while
/// talking to the mainframe, from transport-level issues to protocol
/// desynchronization and caller precondition violations.
#[derive(Error, Debug, Clone)]
pub enum SimError {
    /// I/O related errors (serial port)
    ///
    /// Covers low-level failures on the shared channel once it is open.
    ///
    /// # Examples
    /// - Serial port access denied mid-session
    /// - USB adapter unplugged
    #[error("I/O error: {message}")]
    Io { message: String },

    /// The transport could not be opened
    ///
    /// Raised by the open path only. The connection constructor recovers
    /// from this locally by entering simulation mode; it is surfaced so that
    /// callers who demand a physical link can detect the degraded state.
    #[error("Connection unavailable: {message}")]
    ConnectionUnavailable { message: String },

    /// Operation attempted through a closed connection
    ///
    /// Closing a connection invalidates every module handle bound to it.
    /// Subsequent operations fail with this error rather than silently
    /// behaving like the simulation fallback.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Timeout errors
    ///
    /// A transport call exceeded its configured deadline. Always propagated
    /// unmodified; the core never converts a timeout into an empty success
    /// and never retries on its own.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Protocol-level errors
    ///
    /// The mainframe returned a reply the host cannot interpret. The
    /// canonical case is a `NINP?` byte count that fails to parse as an
    /// integer, which means host and mainframe state have desynchronized.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Module bind failure
    ///
    /// The identification query issued at bind time returned empty or
    /// malformed data. Commonly: no module is physically present at that
    /// port, or the module is unresponsive.
    #[error("Bind failed on port {port}: {message}")]
    Bind { port: u8, message: String },

    /// Port number outside the valid range [1, 8]
    ///
    /// The mainframe's behavior for out-of-range ports is unspecified, so
    /// the core rejects them before transmission.
    #[error("Invalid port: {port} (must be 1-8)")]
    InvalidPort { port: u8 },

    /// Configuration errors
    ///
    /// Link configuration that prevents proper operation, e.g. a zero
    /// timeout.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SimError {
    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new connection-unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::ConnectionUnavailable {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    ///
    /// # Arguments
    ///
    /// * `operation` - Description of the operation that timed out
    /// * `timeout_ms` - Timeout duration in milliseconds
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new bind error for the given port
    pub fn bind<S: Into<String>>(port: u8, message: S) -> Self {
        Self::Bind {
            port,
            message: message.into(),
        }
    }

    /// Create an invalid-port error
    pub fn invalid_port(port: u8) -> Self {
        Self::InvalidPort { port }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (can retry)
    ///
    /// Determines whether an operation that failed with this error might
    /// succeed if retried. The core never retries on its own; this helps
    /// callers implement their own retry strategies.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sim900::SimError;
    ///
    /// let timeout_error = SimError::timeout("read port 3", 2000);
    /// assert!(timeout_error.is_recoverable());
    ///
    /// let invalid_port = SimError::invalid_port(9);
    /// assert!(!invalid_port.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::ConnectionUnavailable { .. }
        )
    }

    /// Check if the error is a transport issue
    ///
    /// Identifies errors related to the underlying shared channel rather
    /// than the mainframe protocol itself.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ConnectionUnavailable { .. }
                | Self::ConnectionClosed
                | Self::Timeout { .. }
        )
    }

    /// Check if the error is a connectivity failure
    ///
    /// Connectivity failures are the class the simulation fallback is
    /// guaranteed never to raise.
    pub fn is_connectivity_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ConnectionUnavailable { .. } | Self::ConnectionClosed
        )
    }

    /// Check if the error is a protocol issue
    ///
    /// Identifies errors caused by replies the host could not interpret,
    /// which usually indicates host/mainframe desynchronization.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::Bind { .. })
    }
}

/// Convert from std::io::Error
///
/// Automatically converts standard I/O errors to `SimError::Io`, preserving
/// the original error message for debugging.
impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Convert from tokio timeout errors
///
/// Converts Tokio's timeout errors to `SimError::Timeout` with a generic
/// timeout message (specific operation and duration should be provided when
/// creating timeout errors manually).
impl From<tokio::time::error::Elapsed> for SimError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("Operation timeout", 0)
    }
}

/// Convert from serde JSON errors
impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SimError::timeout("query port 2", 2000);
        assert!(err.is_recoverable());
        assert!(err.is_transport_error());
        assert!(!err.is_connectivity_error());

        let err = SimError::protocol("NINP? reply was 'garbage'");
        assert!(!err.is_recoverable());
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(SimError::io("port vanished").is_connectivity_error());
        assert!(SimError::unavailable("no such resource").is_connectivity_error());
        assert!(SimError::ConnectionClosed.is_connectivity_error());
        assert!(!SimError::invalid_port(0).is_connectivity_error());
    }

    #[test]
    fn test_error_display() {
        let err = SimError::bind(3, "empty identification reply");
        let msg = format!("{}", err);
        assert!(msg.contains("port 3"));
        assert!(msg.contains("empty identification reply"));

        let err = SimError::invalid_port(9);
        assert!(format!("{}", err).contains("must be 1-8"));
    }
}
