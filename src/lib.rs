//! # SIM900 - SRS Instrument Mainframe Communication Library
//!
//! An async communication library for the Stanford Research Systems SIM900
//! instrument mainframe: eight module slots multiplexed over one shared
//! serial channel, with port-addressed command framing, explicit flush
//! discipline, settle-delay synchronization, module discovery and typed
//! module drivers.
//!
//! ## Features
//!
//! - **🔌 Port-Addressed Framing**: `SNDT`/`RAWN?`/`NINP?` command framing
//!   for all eight mainframe ports
//! - **🧹 Flush Discipline**: configurable pre-query flushing keeps stale
//!   bytes out of every exchange
//! - **⏱️ Settle-Delay Synchronization**: fixed, tunable write-to-read delay
//!   instead of fragile reply polling loops
//! - **🔍 Port Scanning**: one-pass discovery of which slots hold modules
//! - **🧪 Simulation Fallback**: no hardware attached means neutral values,
//!   not crashes; the whole application stack keeps running
//! - **📊 Built-in Monitoring**: transport statistics and exchange metrics
//! - **🛡️ Memory Safe**: pure Rust, no unsafe code
//!
//! ## Command Vocabulary
//!
//! | Command | Meaning | Reply |
//! |---------|---------|-------|
//! | `*IDN?` | Identify the mainframe | identification record |
//! | `FLSH` | Flush all mainframe buffers | none |
//! | `FLSI [<port>]` | Flush one port's input buffer (or all) | none |
//! | `SNDT <port>,'<msg>'` | Forward a message to a module | none (module output buffers) |
//! | `NINP? <port>` | Bytes waiting in a port buffer | integer |
//! | `RAWN? <port>,<n>` | Read exactly n buffered bytes | the bytes |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sim900::{Connection, LinkConfig, Port, Sim922};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Opens the serial resource, or falls back to simulation mode when
//!     // no hardware is attached.
//!     let conn = Connection::open("/dev/ttyUSB0", LinkConfig::default()).await?;
//!
//!     // Which slots hold modules?
//!     let scan = conn.scan_ports().await?;
//!     print!("{}", scan);
//!
//!     // Talk to the thermometer in slot 1.
//!     let thermometer = Sim922::bind(&conn, Port::new(1)?).await?;
//!     thermometer.set_excitation(2, true).await?;
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │      Application / Module Drivers    │
//! │          (Sim922, Sim970)            │
//! └──────────────────────────────────────┘
//!                    │
//! ┌──────────────────────────────────────┐
//! │    ModuleHandle (port + identity)    │
//! └──────────────────────────────────────┘
//!                    │
//! ┌──────────────────────────────────────┐
//! │  Connection (mutex, one in-flight    │
//! │  exchange; simulation fallback)      │
//! └──────────────────────────────────────┘
//!                    │
//! ┌──────────────────────────────────────┐
//! │  MainframeLink (framing, flush       │
//! │  discipline, settle delay)           │
//! └──────────────────────────────────────┘
//!                    │
//! ┌──────────────────────────────────────┐
//! │  Transport (serial, line-terminated  │
//! │  ASCII, per-call deadline)           │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! The channel is physically shared and half-duplex, so the connection
//! serializes every operation behind one async mutex: at most one
//! write/settle/read cycle is in flight per connection, regardless of port.
//! Every query blocks for at least one settle delay. There is no automatic
//! retry anywhere in the library; retry policy belongs to the caller.

/// Core error types and result handling
pub mod error;

/// Mainframe command vocabulary, port addresses and reply parsing
pub mod protocol;

/// Transport layer for serial communication
pub mod transport;

/// Mainframe link, connection handle and simulation fallback
pub mod link;

/// One-pass port discovery
pub mod scanner;

/// Module handles and typed module drivers
pub mod module;

/// Utility functions and performance monitoring
pub mod utils;

/// Callback logging for mainframe traffic
pub mod logging;

// Re-export main types for convenience
pub use error::{SimError, SimResult};
pub use protocol::{Command, IdnRecord, Port};
pub use transport::{SerialTransport, Transport, TransportStats};
pub use link::{
    Connection, FlushPolicy, LinkConfig, MainframeLink, OpenOutcome, SerialLink, SimulatedLink,
};
pub use scanner::{scan_ports, PortScan, PortStatus};
pub use module::{ModuleHandle, Sim922, Sim970};
pub use utils::{OperationTimer, PerformanceMetrics};
pub use logging::{CallbackLogger, LogCallback, LogLevel, LoggingMode};

/// Lowest valid mainframe port number
pub const PORT_MIN: u8 = 1;

/// Highest valid mainframe port number
pub const PORT_MAX: u8 = 8;

/// Number of module slots on the mainframe
pub const NUM_PORTS: usize = 8;

/// Default per-call transport deadline (2 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default write-to-read settle delay (300 ms)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 300;

/// Default settle delay used by the port scanner (100 ms)
pub const DEFAULT_SCAN_SETTLE_MS: u64 = 100;

/// Maximum bytes one `RAWN?` request may ask for
pub const MAX_RAW_READ: usize = 4096;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "SIM900 v{} - SRS instrument mainframe communication library",
        VERSION
    )
}
