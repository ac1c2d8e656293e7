//! # Module Handles and Drivers
//!
//! A [`ModuleHandle`] is the stable way to talk to one module in one
//! mainframe slot: it captures the port address and the module's identity at
//! bind time, then forwards messages through the shared connection. The
//! handle never owns the channel; it holds a clone of the connection handle,
//! so closing the connection invalidates every handle bound to it.
//!
//! On top of the handle sit small typed drivers for the modules this library
//! knows about:
//!
//! - [`Sim922`] - diode temperature monitor (excitation control, 4 channels)
//! - [`Sim970`] - quad voltmeter (display and message control)
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sim900::{Connection, LinkConfig, ModuleHandle, Port, Sim922};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = Connection::open("/dev/ttyUSB0", LinkConfig::default()).await?;
//!
//! let handle = ModuleHandle::bind(&conn, Port::new(1)?).await?;
//! println!("port 1 holds a {}", handle.identity());
//!
//! let thermometer = Sim922::from_handle(handle)?;
//! thermometer.set_excitation(2, true).await?;
//! assert!(thermometer.excitation_on(2).await?);
//! # Ok(())
//! # }
//! ```

use crate::error::{SimError, SimResult};
use crate::link::Connection;
use crate::protocol::{IdnRecord, Port};

/// Handle to the module installed at one mainframe port
///
/// Identity is resolved exactly once, at bind time; it is a snapshot, not a
/// subscription. Swapping the physical module afterwards requires a new
/// bind.
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    connection: Connection,
    port: Port,
    identity: String,
}

impl ModuleHandle {
    /// Bind to the module at `port`
    ///
    /// Issues an identification query through the port and caches the model
    /// field of the reply as this handle's identity.
    ///
    /// # Errors
    ///
    /// `SimError::Bind` when the port answers with nothing (no module
    /// present, or a simulated connection) or with a reply that has no model
    /// field.
    pub async fn bind(connection: &Connection, port: Port) -> SimResult<Self> {
        let reply = connection.query_port(port, "*IDN?", None).await?;
        if reply.trim().is_empty() {
            return Err(SimError::bind(
                port.number(),
                "no identification reply; is a module present?",
            ));
        }
        let identity = IdnRecord::extract_model(&reply)
            .map_err(|e| SimError::bind(port.number(), e.to_string()))?;

        Ok(Self {
            connection: connection.clone(),
            port,
            identity,
        })
    }

    /// The port this handle is bound to
    pub fn port(&self) -> Port {
        self.port
    }

    /// The module's model identity, resolved at bind time (e.g. `"SIM922"`)
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The connection this handle forwards through
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Forward a raw message to the module
    pub async fn write(&self, message: &str) -> SimResult<()> {
        self.connection.write_port(self.port, message).await
    }

    /// Read buffered output from the module
    pub async fn read(&self, nbytes: Option<usize>) -> SimResult<String> {
        self.connection.read_port(self.port, nbytes).await
    }

    /// Synchronized request/response through the module's port
    pub async fn query(&self, message: &str) -> SimResult<String> {
        self.connection.query_port(self.port, message, None).await
    }

    /// Bytes waiting in this port's input buffer
    pub async fn in_waiting(&self) -> SimResult<usize> {
        self.connection.in_waiting(self.port).await
    }

    /// Discard buffered-but-unread bytes for this port
    pub async fn flush(&self) -> SimResult<()> {
        self.connection.flush(Some(self.port)).await
    }
}

/// Validate a module channel number against [1, 4]
fn check_channel(channel: u8) -> SimResult<()> {
    if !(1..=4).contains(&channel) {
        return Err(SimError::config(format!(
            "channel {} out of range (must be 1-4)",
            channel
        )));
    }
    Ok(())
}

/// Parse a "0"/"1" boolean flag reply
fn parse_flag(field: &str) -> SimResult<bool> {
    match field.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(SimError::protocol(format!(
            "flag reply is not 0/1: {:?}",
            other
        ))),
    }
}

/// SIM922 diode temperature monitor
///
/// Four measurement channels, each with a switchable excitation current.
#[derive(Debug)]
pub struct Sim922 {
    handle: ModuleHandle,
}

impl Sim922 {
    /// Model identity this driver expects
    pub const MODEL: &'static str = "SIM922";

    /// Bind the module at `port` and wrap it in this driver
    pub async fn bind(connection: &Connection, port: Port) -> SimResult<Self> {
        Self::from_handle(ModuleHandle::bind(connection, port).await?)
    }

    /// Wrap an already-bound handle
    ///
    /// # Errors
    ///
    /// `SimError::Bind` when the handle's identity is not a SIM922.
    pub fn from_handle(handle: ModuleHandle) -> SimResult<Self> {
        if handle.identity() != Self::MODEL {
            return Err(SimError::bind(
                handle.port().number(),
                format!("expected {}, found {}", Self::MODEL, handle.identity()),
            ));
        }
        Ok(Self { handle })
    }

    /// The underlying module handle
    pub fn handle(&self) -> &ModuleHandle {
        &self.handle
    }

    /// Query whether one channel's excitation current is on (`EXON? <ch>`)
    pub async fn excitation_on(&self, channel: u8) -> SimResult<bool> {
        check_channel(channel)?;
        let reply = self.handle.query(&format!("EXON? {}", channel)).await?;
        parse_flag(&reply)
    }

    /// Query all four excitation states at once (`EXON? 0`)
    ///
    /// The module answers a comma-separated record with one flag per
    /// channel.
    pub async fn excitations(&self) -> SimResult<[bool; 4]> {
        let reply = self.handle.query("EXON? 0").await?;
        let fields: Vec<&str> = reply.trim().split(',').collect();
        if fields.len() != 4 {
            return Err(SimError::protocol(format!(
                "excitation record has {} fields, expected 4: {:?}",
                fields.len(),
                reply.trim()
            )));
        }
        Ok([
            parse_flag(fields[0])?,
            parse_flag(fields[1])?,
            parse_flag(fields[2])?,
            parse_flag(fields[3])?,
        ])
    }

    /// Switch one channel's excitation current (`EXON <ch>,<0|1>`)
    pub async fn set_excitation(&self, channel: u8, on: bool) -> SimResult<()> {
        check_channel(channel)?;
        self.handle
            .write(&format!("EXON {},{}", channel, if on { 1 } else { 0 }))
            .await
    }
}

/// SIM970 quad voltmeter
///
/// Display and message control for the module's four-line front panel.
pub struct Sim970 {
    handle: ModuleHandle,
}

impl Sim970 {
    /// Model identity this driver expects
    pub const MODEL: &'static str = "SIM970";

    /// Bind the module at `port` and wrap it in this driver
    pub async fn bind(connection: &Connection, port: Port) -> SimResult<Self> {
        Self::from_handle(ModuleHandle::bind(connection, port).await?)
    }

    /// Wrap an already-bound handle
    pub fn from_handle(handle: ModuleHandle) -> SimResult<Self> {
        if handle.identity() != Self::MODEL {
            return Err(SimError::bind(
                handle.port().number(),
                format!("expected {}, found {}", Self::MODEL, handle.identity()),
            ));
        }
        Ok(Self { handle })
    }

    /// The underlying module handle
    pub fn handle(&self) -> &ModuleHandle {
        &self.handle
    }

    /// Switch one display line on or off (`DISX <ch>,<0|1>`)
    pub async fn set_display(&self, channel: u8, on: bool) -> SimResult<()> {
        check_channel(channel)?;
        self.handle
            .write(&format!("DISX {},{}", channel, if on { 1 } else { 0 }))
            .await
    }

    /// Write a text message to one display line (`MESG <ch>,<text>`)
    pub async fn set_message(&self, channel: u8, text: &str) -> SimResult<()> {
        check_channel(channel)?;
        self.handle
            .write(&format!("MESG {},{}", channel, text))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_validation() {
        assert!(check_channel(1).is_ok());
        assert!(check_channel(4).is_ok());
        assert!(check_channel(0).is_err());
        assert!(check_channel(5).is_err());
    }

    #[test]
    fn test_flag_parsing() {
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag(" 1\r").unwrap());
        assert!(parse_flag("on").is_err());
        assert!(parse_flag("").is_err());
    }
}
