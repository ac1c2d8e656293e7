/// SIM900 protocol definitions and data structures
///
/// This module contains the mainframe command vocabulary, the validated
/// port address type, and the reply-parsing rules (byte counts and
/// identification records).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SimError, SimResult};

/// Module slot address on the mainframe, validated to [1, 8]
///
/// The mainframe's behavior for out-of-range port numbers is unspecified,
/// so construction is the single place addresses are checked; everything
/// downstream can trust a `Port` without re-validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u8);

impl Port {
    /// Create a validated port address
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidPort` when `number` is outside [1, 8].
    pub fn new(number: u8) -> SimResult<Self> {
        if !(crate::PORT_MIN..=crate::PORT_MAX).contains(&number) {
            return Err(SimError::invalid_port(number));
        }
        Ok(Self(number))
    }

    /// Get the raw port number (1-8)
    pub fn number(self) -> u8 {
        self.0
    }

    /// Iterate over all eight port addresses in order
    pub fn all() -> impl Iterator<Item = Port> {
        (crate::PORT_MIN..=crate::PORT_MAX).map(Port)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Port {
    type Error = SimError;

    fn try_from(value: u8) -> SimResult<Self> {
        Port::new(value)
    }
}

/// Mainframe command frames
///
/// Each variant encodes to one ASCII command line; the terminator is the
/// transport's concern. Pass-through commands (`Send`) carry the module
/// message quoted, as the mainframe expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `*IDN?` - identify the mainframe itself
    Identify,
    /// `FLSH` - flush all mainframe-level buffers
    FlushBuffers,
    /// `FLSI` / `FLSI <port>` - flush the input buffer of one port, or all
    FlushInput(Option<Port>),
    /// `SNDT <port>,'<msg>'` - send a message to the module at a port
    Send { port: Port, message: String },
    /// `RAWN? <port>,<nbytes>` - request exactly `nbytes` buffered bytes
    RawRead { port: Port, nbytes: usize },
    /// `NINP? <port>` - query the number of bytes waiting in a port buffer
    BytesWaiting(Port),
}

impl Command {
    /// Encode the command as its ASCII wire form (no terminator)
    pub fn encode(&self) -> String {
        match self {
            Command::Identify => "*IDN?".to_string(),
            Command::FlushBuffers => "FLSH".to_string(),
            Command::FlushInput(None) => "FLSI".to_string(),
            Command::FlushInput(Some(port)) => format!("FLSI {}", port),
            Command::Send { port, message } => format!("SNDT {},'{}'", port, message),
            Command::RawRead { port, nbytes } => format!("RAWN? {},{}", port, nbytes),
            Command::BytesWaiting(port) => format!("NINP? {}", port),
        }
    }

    /// Check if this command produces a reply in the host queue
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Command::Identify | Command::RawRead { .. } | Command::BytesWaiting(_)
        )
    }

    /// The port this command addresses, if any
    pub fn port(&self) -> Option<Port> {
        match self {
            Command::Identify | Command::FlushBuffers => None,
            Command::FlushInput(port) => *port,
            Command::Send { port, .. } => Some(*port),
            Command::RawRead { port, .. } => Some(*port),
            Command::BytesWaiting(port) => Some(*port),
        }
    }

    /// Human-readable command verb, used by the interpreted logging mode
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Identify => "Identify",
            Command::FlushBuffers => "Flush Buffers",
            Command::FlushInput(_) => "Flush Input",
            Command::Send { .. } => "Send To Port",
            Command::RawRead { .. } => "Raw Read",
            Command::BytesWaiting(_) => "Bytes Waiting",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Parse a `NINP?` byte-count reply
///
/// A reply that does not parse as a non-negative integer means the host and
/// mainframe have desynchronized (the count was answered by stale bytes from
/// an earlier, unconsumed exchange).
pub fn parse_byte_count(reply: &str) -> SimResult<usize> {
    let trimmed = reply.trim();
    trimmed.parse::<usize>().map_err(|_| {
        SimError::protocol(format!(
            "byte-count reply is not a valid integer: {:?}",
            trimmed
        ))
    })
}

/// Identification record returned by `*IDN?`
///
/// Replies are comma-delimited `manufacturer,model,serial,firmware` records.
/// The model field is what the rest of the library treats as a module's
/// identity. Parsing is by field, never by fixed offset, and fails
/// explicitly when the reply is shorter than expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdnRecord {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl IdnRecord {
    /// Parse an identification reply
    ///
    /// Requires at least the manufacturer and model fields; serial and
    /// firmware are optional trailing fields and default to empty.
    pub fn parse(reply: &str) -> SimResult<Self> {
        let fields: Vec<&str> = reply.trim().split(',').map(str::trim).collect();
        if fields.len() < 2 || fields[1].is_empty() {
            return Err(SimError::protocol(format!(
                "identification reply has no model field: {:?}",
                reply.trim()
            )));
        }
        Ok(Self {
            manufacturer: fields[0].to_string(),
            model: fields[1].to_string(),
            serial: fields.get(2).copied().unwrap_or_default().to_string(),
            firmware: fields.get(3).copied().unwrap_or_default().to_string(),
        })
    }

    /// Extract only the model field from an identification reply
    pub fn extract_model(reply: &str) -> SimResult<String> {
        Ok(Self::parse(reply)?.model)
    }
}

impl fmt::Display for IdnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (s/n {}, fw {})",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation() {
        assert!(Port::new(1).is_ok());
        assert!(Port::new(8).is_ok());
        assert!(matches!(
            Port::new(0),
            Err(SimError::InvalidPort { port: 0 })
        ));
        assert!(matches!(
            Port::new(9),
            Err(SimError::InvalidPort { port: 9 })
        ));
        assert_eq!(Port::all().count(), 8);
    }

    #[test]
    fn test_command_encoding() {
        let p3 = Port::new(3).unwrap();
        assert_eq!(Command::Identify.encode(), "*IDN?");
        assert_eq!(Command::FlushBuffers.encode(), "FLSH");
        assert_eq!(Command::FlushInput(None).encode(), "FLSI");
        assert_eq!(Command::FlushInput(Some(p3)).encode(), "FLSI 3");
        assert_eq!(
            Command::Send {
                port: p3,
                message: "*IDN?".to_string()
            }
            .encode(),
            "SNDT 3,'*IDN?'"
        );
        assert_eq!(
            Command::RawRead {
                port: p3,
                nbytes: 40
            }
            .encode(),
            "RAWN? 3,40"
        );
        assert_eq!(Command::BytesWaiting(p3).encode(), "NINP? 3");
    }

    #[test]
    fn test_command_classification() {
        let p1 = Port::new(1).unwrap();
        assert!(Command::Identify.expects_reply());
        assert!(Command::BytesWaiting(p1).expects_reply());
        assert!(!Command::FlushBuffers.expects_reply());
        assert!(!Command::Send {
            port: p1,
            message: "EXON 1,1".to_string()
        }
        .expects_reply());

        assert_eq!(Command::BytesWaiting(p1).port(), Some(p1));
        assert_eq!(Command::Identify.port(), None);
    }

    #[test]
    fn test_byte_count_parsing() {
        assert_eq!(parse_byte_count("0").unwrap(), 0);
        assert_eq!(parse_byte_count(" 40\r\n").unwrap(), 40);
        assert!(parse_byte_count("garbage").is_err());
        assert!(parse_byte_count("-3").is_err());
        assert!(parse_byte_count("").is_err());
    }

    #[test]
    fn test_idn_parsing() {
        let record =
            IdnRecord::parse("Stanford_Research_Systems,SIM922,s/n105794,ver3.6").unwrap();
        assert_eq!(record.manufacturer, "Stanford_Research_Systems");
        assert_eq!(record.model, "SIM922");
        assert_eq!(record.serial, "s/n105794");
        assert_eq!(record.firmware, "ver3.6");

        // Model extraction is positional on comma fields, never a fixed
        // character offset.
        assert_eq!(
            IdnRecord::extract_model("Stanford_Research_Systems,SIM970,s/n2210,ver2.1").unwrap(),
            "SIM970"
        );

        // Short or empty replies fail explicitly.
        assert!(IdnRecord::parse("").is_err());
        assert!(IdnRecord::parse("no_commas_here").is_err());
        assert!(IdnRecord::parse("vendor,").is_err());

        // Two fields are enough.
        let record = IdnRecord::parse("SRS,SIM900").unwrap();
        assert_eq!(record.model, "SIM900");
        assert_eq!(record.serial, "");
    }
}
