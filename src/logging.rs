//! # Callback Logging
//!
//! Pluggable logging for mainframe traffic. The link emits one log event per
//! command sent and per reply received; where those events go is the
//! caller's choice, injected as a callback. The default console logger
//! timestamps each event; a custom callback can forward events into a GUI
//! console, a ring buffer, or a test collector.
//!
//! Two rendering modes are supported:
//!
//! - **Raw**: the exact wire line, hex-encoded, for byte-level debugging of
//!   a desynchronized channel
//! - **Interpreted**: the command verb and its arguments, for reading a
//!   session transcript
//!
//! ## Usage Example
//!
//! ```rust
//! use sim900::logging::{CallbackLogger, LogLevel, LoggingMode};
//! use sim900::console_logger;
//!
//! // Timestamped stdout logging of interpreted traffic
//! let logger = console_logger!(LogLevel::Debug, LoggingMode::Interpreted);
//!
//! // Custom sink
//! let custom = CallbackLogger::new(
//!     |level, message| println!("[{:?}] {}", level, message),
//!     LogLevel::Info,
//!     LoggingMode::Both,
//! );
//! # let _ = (logger, custom);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::protocol::{Command, Port};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Trace => write!(f, "TRACE"),
        }
    }
}

/// Traffic rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Hex-encoded wire lines only
    Raw,
    /// Decoded command verbs and arguments only
    Interpreted,
    /// Both renderings per event
    Both,
}

/// Log event callback signature
pub type LogCallback = Arc<dyn Fn(LogLevel, String) + Send + Sync>;

/// Traffic logger with a pluggable sink
#[derive(Clone)]
pub struct CallbackLogger {
    callback: LogCallback,
    level: LogLevel,
    mode: LoggingMode,
    enabled: bool,
}

impl CallbackLogger {
    /// Create a logger with a custom callback
    pub fn new<F>(callback: F, level: LogLevel, mode: LoggingMode) -> Self
    where
        F: Fn(LogLevel, String) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            level,
            mode,
            enabled: true,
        }
    }

    /// Create a timestamped stdout logger
    pub fn console(level: LogLevel, mode: LoggingMode) -> Self {
        Self::new(
            |log_level, message| {
                let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
                println!("[{}] {} - {}", timestamp, log_level, message);
            },
            level,
            mode,
        )
    }

    /// Create a logger that drops every event
    pub fn disabled() -> Self {
        Self {
            callback: Arc::new(|_, _| {}),
            level: LogLevel::Error,
            mode: LoggingMode::Interpreted,
            enabled: false,
        }
    }

    /// Enable or disable the logger
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Change the minimum level
    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    /// Change the rendering mode
    pub fn set_mode(&mut self, mode: LoggingMode) {
        self.mode = mode;
    }

    fn should_log(&self, level: LogLevel) -> bool {
        self.enabled && level <= self.level
    }

    fn emit(&self, level: LogLevel, message: String) {
        if self.should_log(level) {
            (self.callback)(level, message);
        }
    }

    /// Log one outgoing command frame
    pub fn log_command(&self, command: &Command) {
        if !self.should_log(LogLevel::Debug) {
            return;
        }

        if matches!(self.mode, LoggingMode::Raw | LoggingMode::Both) {
            let wire = command.encode();
            self.emit(
                LogLevel::Debug,
                format!("SIM900 Send (raw): {}", hex::encode(wire.as_bytes())),
            );
        }

        if matches!(self.mode, LoggingMode::Interpreted | LoggingMode::Both) {
            self.emit(LogLevel::Debug, format!("SIM900 Send: {}", interpret(command)));
        }
    }

    /// Log one incoming reply line
    pub fn log_response(&self, port: Option<Port>, reply: &str) {
        if !self.should_log(LogLevel::Debug) {
            return;
        }

        let source = match port {
            Some(port) => format!("port {}", port),
            None => "mainframe".to_string(),
        };

        if matches!(self.mode, LoggingMode::Raw | LoggingMode::Both) {
            self.emit(
                LogLevel::Debug,
                format!(
                    "SIM900 Reply (raw, {}): {}",
                    source,
                    hex::encode(reply.as_bytes())
                ),
            );
        }

        if matches!(self.mode, LoggingMode::Interpreted | LoggingMode::Both) {
            self.emit(
                LogLevel::Debug,
                format!("SIM900 Reply ({}): {:?}", source, reply),
            );
        }
    }

    /// Log a free-form error event
    pub fn log_error(&self, message: &str) {
        self.emit(LogLevel::Error, format!("SIM900 Error: {}", message));
    }
}

/// Render a command for the interpreted mode
fn interpret(command: &Command) -> String {
    match command.port() {
        Some(port) => format!("{}, Port: {} [{}]", command.verb(), port, command.encode()),
        None => format!("{} [{}]", command.verb(), command.encode()),
    }
}

/// Create a timestamped console logger
///
/// ```rust
/// use sim900::console_logger;
/// use sim900::logging::{LogLevel, LoggingMode};
///
/// let logger = console_logger!(LogLevel::Debug, LoggingMode::Both);
/// # let _ = logger;
/// ```
#[macro_export]
macro_rules! console_logger {
    ($level:expr, $mode:expr) => {
        $crate::logging::CallbackLogger::console($level, $mode)
    };
}

/// Create a logger with a custom callback
///
/// ```rust
/// use sim900::custom_logger;
/// use sim900::logging::{LogLevel, LoggingMode};
///
/// let logger = custom_logger!(
///     |level, message| eprintln!("{}: {}", level, message),
///     LogLevel::Info,
///     LoggingMode::Interpreted
/// );
/// # let _ = logger;
/// ```
#[macro_export]
macro_rules! custom_logger {
    ($callback:expr, $level:expr, $mode:expr) => {
        $crate::logging::CallbackLogger::new($callback, $level, $mode)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collector() -> (CallbackLogger, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let logger = CallbackLogger::new(
            move |_, message| sink.lock().unwrap().push(message),
            LogLevel::Debug,
            LoggingMode::Interpreted,
        );
        (logger, events)
    }

    #[test]
    fn test_interpreted_command_logging() {
        let (logger, events) = collector();
        let port = Port::new(3).unwrap();

        logger.log_command(&Command::Send {
            port,
            message: "*IDN?".to_string(),
        });

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("Send To Port"));
        assert!(events[0].contains("Port: 3"));
        assert!(events[0].contains("SNDT 3,'*IDN?'"));
    }

    #[test]
    fn test_raw_mode_hex_encodes() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let logger = CallbackLogger::new(
            move |_, message| sink.lock().unwrap().push(message),
            LogLevel::Debug,
            LoggingMode::Raw,
        );

        logger.log_command(&Command::FlushBuffers);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        // "FLSH" in hex
        assert!(events[0].contains("464c5348"));
    }

    #[test]
    fn test_level_filtering() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let logger = CallbackLogger::new(
            move |_, message| sink.lock().unwrap().push(message),
            LogLevel::Error,
            LoggingMode::Both,
        );

        logger.log_command(&Command::FlushBuffers);
        logger.log_response(None, "SIM900");
        assert!(events.lock().unwrap().is_empty());

        logger.log_error("stuck exchange");
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_disabled_logger_drops_everything() {
        let logger = CallbackLogger::disabled();
        // No panic, no output.
        logger.log_command(&Command::Identify);
        logger.log_error("ignored");
    }
}
