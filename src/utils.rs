/// Utility functions and helpers for mainframe operations
///
/// This module contains various utility functions for message validation,
/// logging, and performance monitoring.

use std::time::{Duration, Instant};
use log::{debug, info, warn};

/// Performance metrics for mainframe exchanges
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_exchanges: u64,
    pub successful_exchanges: u64,
    pub failed_exchanges: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub avg_duration: Duration,
}

impl PerformanceMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful exchange
    pub fn record_success(&mut self, duration: Duration) {
        self.total_exchanges += 1;
        self.successful_exchanges += 1;
        self.total_duration += duration;

        self.min_duration = Some(
            self.min_duration.map_or(duration, |min| min.min(duration))
        );
        self.max_duration = Some(
            self.max_duration.map_or(duration, |max| max.max(duration))
        );

        if self.total_exchanges > 0 {
            self.avg_duration = self.total_duration / self.total_exchanges as u32;
        }
    }

    /// Record a failed exchange
    pub fn record_failure(&mut self, duration: Duration) {
        self.total_exchanges += 1;
        self.failed_exchanges += 1;
        self.total_duration += duration;

        if self.total_exchanges > 0 {
            self.avg_duration = self.total_duration / self.total_exchanges as u32;
        }
    }

    /// Get success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_exchanges == 0 {
            return 0.0;
        }
        (self.successful_exchanges as f64 / self.total_exchanges as f64) * 100.0
    }

    /// Get exchanges per second
    ///
    /// Dominated by the settle delay, so this is mostly a sanity check that
    /// the configured delays are what you think they are.
    pub fn exchanges_per_second(&self) -> f64 {
        if self.total_duration.is_zero() {
            return 0.0;
        }
        self.total_exchanges as f64 / self.total_duration.as_secs_f64()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Timer for measuring operation duration
pub struct OperationTimer {
    start: Instant,
    operation_name: String,
}

impl OperationTimer {
    /// Start a new timer
    pub fn start(operation_name: &str) -> Self {
        debug!("Starting operation: {}", operation_name);
        Self {
            start: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Stop the timer and return duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        debug!("Operation '{}' completed in {:?}", self.operation_name, duration);
        duration
    }

    /// Stop timer and log result
    pub fn stop_and_log(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        if success {
            info!("✅ Operation '{}' succeeded in {:?}", self.operation_name, duration);
        } else {
            warn!("❌ Operation '{}' failed after {:?}", self.operation_name, duration);
        }
        duration
    }
}

/// Data validation utilities
pub mod validation {
    use crate::error::{SimError, SimResult};

    /// Validate a message destined for a module
    ///
    /// Pass-through messages travel quoted inside a `SNDT` frame, so a
    /// single quote or a line terminator inside the message would corrupt
    /// the framing. Rejected here, before any bytes reach the wire.
    pub fn validate_message(message: &str) -> SimResult<()> {
        if message.is_empty() {
            return Err(SimError::config("message must not be empty"));
        }
        if message.contains('\'') {
            return Err(SimError::config(
                "message must not contain single quotes (SNDT framing)",
            ));
        }
        if message.contains('\n') || message.contains('\r') {
            return Err(SimError::config(
                "message must not contain line terminators",
            ));
        }
        Ok(())
    }

    /// Validate a raw-read byte count
    ///
    /// The mainframe caps a single `RAWN?` transfer; larger reads must be
    /// split by the caller.
    pub fn validate_nbytes(nbytes: usize) -> SimResult<()> {
        if nbytes > crate::MAX_RAW_READ {
            return Err(SimError::config(format!(
                "raw read of {} bytes exceeds the per-request cap of {}",
                nbytes,
                crate::MAX_RAW_READ
            )));
        }
        Ok(())
    }
}

/// Formatting and display utilities
pub mod format {
    use super::*;

    /// Format byte array as hex string
    pub fn bytes_to_hex(bytes: &[u8]) -> String {
        bytes.iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Format duration in a human-readable way
    pub fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1000 {
            format!("{}ms", millis)
        } else if millis < 60_000 {
            format!("{:.2}s", duration.as_secs_f64())
        } else {
            let mins = millis / 60_000;
            let secs = (millis % 60_000) as f64 / 1000.0;
            format!("{}m {:.1}s", mins, secs)
        }
    }

    /// Format performance metrics as a table
    pub fn format_metrics(metrics: &PerformanceMetrics) -> String {
        format!(
            "Performance Metrics:\n\
             ├─ Total Exchanges: {}\n\
             ├─ Successful: {} ({:.1}%)\n\
             ├─ Failed: {}\n\
             ├─ Average Duration: {}\n\
             ├─ Min Duration: {}\n\
             ├─ Max Duration: {}\n\
             └─ Exchanges/sec: {:.1}",
            metrics.total_exchanges,
            metrics.successful_exchanges,
            metrics.success_rate(),
            metrics.failed_exchanges,
            format_duration(metrics.avg_duration),
            metrics.min_duration.map_or("N/A".to_string(), format_duration),
            metrics.max_duration.map_or("N/A".to_string(), format_duration),
            metrics.exchanges_per_second()
        )
    }
}

/// Logging utilities
pub mod logging {
    use super::*;
    use crate::protocol::Port;

    /// Initialize simple logger for testing
    pub fn init_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    /// Log one exchange for debugging
    pub fn log_exchange(
        port: Port,
        message: &str,
        reply: &str,
        duration: Duration,
        success: bool,
    ) {
        let status = if success { "✅" } else { "❌" };

        debug!(
            "{} Port {} {:?} -> {:?} | Duration: {}",
            status,
            port,
            message,
            reply,
            format::format_duration(duration)
        );
    }
}
