//! Run configuration.

use std::time::Duration;

use crate::error::{PingError, PingResult};
use crate::packet::ChecksumMode;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_COUNT: u32 = 5;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Parameters for one ping invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PingConfig {
    /// Hostname or dotted-quad address to probe.
    pub host: String,
    /// Budget for each probe's reply.
    pub timeout: Duration,
    /// Number of probes to send.
    pub count: u32,
    /// Pause after each probe, however long the probe took.
    pub interval: Duration,
    /// ICMP identifier carried by every probe of this run.
    pub identifier: u16,
    pub checksum_mode: ChecksumMode,
}

impl PingConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: DEFAULT_TIMEOUT,
            count: DEFAULT_COUNT,
            interval: DEFAULT_INTERVAL,
            identifier: process_identifier(),
            checksum_mode: ChecksumMode::detect(),
        }
    }

    pub fn validate(&self) -> PingResult<()> {
        if self.host.trim().is_empty() {
            return Err(PingError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(PingError::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.count == 0 {
            return Err(PingError::InvalidConfig("count must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Low 16 bits of the process id. Two concurrent runs can collide here.
pub fn process_identifier() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

/// Parses a seconds value given on the command line.
pub fn seconds(name: &str, value: f64) -> PingResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| PingError::InvalidConfig(format!("{} {}: {}", name, value, e)))
}
