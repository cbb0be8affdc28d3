//! Error types for ping runs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PingError {
    #[error("Failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No IPv4 address found for {0}")]
    NoIpv4Address(String),

    #[error("Failed to open raw ICMP socket: {0}")]
    SocketOpen(#[source] std::io::Error),

    #[error("Socket descriptor {0} is outside the select(2) range")]
    FdOutOfRange(i32),

    #[error("Failed to send echo request: {0}")]
    Send(#[source] std::io::Error),

    #[error("Failed to wait for socket readiness: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to receive datagram: {0}")]
    Receive(#[source] std::io::Error),

    #[error("ICMP header codec failed: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

impl PingError {
    /// Returns true if this error must abort the whole run.
    ///
    /// Everything else is scoped to a single probe: the driver records the probe as
    /// lost and moves on to the next one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Resolve { .. }
                | Self::NoIpv4Address(_)
                | Self::SocketOpen(_)
                | Self::FdOutOfRange(_)
                | Self::InvalidConfig(_)
                | Self::Signal(_)
        )
    }
}

pub type PingResult<T> = Result<T, PingError>;
