//! `rumb`: ICMP echo round-trip measurement over raw IPv4 sockets.
//!
//! Each probe builds a checksummed echo request, sends it on a raw socket opened just
//! for that probe, waits a bounded time for the reply carrying our identifier and turns
//! it into a round-trip time or a Destination Unreachable report. The pinger repeats
//! this `count` times and summarizes loss and min/avg/max RTT.

pub mod common;
pub mod config;
pub mod error;
pub mod packet;
pub mod ping_libc;
pub mod pinger;
pub mod reply;
pub mod stats;
pub mod transport;

pub use config::PingConfig;
pub use error::{PingError, PingResult};
pub use packet::ChecksumMode;
pub use ping_libc::LibcSocket;
pub use pinger::{resolve, ConsoleReporter, Pinger, Reporter};
pub use reply::Unreachable;
pub use stats::{ProbeOutcome, ProbeSeries, RttStats, Summary};
pub use transport::{Clock, IcmpSocket, SocketFactory, SystemClock};
