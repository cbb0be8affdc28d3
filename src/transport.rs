//! Probe transport: one raw socket per probe and the bounded wait for its reply.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::error::PingResult;
use crate::reply::{self, ReplyKind, Unreachable};

/// Largest datagram we bother reading.
pub const RECV_BUFFER_LEN: usize = 1024;

/// A raw ICMP endpoint. Dropping it releases the underlying descriptor.
pub trait IcmpSocket {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> PingResult<()>;

    /// Blocks until a datagram is readable or `timeout` runs out. `Ok(false)` means timeout.
    fn wait_readable(&mut self, timeout: Duration) -> PingResult<bool>;

    fn recv(&mut self, buf: &mut [u8]) -> PingResult<usize>;
}

/// Opens a fresh socket for each probe.
pub trait SocketFactory {
    type Socket: IcmpSocket;

    fn open(&mut self) -> PingResult<Self::Socket>;
}

impl<S: IcmpSocket, F: FnMut() -> PingResult<S>> SocketFactory for F {
    type Socket = S;

    fn open(&mut self) -> PingResult<S> {
        self()
    }
}

/// Outcome of waiting for a probe's reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Received {
    Echo {
        rtt: Duration,
        source: Option<Ipv4Addr>,
    },
    Unreachable(Unreachable),
    TimedOut,
}

/// Wall clock in seconds since the epoch, the unit carried in the echo payload.
pub trait Clock {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Waits for the reply matching `identifier` within `timeout`.
///
/// The budget only shrinks: time spent waiting before a non-matching datagram is
/// deducted, so a stream of foreign traffic cannot stretch the window. A match or an
/// unreachable report returns at once.
pub fn receive_with_timeout<S: IcmpSocket, C: Clock>(
    socket: &mut S,
    identifier: u16,
    timeout: Duration,
    clock: &C,
) -> PingResult<Received> {
    let mut time_left = timeout;
    let mut buffer = [0u8; RECV_BUFFER_LEN];

    loop {
        let started = Instant::now();
        let ready = socket.wait_readable(time_left)?;
        let waited = started.elapsed();

        if !ready {
            return Ok(Received::TimedOut);
        }

        let received_at = clock.now();
        let len = socket.recv(&mut buffer)?;
        let parsed = reply::parse(&buffer[..len], identifier, received_at);

        match parsed.kind {
            ReplyKind::Echo { rtt } => {
                return Ok(Received::Echo {
                    rtt,
                    source: parsed.source,
                })
            }
            ReplyKind::Unreachable(kind) => return Ok(Received::Unreachable(kind)),
            ReplyKind::Mismatch => trace!(
                expected = identifier,
                actual = ?parsed.header.map(|h| h.icmp_identifier),
                source = ?parsed.source,
                "Ignored datagram for another probe"
            ),
        }

        time_left = match time_left.checked_sub(waited) {
            Some(left) if !left.is_zero() => left,
            _ => return Ok(Received::TimedOut),
        };
    }
}
