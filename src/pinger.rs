//! The probe loop: resolve once, then build, send, wait and record `count` times.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::common::ECHO_SEQUENCE;
use crate::config::PingConfig;
use crate::error::{PingError, PingResult};
use crate::packet;
use crate::stats::{ProbeOutcome, ProbeSeries, Summary};
use crate::transport::{self, Clock, IcmpSocket, Received, SocketFactory, SystemClock};

/// Resolves `host` to its first IPv4 address through the platform resolver.
pub fn resolve(host: &str) -> PingResult<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    let addrs = (host, 0).to_socket_addrs().map_err(|source| PingError::Resolve {
        host: host.to_string(),
        source,
    })?;
    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| PingError::NoIpv4Address(host.to_string()))
}

/// Receives progress as the run goes.
pub trait Reporter {
    fn started(&mut self, host: &str, dest: Ipv4Addr);
    fn probed(&mut self, seq: u32, outcome: &ProbeOutcome);
    fn finished(&mut self, summary: &Summary);
}

/// Prints the classic transcript to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn started(&mut self, _host: &str, dest: Ipv4Addr) {
        println!("Pinging {}:\n", dest);
    }

    fn probed(&mut self, seq: u32, outcome: &ProbeOutcome) {
        println!("{}", outcome.progress_line(seq));
    }

    fn finished(&mut self, summary: &Summary) {
        println!("\n{}", summary);
    }
}

pub struct Pinger<F, C = SystemClock> {
    config: PingConfig,
    factory: F,
    clock: C,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<F: SocketFactory> Pinger<F> {
    pub fn new(config: PingConfig, factory: F) -> Self {
        Self::with_clock(config, factory, SystemClock)
    }
}

impl<F: SocketFactory, C: Clock> Pinger<F, C> {
    pub fn with_clock(config: PingConfig, factory: F, clock: C) -> Self {
        Self {
            config,
            factory,
            clock,
            interrupted: None,
        }
    }

    /// Stops issuing probes once `flag` is set. A probe already waiting runs to completion.
    pub fn interrupt_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    /// Resolves the configured host and runs the full probe series.
    pub fn run<R: Reporter>(&mut self, reporter: &mut R) -> PingResult<ProbeSeries> {
        self.config.validate()?;
        let dest = resolve(&self.config.host)?;
        self.run_to(dest, reporter)
    }

    /// Runs the probe series against an already resolved address.
    pub fn run_to<R: Reporter>(
        &mut self,
        dest: Ipv4Addr,
        reporter: &mut R,
    ) -> PingResult<ProbeSeries> {
        info!(
            host = %self.config.host,
            %dest,
            count = self.config.count,
            identifier = self.config.identifier,
            "Starting ping"
        );
        reporter.started(&self.config.host, dest);

        let mut series = ProbeSeries::new();
        for seq in 1..=self.config.count {
            if self.is_interrupted() {
                debug!(sent = series.sent(), "Interrupted, skipping remaining probes");
                break;
            }

            let outcome = self.probe(dest)?;
            reporter.probed(seq, &outcome);
            series.record(outcome);

            if seq < self.config.count && !self.config.interval.is_zero() {
                thread::sleep(self.config.interval);
            }
        }

        reporter.finished(&series.summary());
        Ok(series)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// One probe with its own socket, released on every path out of here.
    fn probe(&mut self, dest: Ipv4Addr) -> PingResult<ProbeOutcome> {
        let mut socket = self.factory.open()?;
        match self.exchange(&mut socket, dest) {
            Ok(outcome) => Ok(outcome),
            Err(err) if !err.is_fatal() => {
                warn!(error = %err, %dest, "Probe failed, counting it as lost");
                Ok(ProbeOutcome::Timeout)
            }
            Err(err) => Err(err),
        }
    }

    fn exchange<S: IcmpSocket>(&self, socket: &mut S, dest: Ipv4Addr) -> PingResult<ProbeOutcome> {
        let identifier = self.config.identifier;
        let packet = packet::build(
            identifier,
            ECHO_SEQUENCE,
            self.clock.now(),
            self.config.checksum_mode,
        )?;
        socket.send_to(&packet, dest)?;
        debug!(%dest, identifier, len = packet.len(), "Sent echo request");

        let timeout = self.config.timeout;
        let received = transport::receive_with_timeout(socket, identifier, timeout, &self.clock)?;
        let outcome = match received {
            Received::Echo { rtt, source } => {
                debug!(?source, ?rtt, "Received echo reply");
                ProbeOutcome::Reply { rtt, from: source }
            }
            Received::Unreachable(kind) => {
                debug!(%kind, "Received destination unreachable");
                ProbeOutcome::Unreachable(kind)
            }
            Received::TimedOut => ProbeOutcome::Timeout,
        };
        Ok(outcome)
    }
}
