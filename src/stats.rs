//! Per-probe outcomes and the summary computed over a run.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::reply::Unreachable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Reply {
        rtt: Duration,
        from: Option<Ipv4Addr>,
    },
    Timeout,
    Unreachable(Unreachable),
}

impl ProbeOutcome {
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            Self::Reply { rtt, .. } => Some(*rtt),
            Self::Timeout | Self::Unreachable(_) => None,
        }
    }

    /// Progress line for the `seq`-th probe (1-based).
    pub fn progress_line(&self, seq: u32) -> String {
        match self {
            Self::Reply { rtt, .. } => format!("Reply {}: RTT = {:.3} ms", seq, millis(*rtt)),
            Self::Timeout => "Request timed out.".to_string(),
            Self::Unreachable(kind) => format!("ICMP Error: {}", kind),
        }
    }
}

/// Outcomes of one invocation, in probe order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeSeries {
    outcomes: Vec<ProbeOutcome>,
}

impl ProbeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ProbeOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn sent(&self) -> u32 {
        self.outcomes.len() as u32
    }

    pub fn received(&self) -> u32 {
        self.rtts().count() as u32
    }

    pub fn loss_percent(&self) -> f64 {
        let sent = self.sent();
        if sent == 0 {
            return 0.0;
        }
        (1.0 - f64::from(self.received()) / f64::from(sent)) * 100.0
    }

    fn rtts(&self) -> impl Iterator<Item = Duration> + '_ {
        self.outcomes.iter().filter_map(ProbeOutcome::rtt)
    }

    /// Min/avg/max over successful probes; `None` until something answered.
    pub fn rtt_stats(&self) -> Option<RttStats> {
        let received = self.received();
        if received == 0 {
            return None;
        }
        let min = self.rtts().min()?;
        let max = self.rtts().max()?;
        let avg = self.rtts().sum::<Duration>() / received;
        Some(RttStats { min, avg, max })
    }

    pub fn summary(&self) -> Summary {
        Summary {
            transmitted: self.sent(),
            received: self.received(),
            loss_percent: self.loss_percent(),
            rtt: self.rtt_stats(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttStats {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub transmitted: u32,
    pub received: u32,
    pub loss_percent: f64,
    pub rtt: Option<RttStats>,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Ping statistics ---")?;
        write!(
            f,
            "{} packets transmitted, {} received, {:.1}% packet loss",
            self.transmitted, self.received, self.loss_percent
        )?;
        if let Some(rtt) = self.rtt {
            write!(
                f,
                "\nrtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
                millis(rtt.min),
                millis(rtt.avg),
                millis(rtt.max)
            )?;
        }
        Ok(())
    }
}
