//! End-to-end runs of the pinger against scripted in-memory sockets.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use rumb::packet::checksum;
use rumb::stats::ProbeOutcome;
use rumb::{
    ChecksumMode, Clock, IcmpSocket, PingConfig, PingError, PingResult, Pinger, Reporter, Summary,
    Unreachable,
};

const DEST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);
const IDENT: u16 = 0xBEEF;

#[derive(Clone)]
struct ManualClock(Rc<Cell<f64>>);

impl ManualClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(1_000.0)))
    }

    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by.as_secs_f64());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.0.get()
    }
}

/// What the network does with one probe.
#[derive(Debug, Clone)]
enum Step {
    Reply(Duration),
    Silence,
    Unreachable(u8),
    /// Foreign echo replies arrive before ours.
    NoisyReply(usize, Duration),
    SendFails,
}

#[derive(Default)]
struct Counters {
    opened: Cell<usize>,
    closed: Cell<usize>,
    sent: RefCell<Vec<Vec<u8>>>,
}

struct ScriptedSocket {
    step: Step,
    clock: ManualClock,
    counters: Rc<Counters>,
    inbound: VecDeque<Vec<u8>>,
}

fn ip_header() -> Vec<u8> {
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[9] = 1;
    ip[12..16].copy_from_slice(&DEST.octets());
    ip
}

fn echo_reply(request: &[u8], identifier: u16) -> Vec<u8> {
    let mut datagram = ip_header();
    datagram.extend_from_slice(request);
    datagram[20] = 0;
    datagram[24..26].copy_from_slice(&identifier.to_be_bytes());
    datagram
}

impl IcmpSocket for ScriptedSocket {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> PingResult<()> {
        assert_eq!(dest, DEST);
        if let Step::SendFails = self.step {
            return Err(PingError::Send(io::Error::from(io::ErrorKind::PermissionDenied)));
        }
        self.counters.sent.borrow_mut().push(packet.to_vec());
        match self.step {
            Step::Reply(_) => self.inbound.push_back(echo_reply(packet, IDENT)),
            Step::NoisyReply(noise, _) => {
                for i in 0..noise {
                    self.inbound.push_back(echo_reply(packet, IDENT.wrapping_add(1 + i as u16)));
                }
                self.inbound.push_back(echo_reply(packet, IDENT));
            }
            Step::Unreachable(code) => {
                let mut datagram = ip_header();
                datagram.extend_from_slice(&[3, code, 0, 0, 0, 0, 0, 0]);
                datagram.extend_from_slice(&[0u8; 28]);
                self.inbound.push_back(datagram);
            }
            Step::Silence | Step::SendFails => {}
        }
        Ok(())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> PingResult<bool> {
        if self.inbound.len() == 1 {
            if let Step::Reply(rtt) | Step::NoisyReply(_, rtt) = self.step {
                self.clock.advance(rtt);
            }
        }
        Ok(!self.inbound.is_empty())
    }

    fn recv(&mut self, buf: &mut [u8]) -> PingResult<usize> {
        let datagram = self.inbound.pop_front().unwrap_or_default();
        buf[..datagram.len()].copy_from_slice(&datagram);
        Ok(datagram.len())
    }
}

impl Drop for ScriptedSocket {
    fn drop(&mut self) {
        self.counters.closed.set(self.counters.closed.get() + 1);
    }
}

#[derive(Default)]
struct RecordingReporter {
    started: bool,
    lines: Vec<String>,
    summary: Option<Summary>,
}

impl Reporter for RecordingReporter {
    fn started(&mut self, _host: &str, _dest: Ipv4Addr) {
        self.started = true;
    }

    fn probed(&mut self, seq: u32, outcome: &ProbeOutcome) {
        self.lines.push(outcome.progress_line(seq));
    }

    fn finished(&mut self, summary: &Summary) {
        self.summary = Some(*summary);
    }
}

fn config(count: u32) -> PingConfig {
    PingConfig {
        host: DEST.to_string(),
        timeout: Duration::from_secs(1),
        count,
        interval: Duration::ZERO,
        identifier: IDENT,
        checksum_mode: ChecksumMode::detect(),
    }
}

struct Harness {
    counters: Rc<Counters>,
    reporter: RecordingReporter,
}

fn run_script(
    count: u32,
    steps: Vec<Step>,
    interrupted: bool,
) -> (PingResult<rumb::ProbeSeries>, Harness) {
    let clock = ManualClock::new();
    let counters = Rc::new(Counters::default());
    let mut steps: VecDeque<Step> = steps.into();

    let factory = {
        let clock = clock.clone();
        let counters = Rc::clone(&counters);
        move || -> PingResult<ScriptedSocket> {
            counters.opened.set(counters.opened.get() + 1);
            Ok(ScriptedSocket {
                step: steps.pop_front().unwrap_or(Step::Silence),
                clock: clock.clone(),
                counters: Rc::clone(&counters),
                inbound: VecDeque::new(),
            })
        }
    };

    let mut pinger = Pinger::with_clock(config(count), factory, clock)
        .interrupt_on(Arc::new(AtomicBool::new(interrupted)));
    let mut reporter = RecordingReporter::default();
    let result = pinger.run(&mut reporter);
    (result, Harness { counters, reporter })
}

#[test]
fn test_reply_timeout_reply() {
    let steps = vec![
        Step::Reply(Duration::from_millis(10)),
        Step::Silence,
        Step::Reply(Duration::from_millis(30)),
    ];
    let (result, harness) = run_script(3, steps, false);
    let series = result.unwrap();

    assert_eq!(series.sent(), 3);
    assert_eq!(series.received(), 2);
    assert_eq!(
        harness.reporter.lines,
        vec![
            "Reply 1: RTT = 10.000 ms",
            "Request timed out.",
            "Reply 3: RTT = 30.000 ms",
        ]
    );

    let summary = harness.reporter.summary.unwrap().to_string();
    assert!(summary.contains("3 packets transmitted, 2 received, 33.3% packet loss"));
    assert!(summary.contains("rtt min/avg/max = 10.000/20.000/30.000 ms"));
}

#[test]
fn test_single_port_unreachable() {
    let (result, harness) = run_script(1, vec![Step::Unreachable(3)], false);
    let series = result.unwrap();

    assert_eq!(
        series.outcomes(),
        &[ProbeOutcome::Unreachable(Unreachable::Port)]
    );
    assert_eq!(
        harness.reporter.lines,
        vec!["ICMP Error: Destination Port Unreachable"]
    );

    let summary = harness.reporter.summary.unwrap();
    assert_eq!(summary.rtt, None);
    let text = summary.to_string();
    assert!(text.contains("1 packets transmitted, 0 received, 100.0% packet loss"));
    assert!(!text.contains("rtt"));
}

#[test]
fn test_foreign_replies_are_skipped() {
    let steps = vec![Step::NoisyReply(3, Duration::from_millis(5))];
    let (result, _) = run_script(1, steps, false);
    let series = result.unwrap();
    assert_eq!(series.received(), 1);
    let rtt = series.outcomes()[0].rtt().unwrap();
    assert!((rtt.as_secs_f64() - 0.005).abs() < 1e-6, "rtt = {:?}", rtt);
}

#[test]
fn test_send_failure_only_loses_that_probe() {
    let steps = vec![Step::SendFails, Step::Reply(Duration::from_millis(1))];
    let (result, harness) = run_script(2, steps, false);
    let series = result.unwrap();

    assert_eq!(series.outcomes()[0], ProbeOutcome::Timeout);
    assert!(series.outcomes()[1].rtt().is_some());
    assert_eq!(harness.reporter.summary.unwrap().loss_percent, 50.0);
}

#[test]
fn test_socket_per_probe_is_released() {
    let steps = vec![
        Step::Reply(Duration::from_millis(2)),
        Step::SendFails,
        Step::Silence,
        Step::Unreachable(1),
    ];
    let (result, harness) = run_script(4, steps, false);
    assert!(result.is_ok());
    assert_eq!(harness.counters.opened.get(), 4);
    assert_eq!(harness.counters.closed.get(), 4);
}

#[test]
fn test_requests_carry_identifier_and_checksum() {
    let steps = vec![Step::Reply(Duration::from_millis(1)), Step::Silence];
    let (_, harness) = run_script(2, steps, false);

    let sent = harness.counters.sent.borrow();
    assert_eq!(sent.len(), 2);
    for packet in sent.iter() {
        assert_eq!(packet.len(), 16);
        assert_eq!(packet[0], 8);
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), IDENT);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 1);
        assert_eq!(checksum(packet), 0);
    }
}

#[test]
fn test_interrupted_before_start() {
    let (result, harness) = run_script(3, vec![Step::Silence; 3], true);
    let series = result.unwrap();
    assert_eq!(series.sent(), 0);
    assert_eq!(harness.counters.opened.get(), 0);
    assert_eq!(harness.reporter.summary.unwrap().transmitted, 0);
}

#[test]
fn test_socket_open_failure_aborts_run() {
    let factory = || -> PingResult<ScriptedSocket> {
        Err(PingError::SocketOpen(io::Error::from(
            io::ErrorKind::PermissionDenied,
        )))
    };
    let mut pinger = Pinger::with_clock(config(3), factory, ManualClock::new());
    let mut reporter = RecordingReporter::default();

    let err = pinger.run(&mut reporter).unwrap_err();
    assert!(matches!(err, PingError::SocketOpen(_)));
    assert!(reporter.started);
    assert!(reporter.lines.is_empty());
    assert!(reporter.summary.is_none());
}

#[test]
fn test_invalid_config_is_rejected_before_probing() {
    let factory = || -> PingResult<ScriptedSocket> { panic!("no socket should be opened") };
    let mut pinger = Pinger::with_clock(config(0), factory, ManualClock::new());
    let err = pinger.run(&mut RecordingReporter::default()).unwrap_err();
    assert!(matches!(err, PingError::InvalidConfig(_)));
}
