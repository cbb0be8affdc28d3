//! Interpretation of inbound ICMP datagrams.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use pnet::packet::icmp::destination_unreachable::IcmpCodes;
use pnet::packet::icmp::{IcmpCode, IcmpType, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;

use crate::common::{
    decode_timestamp, IcmpHeader, IP_HEADER_LEN, MIN_REPLY_LEN, REPLY_TIMESTAMP_OFFSET,
    TIMESTAMP_LEN,
};

/// Destination Unreachable sub-codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreachable {
    Network,
    Host,
    Protocol,
    Port,
    FragmentationNeeded,
    SourceRouteFailed,
    Unknown(u8),
}

impl Unreachable {
    pub fn from_code(code: u8) -> Self {
        let known = [
            (IcmpCodes::DestinationNetworkUnreachable, Self::Network),
            (IcmpCodes::DestinationHostUnreachable, Self::Host),
            (IcmpCodes::DestinationProtocolUnreachable, Self::Protocol),
            (IcmpCodes::DestinationPortUnreachable, Self::Port),
            (IcmpCodes::FragmentationRequiredAndDFFlagSet, Self::FragmentationNeeded),
            (IcmpCodes::SourceRouteFailed, Self::SourceRouteFailed),
        ];
        let code = IcmpCode::new(code);
        known
            .iter()
            .find(|(known_code, _)| *known_code == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Unknown(code.0))
    }
}

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "Destination Network Unreachable"),
            Self::Host => write!(f, "Destination Host Unreachable"),
            Self::Protocol => write!(f, "Destination Protocol Unreachable"),
            Self::Port => write!(f, "Destination Port Unreachable"),
            Self::FragmentationNeeded => write!(f, "Fragmentation Needed (DF Set)"),
            Self::SourceRouteFailed => write!(f, "Source Route Failed"),
            Self::Unknown(code) => write!(f, "Unknown Unreachable Error (code {})", code),
        }
    }
}

/// What an inbound datagram means for the outstanding probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyKind {
    /// The echo reply for this probe.
    Echo { rtt: Duration },
    /// A Destination Unreachable report; ends the probe without an RTT.
    Unreachable(Unreachable),
    /// Someone else's traffic. Keep waiting.
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedReply {
    pub kind: ReplyKind,
    pub header: Option<IcmpHeader>,
    pub source: Option<Ipv4Addr>,
}

/// Classifies a raw IPv4 datagram read at `received_at` (seconds since the epoch).
///
/// Destination Unreachable wins over identifier matching. A matching reply yields
/// `received_at` minus the send time embedded in its payload.
pub fn parse(datagram: &[u8], expected_identifier: u16, received_at: f64) -> ParsedReply {
    let source = Ipv4Packet::new(datagram).map(|ip| ip.get_source());
    let header = datagram
        .get(IP_HEADER_LEN..)
        .and_then(|icmp| IcmpHeader::decode(icmp).ok());

    let kind = match header {
        Some(h) if IcmpType::new(h.icmp_type) == IcmpTypes::DestinationUnreachable => {
            ReplyKind::Unreachable(Unreachable::from_code(h.icmp_code))
        }
        Some(h) if h.icmp_identifier == expected_identifier => match embedded_send_time(datagram) {
            Some(sent_at) => ReplyKind::Echo {
                rtt: rtt_between(sent_at, received_at),
            },
            None => ReplyKind::Mismatch,
        },
        _ => ReplyKind::Mismatch,
    };

    ParsedReply { kind, header, source }
}

fn embedded_send_time(datagram: &[u8]) -> Option<f64> {
    if datagram.len() < MIN_REPLY_LEN {
        return None;
    }
    let mut bytes = [0u8; TIMESTAMP_LEN];
    bytes.copy_from_slice(&datagram[REPLY_TIMESTAMP_OFFSET..MIN_REPLY_LEN]);
    Some(decode_timestamp(bytes))
}

// Both timestamps come from this host's wall clock; a clock stepping backwards clamps to zero.
fn rtt_between(sent_at: f64, received_at: f64) -> Duration {
    Duration::try_from_secs_f64((received_at - sent_at).max(0.0)).unwrap_or_default()
}
