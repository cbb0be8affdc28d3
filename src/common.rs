use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::PingResult;

pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_HEADER_LEN: usize = 8;
pub const TIMESTAMP_LEN: usize = 8;
pub const ECHO_REQUEST_LEN: usize = ICMP_HEADER_LEN + TIMESTAMP_LEN;

/// Options are not parsed; every inbound datagram is assumed to carry a bare IPv4 header.
pub const IP_HEADER_LEN: usize = 20;
pub const REPLY_TIMESTAMP_OFFSET: usize = IP_HEADER_LEN + ICMP_HEADER_LEN;
pub const MIN_REPLY_LEN: usize = REPLY_TIMESTAMP_OFFSET + TIMESTAMP_LEN;

/// Sequence number carried by every probe.
pub const ECHO_SEQUENCE: u16 = 1;

/// ICMP echo header as it sits on the wire, shared by requests and replies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub icmp_chksum: u16,
    pub icmp_identifier: u16,
    pub icmp_seq_number: u16,
}

impl IcmpHeader {
    pub fn echo_request(identifier: u16, sequence: u16) -> Self {
        Self {
            icmp_type: ICMP_ECHO_REQUEST,
            icmp_code: 0,
            icmp_chksum: 0,
            icmp_identifier: identifier,
            icmp_seq_number: sequence,
        }
    }

    pub fn encode(&self) -> PingResult<Vec<u8>> {
        Ok(codec().serialize(self)?)
    }

    /// Decodes the first eight bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> PingResult<Self> {
        let header = bytes.get(..ICMP_HEADER_LEN).unwrap_or(bytes);
        Ok(codec().deserialize(header)?)
    }
}

// Network order, no varints: five fields, eight bytes.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

/// The send timestamp travels in host byte order; only this host ever reads it back.
pub fn encode_timestamp(seconds: f64) -> [u8; TIMESTAMP_LEN] {
    seconds.to_ne_bytes()
}

pub fn decode_timestamp(bytes: [u8; TIMESTAMP_LEN]) -> f64 {
    f64::from_ne_bytes(bytes)
}
