//! Echo request construction.

use crate::common::{encode_timestamp, IcmpHeader, ECHO_REQUEST_LEN};
use crate::error::PingResult;

/// How the final checksum is handed to the socket layer.
///
/// BSD-derived stacks (macOS) expect the value masked back to 16 bits after the
/// host/network swap. Resolved once at startup and threaded through the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumMode {
    pub apply_host_order_mask: bool,
}

impl ChecksumMode {
    pub fn for_platform(os: &str) -> Self {
        Self {
            apply_host_order_mask: matches!(os, "macos" | "ios"),
        }
    }

    pub fn detect() -> Self {
        Self::for_platform(std::env::consts::OS)
    }

    fn finalize(self, checksum: u16) -> u16 {
        let widened = u32::from(checksum);
        if self.apply_host_order_mask {
            (widened & 0xFFFF) as u16
        } else {
            checksum
        }
    }
}

impl Default for ChecksumMode {
    fn default() -> Self {
        Self::detect()
    }
}

/// RFC 1071 Internet checksum.
///
/// Bytes are paired into little-endian words (`b[i+1] * 256 + b[i]`), a trailing odd
/// byte is added on its own, carries are folded back until the sum fits in 16 bits and
/// the result is complemented. The complement's little-endian bytes are what goes on
/// the wire, so the value is returned in network order: write it big-endian.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(u16::from_le_bytes([word[0], word[1]])));
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u32::from(*last));
    }
    while sum > 0xFFFF {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    let answer = !(sum as u16);
    u16::from_be_bytes(answer.to_le_bytes())
}

/// Builds a checksummed echo request: 8-byte header followed by the 8-byte send time.
pub fn build(
    identifier: u16,
    sequence: u16,
    send_time: f64,
    mode: ChecksumMode,
) -> PingResult<Vec<u8>> {
    let mut header = IcmpHeader::echo_request(identifier, sequence);
    let payload = encode_timestamp(send_time);

    let mut packet = Vec::with_capacity(ECHO_REQUEST_LEN);
    packet.extend_from_slice(&header.encode()?);
    packet.extend_from_slice(&payload);

    header.icmp_chksum = mode.finalize(checksum(&packet));

    let mut packet = header.encode()?;
    packet.extend_from_slice(&payload);
    Ok(packet)
}
