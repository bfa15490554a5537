//! MLDv1 wire format (RFC 2710 section 3).
//!
//! An MLD message rides in ICMPv6: type, code and checksum are the ICMPv6
//! header, followed by the 16-bit maximum response delay (milliseconds,
//! big-endian), a reserved field and the 128-bit multicast address. The
//! checksum is computed by the ICMPv6 transmit collaborator, not here.

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};

/// ICMPv6 type values for the three MLDv1 messages.
pub const TYPE_QUERY: u8 = 130;
pub const TYPE_REPORT: u8 = 131;
pub const TYPE_DONE: u8 = 132;

/// MLD messages always use ICMPv6 code 0.
pub const CODE: u8 = 0;

/// Minimum length of an MLD message: 4 octets of ICMPv6 header, 2 of max
/// response delay, 2 reserved, 16 of multicast address.
pub const MSG_SIZE_MIN: usize = 24;

/// MLD messages are always sent and received with an IPv6 hop limit of 1.
pub const HOP_LIMIT: u8 = 1;

/// Size of the Hop-by-Hop extension header prepended to every MLD message.
pub const OPT_HDR_SIZE: usize = 8;

/// IPv6 option type for Router Alert (RFC 2711).
const OPT_TYPE_ROUTER_ALERT: u8 = 0x05;
const OPT_TYPE_PAD1: u8 = 0x00;
const OPT_TYPE_PADN: u8 = 0x01;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MldType {
    Query,
    Report,
    Done,
}

impl MldType {
    pub fn as_u8(&self) -> u8 {
        match self {
            MldType::Query => TYPE_QUERY,
            MldType::Report => TYPE_REPORT,
            MldType::Done => TYPE_DONE,
        }
    }
}

/// A fully-specified outgoing MLD message, ready for the ICMPv6 transmit
/// collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MldMessage {
    pub msg_type: MldType,
    /// Only meaningful for queries; zero in reports and done messages.
    pub max_response_delay_ms: u16,
    /// The multicast address being reported or left.
    pub group: Ipv6Addr,
    /// First link-local address configured on the interface, or unspecified.
    pub src: Ipv6Addr,
    /// The group itself for reports, all-routers for done messages.
    pub dst: Ipv6Addr,
    pub hop_limit: u8,
}

impl MldMessage {
    /// The ICMPv6 payload following the 4-octet ICMPv6 header.
    pub fn payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MSG_SIZE_MIN - 4);
        buf.put_u16(self.max_response_delay_ms);
        buf.put_u16(0); // reserved
        buf.put_slice(&self.group.octets());
        buf.freeze()
    }
}

/// The Hop-by-Hop extension header every MLD message carries: Router Alert
/// with the MLD value (0) followed by a PadN option, 8 octets total.
pub fn hop_by_hop_router_alert(next_header: u8) -> [u8; OPT_HDR_SIZE] {
    [
        next_header,
        0, // header extension length, in 8-octet units beyond the first
        OPT_TYPE_ROUTER_ALERT,
        2,
        0,
        0, // Router Alert value 0: MLD message
        OPT_TYPE_PADN,
        0,
    ]
}

/// Scan a raw Hop-by-Hop extension header (starting at its next-header
/// octet) for a Router Alert option.
pub fn ext_hdr_has_router_alert(ext_hdr: &[u8]) -> bool {
    if ext_hdr.len() < 2 {
        return false;
    }

    let hdr_len = (usize::from(ext_hdr[1]) + 1) * 8;
    let end = hdr_len.min(ext_hdr.len());
    let opts = &ext_hdr[2..end];

    let mut offset = 0;
    while offset < opts.len() {
        match opts[offset] {
            OPT_TYPE_ROUTER_ALERT => return true,
            // Pad1 has no length or value field.
            OPT_TYPE_PAD1 => offset += 1,
            _ => {
                let Some(&len) = opts.get(offset + 1) else {
                    return false;
                };
                offset += 2 + usize::from(len);
            }
        }
    }

    false
}

/// Fields of a received MLD message.
#[derive(Copy, Clone, Debug)]
pub struct ParsedMld {
    pub msg_type: u8,
    pub max_response_delay_ms: u16,
    pub group: Ipv6Addr,
}

/// Split out the MLD fields of a received ICMPv6 message body (starting at
/// the ICMPv6 type octet). Returns `None` when the message is shorter than
/// the minimum MLD size.
pub fn parse(msg: &[u8]) -> Option<ParsedMld> {
    if msg.len() < MSG_SIZE_MIN {
        return None;
    }

    let group: [u8; 16] = msg[8..24].try_into().unwrap();

    Some(ParsedMld {
        msg_type: msg[0],
        max_response_delay_ms: u16::from_be_bytes([msg[4], msg[5]]),
        group: Ipv6Addr::from(group),
    })
}
