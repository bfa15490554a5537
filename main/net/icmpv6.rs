//! ICMPv6 transmit collaborator contract: the low-level datagram builder
//! that assembles the IPv6 header, extension headers and ICMPv6 checksum.

use std::fmt::Debug;
use std::net::Ipv6Addr;

use crate::net::iface::IfaceId;

pub use mld::TransmitError;

/// IPv6 next-header value for ICMPv6.
pub const NEXT_HDR_ICMPV6: u8 = 58;

pub trait Icmpv6Tx: Debug + Send + Sync {
    /// Transmit one ICMPv6 message. `ext_hdrs` is the raw extension-header
    /// chain to insert between the IPv6 header and the ICMPv6 header (for
    /// MLD, the Hop-by-Hop Router Alert header); `payload` is the message
    /// body following type, code and checksum.
    #[allow(clippy::too_many_arguments)]
    fn tx_msg_req(
        &self,
        iface: IfaceId,
        msg_type: u8,
        code: u8,
        src: Ipv6Addr,
        dst: Ipv6Addr,
        hop_limit: u8,
        ext_hdrs: &[u8],
        payload: &[u8],
    ) -> Result<(), TransmitError>;
}
