//! IPv6 address predicates used by the listener engine.

use std::net::Ipv6Addr;

/// The link-scope all-nodes group (`ff02::1`).
pub const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// The link-scope all-routers group (`ff02::2`), destination of Done messages.
pub const ALL_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// Multicast scope value 0 (reserved).
pub const SCOPE_RESERVED: u8 = 0x0;

/// Multicast scope value 1 (interface-local).
pub const SCOPE_IFACE_LOCAL: u8 = 0x1;

pub fn is_mcast(addr: &Ipv6Addr) -> bool {
    addr.octets()[0] == 0xff
}

/// Scope field of a multicast address (low nibble of the second octet),
/// 0..=15.
pub fn mcast_scope(addr: &Ipv6Addr) -> u8 {
    addr.octets()[1] & 0x0f
}

/// Link-local unicast (`fe80::/10`).
pub fn is_link_local(addr: &Ipv6Addr) -> bool {
    let octets = addr.octets();
    octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80
}

pub fn is_all_nodes(addr: &Ipv6Addr) -> bool {
    *addr == ALL_NODES
}

/// RFC 2710 section 5: the all-nodes group never leaves the idle state, and
/// no MLD message is ever sent for a group of reserved or interface-local
/// scope.
pub fn is_report_suppressed(group: &Ipv6Addr) -> bool {
    let scope = mcast_scope(group);
    is_all_nodes(group) || scope == SCOPE_RESERVED || scope == SCOPE_IFACE_LOCAL
}
