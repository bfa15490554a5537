//! DNS client collaborator contract, consumed by name resolution. Only the
//! query surface is specified here; cache policy, retries and transport
//! belong to the resolver implementation.

use std::fmt::Debug;
use std::net::IpAddr;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DnsFlags: u8 {
        const IPV4_ONLY        = 1 << 0;
        const IPV6_ONLY        = 1 << 1;
        const REVERSE_LOOKUP   = 1 << 2;
        const FORCE_RESOLUTION = 1 << 3;
        /// Ask the resolver to report the canonical host name.
        const CANON            = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DnsStatus {
    Resolved,
    /// Resolution is underway; try again later.
    Pending,
    Failed,
    Unknown,
    None,
}

#[derive(Clone, Debug)]
pub struct DnsReply {
    pub status: DnsStatus,
    pub addrs: Vec<IpAddr>,
    /// Canonical name, when requested via [`DnsFlags::CANON`] or produced
    /// by a reverse lookup.
    pub canon_name: Option<String>,
}

pub trait DnsClient: Debug + Send {
    /// Resolve `name`, returning at most `addr_limit` addresses. For
    /// reverse lookups `name` is the numeric address text and the result
    /// arrives in `canon_name`.
    fn get_host(&mut self, name: &str, addr_limit: usize, flags: DnsFlags) -> DnsReply;
}
