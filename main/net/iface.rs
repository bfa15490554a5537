//! Interface manager collaborator contract. The stack never owns network
//! interfaces; it asks the embedding's interface manager about validity,
//! link state and configured addresses, and registers multicast filters
//! through it.

use std::fmt::Debug;
use std::net::Ipv6Addr;

pub use mld::{IfaceError, IfaceId, LinkState};

pub trait IfaceManager: Debug + Send + Sync {
    fn is_valid(&self, iface: IfaceId) -> bool;

    fn link_state(&self, iface: IfaceId) -> LinkState;

    /// First link-local address configured on the interface.
    fn link_local_addr(&self, iface: IfaceId) -> Option<Ipv6Addr>;

    /// Whether `addr` is configured on any interface of this host.
    fn is_host_addr(&self, addr: &Ipv6Addr) -> bool;

    /// Whether any IPv4 address is configured on the system; consulted by
    /// `AI_ADDRCONFIG` name resolution.
    fn ipv4_configured(&self) -> bool;

    fn ipv6_configured(&self) -> bool;

    /// Configure the interface to accept frames addressed to `group`.
    fn addr_multicast_add(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), IfaceError>;

    fn addr_multicast_remove(&self, iface: IfaceId, group: Ipv6Addr);

    /// Register interest in link-state transitions of `iface`. The manager
    /// reports them to the embedding, which forwards them through
    /// [`Net::link_state_notify`](crate::net::Net::link_state_notify).
    /// Deduplication of repeated subscriptions is the manager's contract.
    fn link_state_subscribe(&self, iface: IfaceId);

    fn link_state_unsubscribe(&self, iface: IfaceId);
}
