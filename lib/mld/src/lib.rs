//! A Multicast Listener Discovery (MLDv1, RFC 2710) host engine. It is
//! written as a ["sans-I/O"][sans-io] library: the engine keeps the
//! per-(interface, group) membership records and drives the listener state
//! machine, but performs no networking or timekeeping itself. A
//! [dependencies](Dependencies) object supplies timers, randomness, link
//! state and the ICMPv6 transmit path.
//!
//! [sans-io]: https://sans-io.readthedocs.io
//!
//! The engine expects to run under its embedding's serialization (for a
//! network stack, the global network lock): all methods take `&mut self` and
//! timer expiry is delivered back synchronously through
//! [`Mld::timer_expired`] with the [`TimerToken`] that was handed to
//! [`Dependencies::arm_timer`].
//!
//! ```
//! use std::net::Ipv6Addr;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct NullDeps;
//!
//! impl mld::Dependencies for NullDeps {
//!     type TimerId = ();
//!
//!     fn arm_timer(&self, _delay: Duration, _token: mld::TimerToken) -> Option<()> {
//!         // here a real stack would reserve a cell in its timer pool whose
//!         // callback calls `Mld::timer_expired` with the token
//!         None
//!     }
//!     fn cancel_timer(&self, _timer: ()) {}
//!     fn random_delay(&self, max: Duration) -> Duration {
//!         max / 2
//!     }
//!     fn link_is_up(&self, _iface: mld::IfaceId) -> bool {
//!         false
//!     }
//!     fn link_local_addr(&self, _iface: mld::IfaceId) -> Option<Ipv6Addr> {
//!         None
//!     }
//!     fn is_own_addr(&self, _addr: &Ipv6Addr) -> bool {
//!         false
//!     }
//!     fn mcast_addr_add(&self, _iface: mld::IfaceId, _group: Ipv6Addr) -> Result<(), mld::IfaceError> {
//!         Ok(())
//!     }
//!     fn mcast_addr_remove(&self, _iface: mld::IfaceId, _group: Ipv6Addr) {}
//!     fn link_state_subscribe(&self, _iface: mld::IfaceId) {}
//!     fn link_state_unsubscribe(&self, _iface: mld::IfaceId) {}
//!     fn transmit(&self, _iface: mld::IfaceId, _msg: &mld::MldMessage) -> Result<(), mld::TransmitError> {
//!         Err(mld::TransmitError::LinkDown)
//!     }
//! }
//!
//! let mut engine = mld::Mld::new(NullDeps, mld::MldConfig::default(), 4);
//! engine.join(1, "ff12::3".parse().unwrap()).unwrap();
//! assert!(engine.is_joined(1, &"ff12::3".parse().unwrap()));
//! ```

#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::net::Ipv6Addr;
use std::time::Duration;

pub mod addr;
mod engine;
mod message;

#[cfg(test)]
mod tests;

pub use engine::{Mld, PoolStats};
pub use message::{
    ext_hdr_has_router_alert, hop_by_hop_router_alert, MldMessage, MldType, CODE, HOP_LIMIT,
    MSG_SIZE_MIN, OPT_HDR_SIZE, TYPE_DONE, TYPE_QUERY, TYPE_REPORT,
};

/// Interface number, assigned by the interface manager.
pub type IfaceId = u32;

/// Link state reported by the interface manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

/// Identifies the record a pending delay timer belongs to. The embedding
/// passes the token back through [`Mld::timer_expired`] when the timer it
/// armed fires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimerToken {
    pub iface: IfaceId,
    pub group: Ipv6Addr,
}

// Tokens end up captured in timer callbacks owned by another task.
static_assertions::assert_impl_all!(TimerToken: Copy, Send, Sync);

/// A collection of methods that allow the engine to interact with the
/// external system.
pub trait Dependencies: Debug {
    /// Handle to a pending timer, returned by [`arm_timer`](Self::arm_timer)
    /// and owned by the record while it is in the delaying state.
    type TimerId: Debug;

    /// Arm a one-shot timer that will call [`Mld::timer_expired`] with
    /// `token` after roughly `delay`. Returns `None` when no timer resources
    /// are available; the engine then falls back to transmitting
    /// immediately.
    fn arm_timer(&self, delay: Duration, token: TimerToken) -> Option<Self::TimerId>;

    /// Cancel a timer previously armed with [`arm_timer`](Self::arm_timer).
    /// Only called for timers that have not fired.
    fn cancel_timer(&self, timer: Self::TimerId);

    /// A uniformly distributed delay in `[0, max]`, used for query response
    /// scheduling.
    fn random_delay(&self, max: Duration) -> Duration;

    fn link_is_up(&self, iface: IfaceId) -> bool;

    /// The first link-local address configured on the interface, used as the
    /// source of reports and done messages.
    fn link_local_addr(&self, iface: IfaceId) -> Option<Ipv6Addr>;

    /// Whether `addr` is configured on any of the host's interfaces. Queries
    /// looped back from ourselves are rejected with it.
    fn is_own_addr(&self, addr: &Ipv6Addr) -> bool;

    /// Configure the interface to accept frames for `group`.
    fn mcast_addr_add(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), IfaceError>;

    fn mcast_addr_remove(&self, iface: IfaceId, group: Ipv6Addr);

    /// Subscribe to link-state notifications for the interface. Called once
    /// per record; deduplication per (interface, subscriber) is the
    /// subscription system's contract. Notifications come back through
    /// [`Mld::link_state_changed`].
    fn link_state_subscribe(&self, iface: IfaceId);

    fn link_state_unsubscribe(&self, iface: IfaceId);

    /// Hand a fully-built MLD message to the ICMPv6 transmit path. The
    /// collaborator adds the ICMPv6 header, checksum and the Hop-by-Hop
    /// Router Alert extension header ([`hop_by_hop_router_alert`]).
    fn transmit(&self, iface: IfaceId, msg: &MldMessage) -> Result<(), TransmitError>;
}

/// Delays governing unsolicited reports and query responses.
#[derive(Copy, Clone, Debug)]
pub struct MldConfig {
    /// Delay before the unsolicited report following a join is repeated.
    pub unsolicited_report_delay: Duration,
    /// Upper bound on the random query-response delay.
    pub report_delay_max: Duration,
    /// Delay before a failed report transmission is retried.
    pub retry_delay: Duration,
}

impl Default for MldConfig {
    fn default() -> Self {
        Self {
            unsolicited_report_delay: Duration::from_secs(2),
            report_delay_max: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Error reported by the interface manager collaborator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IfaceError {
    InvalidIface,
    /// The interface could not allocate the multicast filter entry.
    Resource,
}

/// Error reported by the ICMPv6 transmit collaborator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransmitError {
    LinkDown,
    /// No transmit buffer was available; transient.
    NoBuf,
    /// The transmit path failed.
    Tx,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinError {
    /// The address is not an IPv6 multicast address.
    InvalidGroupAddr,
    /// The host-group pool is exhausted.
    NoneAvail,
    Iface(IfaceError),
    /// The membership record exists, but the initial unsolicited report
    /// could not be transmitted. The next link-up event or query retriggers
    /// advertisement.
    Advertise(TransmitError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum LeaveError {
    InvalidGroupAddr,
    /// The group is not joined on this interface.
    NotFound,
    /// The end-of-membership advertisement failed; the record is kept so the
    /// leave can be retried.
    Done(TransmitError),
}

/// Receive-side validation failures, one per check of the receive path.
#[derive(Debug, PartialEq, Eq)]
pub enum RxError {
    /// IPv6 hop limit was not 1.
    HopLimit,
    /// No Hop-by-Hop Router Alert option.
    MissingRouterAlert,
    /// Source address is not link-local.
    SrcNotLinkLocal,
    /// The packet came from one of our own addresses.
    SrcIsOwnAddr,
    /// Destination address is not multicast.
    DstNotMcast,
    /// Message shorter than the MLD minimum.
    Truncated,
    /// ICMPv6 type is not Query or Report.
    BadType(u8),
    /// The multicast address field is neither unspecified nor multicast.
    BadGroupAddr,
    /// Address-specific query or report for a group we do not listen to.
    GroupNotFound,
}

/// IPv6-layer metadata of a received MLD message.
#[derive(Clone, Debug)]
pub struct RxMeta {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub hop_limit: u8,
    /// The raw Hop-by-Hop extension header of the datagram, if present,
    /// starting at its next-header octet.
    pub hop_by_hop: Option<Vec<u8>>,
}
