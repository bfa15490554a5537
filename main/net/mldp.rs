//! MLD service: wires the listener engine into the timer pool, the
//! interface manager and the ICMPv6 transmit path, and exposes the
//! join/leave/receive surface on [`Net`].

use std::cell::RefCell;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use timer_wheel::{TimerKey, TimerPool};

use crate::core::config::TimerConfig;
use crate::net::iface::{IfaceError, IfaceId, IfaceManager, LinkState};
use crate::net::icmpv6::{Icmpv6Tx, NEXT_HDR_ICMPV6};
use crate::net::{Net, Stack};

pub use mld::RxMeta;

/// The engine's view of the rest of the stack. Timer callbacks registered
/// here run inside the timer task's sweep, with the global lock held.
#[derive(Debug)]
pub(crate) struct MldpDeps {
    tmr: Arc<TimerPool<Stack>>,
    iface: Arc<dyn IfaceManager>,
    icmpv6: Arc<dyn Icmpv6Tx>,
    timer_cfg: TimerConfig,
    rng: RefCell<Xoshiro256PlusPlus>,
}

impl MldpDeps {
    pub(crate) fn new(
        tmr: Arc<TimerPool<Stack>>,
        iface: Arc<dyn IfaceManager>,
        icmpv6: Arc<dyn Icmpv6Tx>,
        timer_cfg: TimerConfig,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        Self {
            tmr,
            iface,
            icmpv6,
            timer_cfg,
            rng: RefCell::new(rng),
        }
    }
}

impl mld::Dependencies for MldpDeps {
    type TimerId = TimerKey;

    fn arm_timer(&self, delay: Duration, token: mld::TimerToken) -> Option<TimerKey> {
        let ticks = self.timer_cfg.ticks(delay);
        self.tmr
            .get(ticks, move |stack: &mut Stack| {
                stack.mldp.timer_expired(token);
            })
            .ok()
    }

    fn cancel_timer(&self, timer: TimerKey) {
        self.tmr.free(timer);
    }

    fn random_delay(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let ms = self
            .rng
            .borrow_mut()
            .gen_range(0..=u64::try_from(max.as_millis()).unwrap_or(u64::MAX));
        Duration::from_millis(ms)
    }

    fn link_is_up(&self, iface: IfaceId) -> bool {
        self.iface.link_state(iface) == LinkState::Up
    }

    fn link_local_addr(&self, iface: IfaceId) -> Option<Ipv6Addr> {
        self.iface.link_local_addr(iface)
    }

    fn is_own_addr(&self, addr: &Ipv6Addr) -> bool {
        self.iface.is_host_addr(addr)
    }

    fn mcast_addr_add(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), IfaceError> {
        self.iface.addr_multicast_add(iface, group)
    }

    fn mcast_addr_remove(&self, iface: IfaceId, group: Ipv6Addr) {
        self.iface.addr_multicast_remove(iface, group);
    }

    fn link_state_subscribe(&self, iface: IfaceId) {
        self.iface.link_state_subscribe(iface);
    }

    fn link_state_unsubscribe(&self, iface: IfaceId) {
        self.iface.link_state_unsubscribe(iface);
    }

    fn transmit(&self, iface: IfaceId, msg: &mld::MldMessage) -> Result<(), mld::TransmitError> {
        let ext_hdr = mld::hop_by_hop_router_alert(NEXT_HDR_ICMPV6);
        self.icmpv6.tx_msg_req(
            iface,
            msg.msg_type.as_u8(),
            mld::CODE,
            msg.src,
            msg.dst,
            msg.hop_limit,
            &ext_hdr,
            &msg.payload(),
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MldpError {
    LockFault,
    InvalidIface,
    Join(mld::JoinError),
    Leave(mld::LeaveError),
    Rx(mld::RxError),
}

impl Net {
    /// Join the multicast group on the interface, advertising membership
    /// per RFC 2710.
    pub fn mldp_host_grp_join(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), MldpError> {
        let mut stack = self
            .lock("mldp_host_grp_join")
            .map_err(|_| MldpError::LockFault)?;

        if !stack.iface.is_valid(iface) {
            stack.ctrs.mldp.join_fault += 1;
            return Err(MldpError::InvalidIface);
        }

        stack.mldp.join(iface, group).map_err(|e| {
            stack.ctrs.mldp.join_fault += 1;
            MldpError::Join(e)
        })
    }

    /// Leave the multicast group, advertising the end of membership on the
    /// last reference.
    pub fn mldp_host_grp_leave(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), MldpError> {
        let mut stack = self
            .lock("mldp_host_grp_leave")
            .map_err(|_| MldpError::LockFault)?;

        if !stack.iface.is_valid(iface) {
            stack.ctrs.mldp.leave_fault += 1;
            return Err(MldpError::InvalidIface);
        }

        stack.mldp.leave(iface, group).map_err(|e| {
            stack.ctrs.mldp.leave_fault += 1;
            MldpError::Leave(e)
        })
    }

    pub fn mldp_is_grp_joined(&self, iface: IfaceId, group: &Ipv6Addr) -> bool {
        self.lock("mldp_is_grp_joined")
            .map(|stack| stack.mldp.is_joined(iface, group))
            .unwrap_or(false)
    }

    /// Feed a received MLD message (ICMPv6 body plus IPv6 metadata) to the
    /// engine.
    pub fn mldp_rx(&self, iface: IfaceId, meta: &RxMeta, msg: &[u8]) -> Result<(), MldpError> {
        let mut stack = self.lock("mldp_rx").map_err(|_| MldpError::LockFault)?;

        match stack.mldp.rx_packet(iface, meta, msg) {
            Ok(()) => {
                stack.ctrs.mldp.rx_msg_ok += 1;
                Ok(())
            }
            Err(e) => {
                stack.ctrs.mldp.rx_pkt_discard += 1;
                Err(MldpError::Rx(e))
            }
        }
    }

    /// Forward a link-state notification from the interface manager.
    pub fn link_state_notify(&self, iface: IfaceId, state: LinkState) {
        if let Ok(mut stack) = self.lock("link_state_notify") {
            stack.mldp.link_state_changed(iface, state);
        }
    }

    /// Occupancy of the MLD host-group record pool.
    pub fn mldp_pool_stats(&self) -> mld::PoolStats {
        self.lock("mldp_pool_stats")
            .map(|stack| stack.mldp.pool_stats())
            .unwrap_or_default()
    }
}
