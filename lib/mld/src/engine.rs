use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::Duration;

use slotmap::DenseSlotMap;

use crate::addr;
use crate::message::{self, MldMessage, MldType};
use crate::{
    Dependencies, IfaceId, JoinError, LeaveError, LinkState, MldConfig, RxError, RxMeta,
    TimerToken, TransmitError,
};

slotmap::new_key_type! { pub(crate) struct GroupKey; }

/// Listener state of one record. `Free` from the original three-state
/// diagram is represented by the record not being in the pool at all.
#[derive(Debug)]
pub(crate) enum GroupState<T> {
    Idle,
    /// A report is pending; `delay` is the value the timer was armed with,
    /// compared against later queries to decide whether to re-arm.
    Delaying { timer: T, delay: Duration },
}

/// One per-(interface, group) membership record.
#[derive(Debug)]
pub(crate) struct HostGroup<T> {
    pub(crate) iface: IfaceId,
    pub(crate) group: Ipv6Addr,
    /// Local joins plus reports overheard from other listeners. The record
    /// leaves the pool when a leave drops this below 1.
    pub(crate) ref_ctr: u32,
    pub(crate) state: GroupState<T>,
}

/// Occupancy of the host-group record pool.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub used: usize,
    pub max_used: usize,
}

/// The MLDv1 listener engine. See the [crate docs](crate) for the overall
/// model; every method expects the embedding's serialization.
#[derive(Debug)]
pub struct Mld<X: Dependencies> {
    deps: X,
    config: MldConfig,
    capacity: usize,
    max_used: usize,
    groups: DenseSlotMap<GroupKey, HostGroup<X::TimerId>>,
    index: HashMap<(IfaceId, Ipv6Addr), GroupKey>,
    /// Reports and done messages dropped by the transmit path.
    tx_discards: u64,
}

impl<X: Dependencies> Mld<X> {
    pub fn new(deps: X, config: MldConfig, capacity: usize) -> Self {
        Self {
            deps,
            config,
            capacity,
            max_used: 0,
            groups: DenseSlotMap::with_capacity_and_key(capacity),
            index: HashMap::new(),
            tx_discards: 0,
        }
    }

    /// Start (or reinforce) listening to `group` on `iface`. A first join
    /// configures the interface for the group, inserts the record and kicks
    /// off membership advertisement; further joins only bump the reference
    /// count.
    pub fn join(&mut self, iface: IfaceId, group: Ipv6Addr) -> Result<(), JoinError> {
        if !addr::is_mcast(&group) {
            return Err(JoinError::InvalidGroupAddr);
        }

        if let Some(&key) = self.index.get(&(iface, group)) {
            self.groups[key].ref_ctr += 1;
            return Ok(());
        }

        if self.groups.len() >= self.capacity {
            log::debug!("host-group pool exhausted (capacity {})", self.capacity);
            return Err(JoinError::NoneAvail);
        }

        self.deps
            .mcast_addr_add(iface, group)
            .map_err(JoinError::Iface)?;

        let key = self.groups.insert(HostGroup {
            iface,
            group,
            ref_ctr: 1,
            state: GroupState::Idle,
        });
        self.index.insert((iface, group), key);
        self.max_used = self.max_used.max(self.groups.len());

        self.deps.link_state_subscribe(iface);

        log::debug!("joined {group} on interface {iface}");

        match self.advertise(key) {
            // A down link is advertised on the next link-up notification,
            // and a missing transmit buffer still leaves the repeat timer
            // armed; neither fails the join.
            Ok(()) | Err(TransmitError::LinkDown) | Err(TransmitError::NoBuf) => Ok(()),
            Err(e) => Err(JoinError::Advertise(e)),
        }
    }

    /// Drop one reference to `group` on `iface`. The last leave advertises
    /// the end of membership (unless the group is suppressed) and releases
    /// the record. A failed Done transmission keeps the record so the leave
    /// can be retried.
    pub fn leave(&mut self, iface: IfaceId, group: Ipv6Addr) -> Result<(), LeaveError> {
        if !addr::is_mcast(&group) {
            return Err(LeaveError::InvalidGroupAddr);
        }

        let Some(&key) = self.index.get(&(iface, group)) else {
            return Err(LeaveError::NotFound);
        };

        {
            let rec = &mut self.groups[key];
            rec.ref_ctr = rec.ref_ctr.saturating_sub(1);
        }

        let last = self.groups[key].ref_ctr < 1;

        if last && !addr::is_report_suppressed(&group) {
            let msg = done_msg(&self.deps, iface, group);
            match self.deps.transmit(iface, &msg) {
                Ok(()) | Err(TransmitError::LinkDown) => {}
                Err(e) => {
                    self.tx_discards += 1;
                    return Err(LeaveError::Done(e));
                }
            }
        }

        if last {
            self.remove(key);
        }

        Ok(())
    }

    /// Whether `group` is joined on `iface`; the IPv6 receive path uses this
    /// to accept or drop multicast datagrams.
    pub fn is_joined(&self, iface: IfaceId, group: &Ipv6Addr) -> bool {
        self.index.contains_key(&(iface, *group))
    }

    /// Feed a received MLD message (the ICMPv6 message body, starting at the
    /// type octet) through validation and into the query/report handlers.
    pub fn rx_packet(&mut self, iface: IfaceId, meta: &RxMeta, msg: &[u8]) -> Result<(), RxError> {
        if meta.hop_limit != message::HOP_LIMIT {
            return Err(RxError::HopLimit);
        }

        let router_alert = meta
            .hop_by_hop
            .as_deref()
            .map(message::ext_hdr_has_router_alert)
            .unwrap_or(false);
        if !router_alert {
            return Err(RxError::MissingRouterAlert);
        }

        if !addr::is_link_local(&meta.src) {
            return Err(RxError::SrcNotLinkLocal);
        }

        if !addr::is_mcast(&meta.dst) {
            return Err(RxError::DstNotMcast);
        }

        if self.deps.is_own_addr(&meta.src) {
            return Err(RxError::SrcIsOwnAddr);
        }

        let Some(parsed) = message::parse(msg) else {
            return Err(RxError::Truncated);
        };

        match parsed.msg_type {
            message::TYPE_QUERY => self.rx_query(iface, parsed.max_response_delay_ms, parsed.group),
            message::TYPE_REPORT => self.rx_report(iface, parsed.group),
            other => Err(RxError::BadType(other)),
        }
    }

    /// The embedding calls this when a timer armed through
    /// [`Dependencies::arm_timer`] fires. The timer resources are assumed to
    /// be already released; the engine only transitions the record.
    pub fn timer_expired(&mut self, token: TimerToken) {
        let Some(&key) = self.index.get(&(token.iface, token.group)) else {
            log::trace!("delay timer fired for a group no longer joined");
            return;
        };

        // The cell backing the handle is spent, so the handle is dropped
        // rather than canceled.
        let state = std::mem::replace(&mut self.groups[key].state, GroupState::Idle);
        if !matches!(state, GroupState::Delaying { .. }) {
            log::trace!("stale delay timer for {} ignored", token.group);
            return;
        }

        let msg = report_msg(&self.deps, token.iface, token.group);
        match self.deps.transmit(token.iface, &msg) {
            Ok(()) | Err(TransmitError::LinkDown) => {}
            Err(TransmitError::Tx) => {
                // Transient: retry after the configured delay.
                let delay = self.config.retry_delay;
                if let Some(timer) = self.deps.arm_timer(delay, token) {
                    self.groups[key].state = GroupState::Delaying { timer, delay };
                }
            }
            Err(e) => {
                self.tx_discards += 1;
                log::debug!(
                    "delayed report for {} on interface {} discarded: {e:?}",
                    token.group,
                    token.iface
                );
            }
        }
    }

    /// Link-state notification callback. A link coming up re-advertises
    /// membership for every record bound to the interface; a link going down
    /// changes nothing (transmissions observe the down state themselves).
    pub fn link_state_changed(&mut self, iface: IfaceId, state: LinkState) {
        if state != LinkState::Up {
            return;
        }

        let keys: Vec<GroupKey> = self
            .groups
            .iter()
            .filter(|(_, rec)| rec.iface == iface)
            .map(|(key, _)| key)
            .collect();

        for key in keys {
            if let Err(e) = self.advertise(key) {
                log::debug!("re-advertisement on interface {iface} failed: {e:?}");
            }
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            used: self.groups.len(),
            max_used: self.max_used,
        }
    }

    pub fn tx_discards(&self) -> u64 {
        self.tx_discards
    }

    /// Advertise membership for a record: arm the unsolicited-report repeat
    /// timer and transmit an immediate report. Suppressed groups stay idle
    /// and a down link defers to the next link-up notification.
    fn advertise(&mut self, key: GroupKey) -> Result<(), TransmitError> {
        let (iface, group) = {
            let rec = &self.groups[key];
            (rec.iface, rec.group)
        };

        // Any pending response delay is superseded by this advertisement.
        cancel_pending(&self.deps, &mut self.groups[key]);

        if addr::is_report_suppressed(&group) {
            return Ok(());
        }

        if !self.deps.link_is_up(iface) {
            return Err(TransmitError::LinkDown);
        }

        let delay = self.config.unsolicited_report_delay;
        let token = TimerToken { iface, group };
        if let Some(timer) = self.deps.arm_timer(delay, token) {
            self.groups[key].state = GroupState::Delaying { timer, delay };
        }

        let msg = report_msg(&self.deps, iface, group);
        match self.deps.transmit(iface, &msg) {
            Ok(()) | Err(TransmitError::NoBuf) => Ok(()),
            Err(e) => {
                // The failed advertisement drops the pending repeat too.
                cancel_pending(&self.deps, &mut self.groups[key]);
                if e == TransmitError::Tx {
                    self.tx_discards += 1;
                }
                Err(e)
            }
        }
    }

    fn rx_query(&mut self, iface: IfaceId, mrd_ms: u16, group: Ipv6Addr) -> Result<(), RxError> {
        if group.is_unspecified() {
            // General query: one pass over the pool filtered by interface.
            let keys: Vec<GroupKey> = self
                .groups
                .iter()
                .filter(|(_, rec)| rec.iface == iface)
                .map(|(key, _)| key)
                .collect();

            for key in keys {
                self.schedule_response(key, mrd_ms);
            }

            Ok(())
        } else if addr::is_mcast(&group) {
            let Some(&key) = self.index.get(&(iface, group)) else {
                return Err(RxError::GroupNotFound);
            };

            self.schedule_response(key, mrd_ms);
            Ok(())
        } else {
            Err(RxError::BadGroupAddr)
        }
    }

    /// Answer a query for one record: immediately when the query allows no
    /// delay, otherwise with a random delay in `[0, max response delay]`
    /// clipped to the configured maximum. An already-pending shorter delay
    /// is left alone.
    fn schedule_response(&mut self, key: GroupKey, mrd_ms: u16) {
        let (iface, group) = {
            let rec = &self.groups[key];
            (rec.iface, rec.group)
        };

        if addr::is_report_suppressed(&group) {
            cancel_pending(&self.deps, &mut self.groups[key]);
            return;
        }

        if mrd_ms == 0 {
            self.tx_report_now(iface, group);
            return;
        }

        let mrd = Duration::from_millis(mrd_ms.into());
        let rearm = match &self.groups[key].state {
            GroupState::Idle => true,
            GroupState::Delaying { delay, .. } => *delay > mrd,
        };
        if !rearm {
            return;
        }

        cancel_pending(&self.deps, &mut self.groups[key]);

        let delay = self.deps.random_delay(mrd.min(self.config.report_delay_max));
        let token = TimerToken { iface, group };
        match self.deps.arm_timer(delay, token) {
            Some(timer) => self.groups[key].state = GroupState::Delaying { timer, delay },
            // No timer to be had: answer right away instead.
            None => self.tx_report_now(iface, group),
        }
    }

    fn rx_report(&mut self, iface: IfaceId, group: Ipv6Addr) -> Result<(), RxError> {
        if !addr::is_mcast(&group) {
            return Err(RxError::BadGroupAddr);
        }

        let Some(&key) = self.index.get(&(iface, group)) else {
            return Err(RxError::GroupNotFound);
        };

        // Another listener reported for the group; our own pending report is
        // now unnecessary.
        let rec = &mut self.groups[key];
        rec.ref_ctr += 1;
        cancel_pending(&self.deps, rec);

        Ok(())
    }

    fn tx_report_now(&mut self, iface: IfaceId, group: Ipv6Addr) {
        let msg = report_msg(&self.deps, iface, group);
        if let Err(e) = self.deps.transmit(iface, &msg) {
            self.tx_discards += 1;
            log::debug!("report for {group} on interface {iface} discarded: {e:?}");
        }
    }

    fn remove(&mut self, key: GroupKey) {
        cancel_pending(&self.deps, &mut self.groups[key]);

        let rec = self.groups.remove(key).unwrap();
        self.index.remove(&(rec.iface, rec.group));

        self.deps.mcast_addr_remove(rec.iface, rec.group);
        self.deps.link_state_unsubscribe(rec.iface);

        log::debug!("left {} on interface {}", rec.group, rec.iface);
    }

    #[cfg(test)]
    pub(crate) fn record(
        &self,
        iface: IfaceId,
        group: &Ipv6Addr,
    ) -> Option<&HostGroup<X::TimerId>> {
        let key = self.index.get(&(iface, *group))?;
        self.groups.get(*key)
    }
}

fn cancel_pending<X: Dependencies>(deps: &X, rec: &mut HostGroup<X::TimerId>) {
    if let GroupState::Delaying { timer, .. } =
        std::mem::replace(&mut rec.state, GroupState::Idle)
    {
        deps.cancel_timer(timer);
    }
}

fn report_msg<X: Dependencies>(deps: &X, iface: IfaceId, group: Ipv6Addr) -> MldMessage {
    MldMessage {
        msg_type: MldType::Report,
        max_response_delay_ms: 0,
        group,
        src: deps.link_local_addr(iface).unwrap_or(Ipv6Addr::UNSPECIFIED),
        dst: group,
        hop_limit: message::HOP_LIMIT,
    }
}

fn done_msg<X: Dependencies>(deps: &X, iface: IfaceId, group: Ipv6Addr) -> MldMessage {
    MldMessage {
        msg_type: MldType::Done,
        max_response_delay_ms: 0,
        group,
        src: deps.link_local_addr(iface).unwrap_or(Ipv6Addr::UNSPECIFIED),
        dst: addr::ALL_ROUTERS,
        hop_limit: message::HOP_LIMIT,
    }
}
