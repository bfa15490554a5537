//! Tests for the MLD engine. The types in this module are only for testing
//! and stand in for their stack counterparts: the timer pool, the interface
//! manager and the ICMPv6 transmit path.


use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::Ipv6Addr;
use std::rc::Rc;
use std::time::Duration;

use crate::engine::GroupState;
use crate::{
    addr, hop_by_hop_router_alert, Dependencies, IfaceError, IfaceId, JoinError, Mld, MldConfig,
    MldMessage, MldType, RxMeta, TimerToken, TransmitError, TYPE_QUERY, TYPE_REPORT,
};

pub(crate) const IF_1: IfaceId = 1;

#[derive(Clone, Debug)]
pub(crate) struct ArmedTimer {
    pub id: u64,
    pub delay: Duration,
    pub token: TimerToken,
}

/// Shared state behind the test `Dependencies`: scripted collaborator
/// behavior plus a journal of everything the engine asked for.
#[derive(Debug)]
pub(crate) struct Harness {
    next_timer_id: Cell<u64>,
    pub timers: RefCell<Vec<ArmedTimer>>,
    pub canceled: RefCell<Vec<u64>>,
    pub sent: RefCell<Vec<(IfaceId, MldMessage)>>,
    pub link_up: Cell<bool>,
    pub link_local: Cell<Option<Ipv6Addr>>,
    pub own_addrs: RefCell<Vec<Ipv6Addr>>,
    pub subscribed: RefCell<Vec<IfaceId>>,
    pub unsubscribed: RefCell<Vec<IfaceId>>,
    pub mcast_added: RefCell<Vec<(IfaceId, Ipv6Addr)>>,
    pub mcast_removed: RefCell<Vec<(IfaceId, Ipv6Addr)>>,
    /// Value `random_delay` returns, clamped to the engine's bound.
    pub next_random: Cell<Duration>,
    pub timers_available: Cell<bool>,
    /// Scripted transmit results, oldest first; once exhausted, `Ok`.
    pub transmit_script: RefCell<VecDeque<Result<(), TransmitError>>>,
    pub mcast_add_error: Cell<Option<IfaceError>>,
}

impl Harness {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            next_timer_id: Cell::new(1),
            timers: RefCell::new(Vec::new()),
            canceled: RefCell::new(Vec::new()),
            sent: RefCell::new(Vec::new()),
            link_up: Cell::new(true),
            link_local: Cell::new(Some("fe80::1".parse().unwrap())),
            own_addrs: RefCell::new(Vec::new()),
            subscribed: RefCell::new(Vec::new()),
            unsubscribed: RefCell::new(Vec::new()),
            mcast_added: RefCell::new(Vec::new()),
            mcast_removed: RefCell::new(Vec::new()),
            next_random: Cell::new(Duration::from_millis(800)),
            timers_available: Cell::new(true),
            transmit_script: RefCell::new(VecDeque::new()),
            mcast_add_error: Cell::new(None),
        })
    }

    pub fn sent_types(&self) -> Vec<MldType> {
        self.sent.borrow().iter().map(|(_, m)| m.msg_type).collect()
    }

    pub fn armed(&self) -> Vec<ArmedTimer> {
        self.timers.borrow().clone()
    }

    pub fn script_transmit(&self, results: &[Result<(), TransmitError>]) {
        self.transmit_script.borrow_mut().extend(results.iter().cloned());
    }
}

#[derive(Debug)]
pub(crate) struct TestDeps(pub Rc<Harness>);

impl Dependencies for TestDeps {
    type TimerId = u64;

    fn arm_timer(&self, delay: Duration, token: TimerToken) -> Option<u64> {
        if !self.0.timers_available.get() {
            return None;
        }
        let id = self.0.next_timer_id.get();
        self.0.next_timer_id.set(id + 1);
        self.0.timers.borrow_mut().push(ArmedTimer { id, delay, token });
        Some(id)
    }

    fn cancel_timer(&self, timer: u64) {
        self.0.timers.borrow_mut().retain(|t| t.id != timer);
        self.0.canceled.borrow_mut().push(timer);
    }

    fn random_delay(&self, max: Duration) -> Duration {
        self.0.next_random.get().min(max)
    }

    fn link_is_up(&self, _iface: IfaceId) -> bool {
        self.0.link_up.get()
    }

    fn link_local_addr(&self, _iface: IfaceId) -> Option<Ipv6Addr> {
        self.0.link_local.get()
    }

    fn is_own_addr(&self, addr: &Ipv6Addr) -> bool {
        self.0.own_addrs.borrow().contains(addr)
    }

    fn mcast_addr_add(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), IfaceError> {
        if let Some(e) = self.0.mcast_add_error.get() {
            return Err(e);
        }
        self.0.mcast_added.borrow_mut().push((iface, group));
        Ok(())
    }

    fn mcast_addr_remove(&self, iface: IfaceId, group: Ipv6Addr) {
        self.0.mcast_removed.borrow_mut().push((iface, group));
    }

    fn link_state_subscribe(&self, iface: IfaceId) {
        self.0.subscribed.borrow_mut().push(iface);
    }

    fn link_state_unsubscribe(&self, iface: IfaceId) {
        self.0.unsubscribed.borrow_mut().push(iface);
    }

    fn transmit(&self, iface: IfaceId, msg: &MldMessage) -> Result<(), TransmitError> {
        let result = self
            .0
            .transmit_script
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.0.sent.borrow_mut().push((iface, msg.clone()));
        }
        result
    }
}

pub(crate) fn engine() -> (Mld<TestDeps>, Rc<Harness>) {
    let harness = Harness::new();
    let engine = Mld::new(TestDeps(harness.clone()), MldConfig::default(), 8);
    (engine, harness)
}

pub(crate) fn grp(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

/// Pop the armed timer for `token` (the backing cell is spent once it
/// fires) and deliver the expiry to the engine.
pub(crate) fn fire(engine: &mut Mld<TestDeps>, harness: &Harness, token: TimerToken) {
    let pos = {
        let timers = harness.timers.borrow();
        timers
            .iter()
            .position(|t| t.token == token)
            .expect("no armed timer for token")
    };
    harness.timers.borrow_mut().remove(pos);
    engine.timer_expired(token);
}

/// A valid received query for `group` (unspecified for a general query).
pub(crate) fn query_msg(mrd_ms: u16, group: Ipv6Addr) -> Vec<u8> {
    let mut msg = vec![0u8; 24];
    msg[0] = TYPE_QUERY;
    msg[4..6].copy_from_slice(&mrd_ms.to_be_bytes());
    msg[8..24].copy_from_slice(&group.octets());
    msg
}

pub(crate) fn report_msg_bytes(group: Ipv6Addr) -> Vec<u8> {
    let mut msg = vec![0u8; 24];
    msg[0] = TYPE_REPORT;
    msg[8..24].copy_from_slice(&group.octets());
    msg
}

/// Metadata of a well-formed MLD datagram from a link-local peer.
pub(crate) fn rx_meta() -> RxMeta {
    RxMeta {
        src: "fe80::99".parse().unwrap(),
        dst: addr::ALL_NODES,
        hop_limit: 1,
        hop_by_hop: Some(hop_by_hop_router_alert(58).to_vec()),
    }
}

#[test]
fn join_advertises_membership() {
    let (mut engine, h) = engine();
    let group = grp("ff12::3");

    engine.join(IF_1, group).unwrap();

    assert!(engine.is_joined(IF_1, &group));
    assert_eq!(*h.mcast_added.borrow(), vec![(IF_1, group)]);
    assert_eq!(*h.subscribed.borrow(), vec![IF_1]);

    // One immediate unsolicited report, sourced from the link-local address
    // and addressed to the group itself.
    let sent = h.sent.borrow();
    assert_eq!(sent.len(), 1);
    let (iface, msg) = &sent[0];
    assert_eq!(*iface, IF_1);
    assert_eq!(msg.msg_type, MldType::Report);
    assert_eq!(msg.src, "fe80::1".parse::<Ipv6Addr>().unwrap());
    assert_eq!(msg.dst, group);
    assert_eq!(msg.group, group);
    assert_eq!(msg.hop_limit, 1);

    // The repeat is scheduled two seconds out and the record is delaying.
    let armed = h.armed();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].delay, Duration::from_secs(2));
    assert_eq!(armed[0].token, TimerToken { iface: IF_1, group });

    let rec = engine.record(IF_1, &group).unwrap();
    assert_eq!(rec.ref_ctr, 1);
    assert!(matches!(rec.state, GroupState::Delaying { .. }));
}

#[test]
fn join_without_link_local_uses_unspecified_source() {
    let (mut engine, h) = engine();
    h.link_local.set(None);

    engine.join(IF_1, grp("ff12::3")).unwrap();

    assert_eq!(h.sent.borrow()[0].1.src, Ipv6Addr::UNSPECIFIED);
}

#[test]
fn join_existing_group_only_bumps_refcount() {
    let (mut engine, h) = engine();
    let group = grp("ff12::3");

    engine.join(IF_1, group).unwrap();
    engine.join(IF_1, group).unwrap();

    assert_eq!(engine.record(IF_1, &group).unwrap().ref_ctr, 2);
    assert_eq!(h.sent.borrow().len(), 1);
    assert_eq!(h.armed().len(), 1);
    assert_eq!(engine.pool_stats().used, 1);
}

#[test]
fn join_rejects_non_multicast() {
    let (mut engine, _h) = engine();
    assert_eq!(
        engine.join(IF_1, grp("2001:db8::1")),
        Err(JoinError::InvalidGroupAddr)
    );
}

#[test]
fn join_pool_exhaustion() {
    let harness = Harness::new();
    let mut engine = Mld::new(TestDeps(harness.clone()), MldConfig::default(), 1);

    engine.join(IF_1, grp("ff12::1")).unwrap();
    assert_eq!(engine.join(IF_1, grp("ff12::2")), Err(JoinError::NoneAvail));

    let stats = engine.pool_stats();
    assert_eq!(stats.capacity, 1);
    assert_eq!(stats.used, 1);
    assert_eq!(stats.max_used, 1);
}

#[test]
fn join_unwinds_on_interface_failure() {
    let (mut engine, h) = engine();
    h.mcast_add_error.set(Some(IfaceError::Resource));

    assert_eq!(
        engine.join(IF_1, grp("ff12::3")),
        Err(JoinError::Iface(IfaceError::Resource))
    );
    assert!(!engine.is_joined(IF_1, &grp("ff12::3")));
    assert_eq!(engine.pool_stats().used, 0);
    assert!(h.subscribed.borrow().is_empty());
}

#[test]
fn verify_send() {
    #[derive(Debug)]
    struct SendDeps;

    impl Dependencies for SendDeps {
        type TimerId = u64;

        fn arm_timer(&self, _: Duration, _: TimerToken) -> Option<u64> {
            unimplemented!()
        }
        fn cancel_timer(&self, _: u64) {
            unimplemented!()
        }
        fn random_delay(&self, _: Duration) -> Duration {
            unimplemented!()
        }
        fn link_is_up(&self, _: IfaceId) -> bool {
            unimplemented!()
        }
        fn link_local_addr(&self, _: IfaceId) -> Option<Ipv6Addr> {
            unimplemented!()
        }
        fn is_own_addr(&self, _: &Ipv6Addr) -> bool {
            unimplemented!()
        }
        fn mcast_addr_add(&self, _: IfaceId, _: Ipv6Addr) -> Result<(), IfaceError> {
            unimplemented!()
        }
        fn mcast_addr_remove(&self, _: IfaceId, _: Ipv6Addr) {
            unimplemented!()
        }
        fn link_state_subscribe(&self, _: IfaceId) {
            unimplemented!()
        }
        fn link_state_unsubscribe(&self, _: IfaceId) {
            unimplemented!()
        }
        fn transmit(&self, _: IfaceId, _: &MldMessage) -> Result<(), TransmitError> {
            unimplemented!()
        }
    }

    // The test deps use `Rc`, which is not send; make sure the engine itself
    // doesn't prevent a send-capable embedding.
    static_assertions::assert_impl_all!(Mld<SendDeps>: Send);
}
