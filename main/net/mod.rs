//! Stack assembly: the global state, the cloneable [`Net`] handle and the
//! initialization sequence.

pub mod iface;
pub mod icmpv6;
pub mod mldp;
pub mod tmr;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use timer_wheel::TimerPool;

use crate::core::config::NetConfig;
use crate::core::counters::NetCtrs;
use crate::core::lock::{GlobalLock, LockError};
use crate::net::iface::IfaceManager;
use crate::net::icmpv6::Icmpv6Tx;
use crate::net::mldp::MldpDeps;
use crate::sock::bsd::BsdState;
use crate::sock::dns::DnsClient;
use crate::sock::transport::SockTransport;

/// The collaborators an embedding wires into the stack: real drivers in
/// production, test doubles under test.
pub struct Collaborators {
    pub iface: Arc<dyn IfaceManager>,
    pub icmpv6: Arc<dyn Icmpv6Tx>,
    pub transport: Box<dyn SockTransport>,
    pub dns: Option<Box<dyn DnsClient>>,
}

/// Everything behind the global network lock.
#[derive(Debug)]
pub(crate) struct Stack {
    pub(crate) cfg: NetConfig,
    pub(crate) mldp: mld::Mld<MldpDeps>,
    pub(crate) iface: Arc<dyn IfaceManager>,
    pub(crate) transport: Box<dyn SockTransport>,
    pub(crate) dns: Option<Box<dyn DnsClient>>,
    pub(crate) bsd: BsdState,
    pub(crate) ctrs: NetCtrs,
    pub(crate) host_name: String,
}

#[derive(Debug)]
pub(crate) struct NetShared {
    pub(crate) lock: GlobalLock<Stack>,
    pub(crate) tmr: Arc<TimerPool<Stack>>,
    pub(crate) stop: AtomicBool,
    tmr_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for NetShared {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(task) = self.tmr_task.lock().ok().and_then(|mut t| t.take()) {
            // The task only holds a weak reference, so it exits within one
            // sweep period.
            let _ = task.join();
        }
    }
}

#[derive(Debug)]
pub enum InitError {
    /// The OS tick rate is below the timer task frequency.
    InvalidFreq,
    InvalidCfg(&'static str),
    TaskCreate(std::io::Error),
}

/// Handle to an initialized network stack. Cloning is cheap; all clones
/// share the same stack, and every public call serializes on the global
/// network lock. The timer task stops when the last handle is dropped.
#[derive(Clone)]
pub struct Net {
    shared: Arc<NetShared>,
}

impl Net {
    /// Build the pools, wire the collaborators together and start the timer
    /// task.
    pub fn init(cfg: NetConfig, collab: Collaborators) -> Result<Net, InitError> {
        if cfg.timer.task_freq_hz == 0 || cfg.timer.os_tick_hz < cfg.timer.task_freq_hz {
            return Err(InitError::InvalidFreq);
        }
        if cfg.timer.pool_capacity == 0 {
            return Err(InitError::InvalidCfg("timer pool capacity is zero"));
        }
        if cfg.mldp.host_grp_capacity == 0 {
            return Err(InitError::InvalidCfg("host group capacity is zero"));
        }

        let period = cfg.timer.period();
        let tmr = Arc::new(TimerPool::new(cfg.timer.pool_capacity));

        let deps = MldpDeps::new(
            Arc::clone(&tmr),
            Arc::clone(&collab.iface),
            Arc::clone(&collab.icmpv6),
            cfg.timer.clone(),
            Xoshiro256PlusPlus::seed_from_u64(cfg.rand_seed),
        );
        let mldp = mld::Mld::new(deps, cfg.mldp.engine_config(), cfg.mldp.host_grp_capacity);

        let stack = Stack {
            host_name: cfg.host_name.clone(),
            mldp,
            iface: collab.iface,
            transport: collab.transport,
            dns: collab.dns,
            bsd: BsdState::default(),
            ctrs: NetCtrs::default(),
            cfg,
        };

        let shared = Arc::new(NetShared {
            lock: GlobalLock::new(stack),
            tmr: Arc::clone(&tmr),
            stop: AtomicBool::new(false),
            tmr_task: Mutex::new(None),
        });

        let task = tmr::spawn_task(&shared, period).map_err(InitError::TaskCreate)?;
        *shared.tmr_task.lock().unwrap() = Some(task);

        log::debug!("network stack initialized");

        Ok(Net { shared })
    }

    pub(crate) fn lock(&self, token: &'static str) -> Result<MutexGuard<'_, Stack>, LockError> {
        self.shared.lock.acquire(token)
    }

    /// Snapshot of the error counter bank.
    pub fn counters(&self) -> NetCtrs {
        match self.lock("counters") {
            Ok(stack) => {
                let mut ctrs = stack.ctrs;
                ctrs.mldp.tx_pkt_discard = stack.mldp.tx_discards();
                ctrs
            }
            Err(_) => NetCtrs::default(),
        }
    }

    /// Occupancy of the timer pool.
    pub fn tmr_pool_stats(&self) -> tmr::PoolStats {
        self.shared.tmr.pool_stats()
    }

    pub fn tmr_pool_stat_reset_max_used(&self) {
        self.shared.tmr.reset_max_used();
    }

    /// Run one timer sweep synchronously, for tests that need deterministic
    /// expiry instead of waiting on the timer task.
    #[cfg(test)]
    pub(crate) fn sweep_once(&self) {
        if let Ok(mut stack) = self.lock("sweep_once") {
            let tmr = Arc::clone(&self.shared.tmr);
            tmr.sweep(&mut stack);
        }
    }
}

// The handle is shared across application threads and with the timer task.
static_assertions::assert_impl_all!(Net: Send, Sync, Clone);

#[cfg(test)]
pub(crate) mod testutil {
    //! Collaborator doubles shared by the unit tests of this crate.

    use std::net::Ipv6Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::iface::{IfaceError, IfaceId, IfaceManager, LinkState};
    use super::icmpv6::Icmpv6Tx;
    use super::{Collaborators, Net, NetConfig};
    use crate::sock::transport::SharedTransport;

    #[derive(Debug)]
    pub(crate) struct MockIface {
        pub link_up: AtomicBool,
        pub link_local: Mutex<Option<Ipv6Addr>>,
        pub ipv4_cfgd: AtomicBool,
        pub ipv6_cfgd: AtomicBool,
        pub mcast: Mutex<Vec<(IfaceId, Ipv6Addr)>>,
    }

    impl Default for MockIface {
        fn default() -> Self {
            Self {
                link_up: AtomicBool::new(true),
                link_local: Mutex::new(Some("fe80::1".parse().unwrap())),
                ipv4_cfgd: AtomicBool::new(true),
                ipv6_cfgd: AtomicBool::new(true),
                mcast: Mutex::new(Vec::new()),
            }
        }
    }

    impl IfaceManager for MockIface {
        fn is_valid(&self, iface: IfaceId) -> bool {
            iface != 0
        }

        fn link_state(&self, _iface: IfaceId) -> LinkState {
            if self.link_up.load(Ordering::Relaxed) {
                LinkState::Up
            } else {
                LinkState::Down
            }
        }

        fn link_local_addr(&self, _iface: IfaceId) -> Option<Ipv6Addr> {
            *self.link_local.lock().unwrap()
        }

        fn is_host_addr(&self, _addr: &Ipv6Addr) -> bool {
            false
        }

        fn ipv4_configured(&self) -> bool {
            self.ipv4_cfgd.load(Ordering::Relaxed)
        }

        fn ipv6_configured(&self) -> bool {
            self.ipv6_cfgd.load(Ordering::Relaxed)
        }

        fn addr_multicast_add(&self, iface: IfaceId, group: Ipv6Addr) -> Result<(), IfaceError> {
            self.mcast.lock().unwrap().push((iface, group));
            Ok(())
        }

        fn addr_multicast_remove(&self, iface: IfaceId, group: Ipv6Addr) {
            self.mcast.lock().unwrap().retain(|e| *e != (iface, group));
        }

        fn link_state_subscribe(&self, _iface: IfaceId) {}

        fn link_state_unsubscribe(&self, _iface: IfaceId) {}
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct SentIcmpv6 {
        pub iface: IfaceId,
        pub msg_type: u8,
        pub src: Ipv6Addr,
        pub dst: Ipv6Addr,
        pub hop_limit: u8,
        pub ext_hdrs: Vec<u8>,
        pub payload: Vec<u8>,
    }

    #[derive(Debug, Default)]
    pub(crate) struct MockIcmpv6 {
        pub sent: Mutex<Vec<SentIcmpv6>>,
    }

    impl Icmpv6Tx for MockIcmpv6 {
        fn tx_msg_req(
            &self,
            iface: IfaceId,
            msg_type: u8,
            _code: u8,
            src: Ipv6Addr,
            dst: Ipv6Addr,
            hop_limit: u8,
            ext_hdrs: &[u8],
            payload: &[u8],
        ) -> Result<(), mld::TransmitError> {
            self.sent.lock().unwrap().push(SentIcmpv6 {
                iface,
                msg_type,
                src,
                dst,
                hop_limit,
                ext_hdrs: ext_hdrs.to_vec(),
                payload: payload.to_vec(),
            });
            Ok(())
        }
    }

    pub(crate) struct TestNet {
        pub net: Net,
        pub iface: Arc<MockIface>,
        pub icmpv6: Arc<MockIcmpv6>,
        pub transport: SharedTransport,
    }

    /// A stack over mock collaborators, with a slow timer task so tests
    /// drive sweeps explicitly.
    pub(crate) fn test_net(configure: impl FnOnce(&mut NetConfig)) -> TestNet {
        build_test_net(None, configure)
    }

    pub(crate) fn test_net_with_dns(
        dns: Box<dyn crate::sock::dns::DnsClient>,
        configure: impl FnOnce(&mut NetConfig),
    ) -> TestNet {
        build_test_net(Some(dns), configure)
    }

    fn build_test_net(
        dns: Option<Box<dyn crate::sock::dns::DnsClient>>,
        configure: impl FnOnce(&mut NetConfig),
    ) -> TestNet {
        let iface = Arc::new(MockIface::default());
        let icmpv6 = Arc::new(MockIcmpv6::default());
        let transport = SharedTransport::default();

        let mut cfg = NetConfig::default();
        cfg.timer.task_freq_hz = 1;
        configure(&mut cfg);

        let net = Net::init(
            cfg,
            Collaborators {
                iface: iface.clone(),
                icmpv6: icmpv6.clone(),
                transport: Box::new(transport.clone()),
                dns,
            },
        )
        .unwrap();

        TestNet {
            net,
            iface,
            icmpv6,
            transport,
        }
    }
}
