//! A self-contained tour of the stack: MLD membership on a mock interface,
//! name resolution, and a datagram echo across the loopback transport
//! through the BSD facade.
//!
//! ```text
//! cargo run --example stack-demo
//! ```

use std::net::Ipv6Addr;
use std::sync::Arc;

use embernet_rs::core::config::NetConfig;
use embernet_rs::net::iface::{IfaceError, IfaceId, IfaceManager, LinkState};
use embernet_rs::net::icmpv6::Icmpv6Tx;
use embernet_rs::sock::addrinfo::{AddrInfoHints, AiFlags};
use embernet_rs::sock::bsd::{Sockaddr, AF_INET, SOCK_DGRAM};
use embernet_rs::sock::loopback::LoopbackTransport;
use embernet_rs::sock::transport::SockType;
use embernet_rs::{Collaborators, Net};

/// One always-up interface with a link-local address.
#[derive(Debug)]
struct DemoIface;

impl IfaceManager for DemoIface {
    fn is_valid(&self, iface: IfaceId) -> bool {
        iface == 1
    }

    fn link_state(&self, _iface: IfaceId) -> LinkState {
        LinkState::Up
    }

    fn link_local_addr(&self, _iface: IfaceId) -> Option<Ipv6Addr> {
        Some("fe80::1".parse().unwrap())
    }

    fn is_host_addr(&self, _addr: &Ipv6Addr) -> bool {
        false
    }

    fn ipv4_configured(&self) -> bool {
        true
    }

    fn ipv6_configured(&self) -> bool {
        true
    }

    fn addr_multicast_add(&self, _iface: IfaceId, _group: Ipv6Addr) -> Result<(), IfaceError> {
        Ok(())
    }

    fn addr_multicast_remove(&self, _iface: IfaceId, _group: Ipv6Addr) {}

    fn link_state_subscribe(&self, _iface: IfaceId) {}

    fn link_state_unsubscribe(&self, _iface: IfaceId) {}
}

/// Prints every ICMPv6 message the MLD engine asks to transmit.
#[derive(Debug)]
struct PrintIcmpv6;

impl Icmpv6Tx for PrintIcmpv6 {
    fn tx_msg_req(
        &self,
        iface: IfaceId,
        msg_type: u8,
        _code: u8,
        src: Ipv6Addr,
        dst: Ipv6Addr,
        hop_limit: u8,
        _ext_hdrs: &[u8],
        _payload: &[u8],
    ) -> Result<(), mld::TransmitError> {
        println!("icmpv6 tx: if {iface} type {msg_type} {src} -> {dst} (hop limit {hop_limit})");
        Ok(())
    }
}

fn main() {
    let net = Net::init(
        NetConfig::default(),
        Collaborators {
            iface: Arc::new(DemoIface),
            icmpv6: Arc::new(PrintIcmpv6),
            transport: Box::new(LoopbackTransport::new()),
            dns: None,
        },
    )
    .expect("stack init");

    // Multicast membership: the join advertises immediately and schedules
    // the unsolicited repeat; the leave advertises the end of membership.
    let group: Ipv6Addr = "ff12::42".parse().unwrap();
    net.mldp_host_grp_join(1, group).expect("join");
    println!(
        "joined {group}; host groups: {:?}, timers: {:?}",
        net.mldp_pool_stats(),
        net.tmr_pool_stats()
    );
    net.mldp_host_grp_leave(1, group).expect("leave");

    // Name resolution for a passive HTTP listener.
    let hints = AddrInfoHints {
        sock_type: Some(SockType::Stream),
        flags: AiFlags::PASSIVE,
        ..Default::default()
    };
    for record in net.getaddrinfo(None, Some("http"), Some(&hints)).unwrap() {
        println!("listen on {}", record.sock_addr);
    }

    // A datagram echo over the loopback transport.
    let server = net.bsd_socket(AF_INET, SOCK_DGRAM, 0);
    let server_addr = Sockaddr::from_socket_addr(&"127.0.0.1:7777".parse().unwrap());
    assert_eq!(net.bsd_bind(server, &server_addr), 0);

    let client = net.bsd_socket(AF_INET, SOCK_DGRAM, 0);
    assert!(net.bsd_sendto(client, b"over the loopback", Some(&server_addr)) > 0);

    let mut buf = [0u8; 64];
    let mut from = Sockaddr::default();
    let n = net.bsd_recvfrom(server, &mut buf, Some(&mut from));
    println!(
        "server received {:?} from {:?}",
        std::str::from_utf8(&buf[..n as usize]).unwrap(),
        from.to_socket_addr().unwrap()
    );
}
