//! An in-memory loopback transport: a [`SockTransport`] whose datagrams
//! and stream bytes never leave the process. Embeddings use it for demos,
//! self-contained tests and single-node deployments without a link layer.
//!
//! The implementation is deliberately non-blocking. The contract's blocking
//! waits (receive queue, accept queue) degenerate to an immediate
//! [`SockError::ConnSignalTimeout`], which the application helpers already
//! classify as transitory and retry; there is no scheduler here to suspend
//! on.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::sock::transport::{
    SelResult, SockError, SockFamily, SockId, SockProtocol, SockTransport, SockType,
};

/// Default per-socket timeout, mirroring the conventional stack default.
const TIMEOUT_DFLT_MS: u32 = 5000;

/// First port handed out when a socket transmits or connects unbound.
const EPHEMERAL_PORT_BASE: u16 = 49152;

/// The biggest datagram the loopback accepts, matching a 16-bit IP
/// datagram minus headers.
const DATAGRAM_MAX: usize = 65_507;

#[derive(Debug, Default)]
struct Timeouts {
    conn_req_ms: Option<u32>,
    rx_q_ms: Option<u32>,
    tx_q_ms: Option<u32>,
    conn_accept_ms: Option<u32>,
}

#[derive(Debug)]
struct LoopSock {
    family: SockFamily,
    sock_type: SockType,
    local: Option<SocketAddr>,
    /// Connected peer socket (streams) or default destination (datagrams).
    peer_addr: Option<SocketAddr>,
    peer_sock: Option<SockId>,
    listening: bool,
    backlog: u16,
    accept_q: VecDeque<SockId>,
    /// Received chunks with their source address.
    rx_q: VecDeque<(Vec<u8>, SocketAddr)>,
    /// No more data will arrive: the peer closed or the read half was
    /// shut down.
    rx_closed: bool,
    blocking: bool,
    timeouts: Timeouts,
    opts: HashMap<(i32, i32), Vec<u8>>,
}

impl LoopSock {
    fn new(family: SockFamily, sock_type: SockType) -> Self {
        Self {
            family,
            sock_type,
            local: None,
            peer_addr: None,
            peer_sock: None,
            listening: false,
            backlog: 0,
            accept_q: VecDeque::new(),
            rx_q: VecDeque::new(),
            rx_closed: false,
            blocking: true,
            timeouts: Timeouts::default(),
            opts: HashMap::new(),
        }
    }

    fn readable(&self) -> bool {
        !self.rx_q.is_empty() || self.rx_closed || !self.accept_q.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct LoopbackTransport {
    socks: HashMap<SockId, LoopSock>,
    next_id: SockId,
    next_ephemeral: u16,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn sock(&self, sock: SockId) -> Result<&LoopSock, SockError> {
        self.socks.get(&sock).ok_or(SockError::InvalidSock)
    }

    fn sock_mut(&mut self, sock: SockId) -> Result<&mut LoopSock, SockError> {
        self.socks.get_mut(&sock).ok_or(SockError::InvalidSock)
    }

    fn addr_in_use(&self, sock_type: SockType, addr: &SocketAddr) -> bool {
        self.socks.values().any(|s| {
            s.sock_type == sock_type
                && s.local.map(|l| l.port()) == Some(addr.port())
                && s.local
                    .map(|l| {
                        l.ip() == addr.ip() || l.ip().is_unspecified() || addr.ip().is_unspecified()
                    })
                    .unwrap_or(false)
        })
    }

    fn wildcard(family: SockFamily) -> IpAddr {
        match family {
            SockFamily::Inet => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SockFamily::Inet6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    fn loopback(family: SockFamily) -> IpAddr {
        match family {
            SockFamily::Inet => IpAddr::V4(Ipv4Addr::LOCALHOST),
            SockFamily::Inet6 => IpAddr::V6(Ipv6Addr::LOCALHOST),
        }
    }

    /// Bind to an ephemeral port when a socket transmits or connects
    /// without an explicit bind.
    fn autobind(&mut self, sock: SockId) -> Result<SocketAddr, SockError> {
        if let Some(local) = self.sock(sock)?.local {
            return Ok(local);
        }

        let family = self.sock(sock)?.family;
        let sock_type = self.sock(sock)?.sock_type;
        let ip = Self::loopback(family);

        for _ in 0..u16::MAX - EPHEMERAL_PORT_BASE {
            let port = EPHEMERAL_PORT_BASE + self.next_ephemeral % (u16::MAX - EPHEMERAL_PORT_BASE);
            self.next_ephemeral = self.next_ephemeral.wrapping_add(1);
            let candidate = SocketAddr::new(ip, port);
            if !self.addr_in_use(sock_type, &candidate) {
                self.sock_mut(sock)?.local = Some(candidate);
                return Ok(candidate);
            }
        }

        Err(SockError::PortNbrNoneAvail)
    }

    /// The socket a datagram addressed to `dst` lands on.
    fn datagram_receiver(&self, dst: &SocketAddr) -> Option<SockId> {
        self.socks
            .iter()
            .find(|(_, s)| {
                s.sock_type == SockType::Datagram
                    && s.local.map(|l| l.port()) == Some(dst.port())
                    && s.local
                        .map(|l| l.ip() == dst.ip() || l.ip().is_unspecified())
                        .unwrap_or(false)
            })
            .map(|(id, _)| *id)
    }

    fn listener_at(&self, dst: &SocketAddr) -> Option<SockId> {
        self.socks
            .iter()
            .find(|(_, s)| {
                s.sock_type == SockType::Stream
                    && s.listening
                    && s.local.map(|l| l.port()) == Some(dst.port())
                    && s.local
                        .map(|l| l.ip() == dst.ip() || l.ip().is_unspecified())
                        .unwrap_or(false)
            })
            .map(|(id, _)| *id)
    }

    /// Timeout-or-empty for a receive on a drained queue.
    fn rx_wait_err(sock: &LoopSock) -> SockError {
        if sock.blocking {
            SockError::ConnSignalTimeout
        } else {
            SockError::RxQEmpty
        }
    }
}

impl SockTransport for LoopbackTransport {
    fn open(
        &mut self,
        family: SockFamily,
        sock_type: SockType,
        protocol: SockProtocol,
    ) -> Result<SockId, SockError> {
        match (sock_type, protocol) {
            (SockType::Stream, SockProtocol::Tcp) | (SockType::Datagram, SockProtocol::Udp) => {}
            _ => return Err(SockError::InvalidProtocol),
        }

        let sock = self.next_id;
        self.next_id += 1;
        self.socks.insert(sock, LoopSock::new(family, sock_type));
        Ok(sock)
    }

    fn close(&mut self, sock: SockId) -> Result<(), SockError> {
        let closed = self.socks.remove(&sock).ok_or(SockError::InvalidSock)?;

        // The stream peer sees end of stream once the queue drains.
        if let Some(peer) = closed.peer_sock {
            if let Some(peer) = self.socks.get_mut(&peer) {
                peer.rx_closed = true;
                peer.peer_sock = None;
            }
        }

        // Children queued but never accepted go with the listener.
        for child in closed.accept_q {
            let _ = self.close(child);
        }

        Ok(())
    }

    fn bind(&mut self, sock: SockId, addr: &SocketAddr) -> Result<(), SockError> {
        if self.sock(sock)?.local.is_some() {
            return Err(SockError::InvalidOp);
        }

        let sock_type = self.sock(sock)?.sock_type;
        let mut addr = *addr;

        if addr.port() == 0 {
            let family = self.sock(sock)?.family;
            self.sock_mut(sock)?.local = None;
            let auto = {
                // Temporarily treat the request as an autobind at the
                // requested address.
                let ip = if addr.ip().is_unspecified() {
                    Self::wildcard(family)
                } else {
                    addr.ip()
                };
                let mut port = None;
                for _ in 0..u16::MAX - EPHEMERAL_PORT_BASE {
                    let p = EPHEMERAL_PORT_BASE
                        + self.next_ephemeral % (u16::MAX - EPHEMERAL_PORT_BASE);
                    self.next_ephemeral = self.next_ephemeral.wrapping_add(1);
                    if !self.addr_in_use(sock_type, &SocketAddr::new(ip, p)) {
                        port = Some(p);
                        break;
                    }
                }
                port.ok_or(SockError::PortNbrNoneAvail)?
            };
            addr.set_port(auto);
        } else if self.addr_in_use(sock_type, &addr) {
            return Err(SockError::AddrInUse);
        }

        self.sock_mut(sock)?.local = Some(addr);
        Ok(())
    }

    fn conn(&mut self, sock: SockId, addr: &SocketAddr) -> Result<(), SockError> {
        match self.sock(sock)?.sock_type {
            // Datagram connect only fixes the default destination.
            SockType::Datagram => {
                self.autobind(sock)?;
                self.sock_mut(sock)?.peer_addr = Some(*addr);
                return Ok(());
            }
            SockType::Stream => {}
        }

        if self.sock(sock)?.peer_sock.is_some() {
            return Err(SockError::ConnInUse);
        }

        let local = self.autobind(sock)?;

        let Some(listener) = self.listener_at(addr) else {
            return Err(SockError::ConnFail);
        };
        if self.socks[&listener].accept_q.len() >= usize::from(self.socks[&listener].backlog) {
            return Err(SockError::ConnFail);
        }

        // Create the passive side of the connection and queue it for
        // accept().
        let family = self.sock(sock)?.family;
        let child_id = self.next_id;
        self.next_id += 1;

        let mut child = LoopSock::new(family, SockType::Stream);
        child.local = Some(*addr);
        child.peer_addr = Some(local);
        child.peer_sock = Some(sock);
        self.socks.insert(child_id, child);

        let caller = self.sock_mut(sock)?;
        caller.peer_addr = Some(*addr);
        caller.peer_sock = Some(child_id);

        self.sock_mut(listener)?.accept_q.push_back(child_id);
        Ok(())
    }

    fn listen(&mut self, sock: SockId, backlog: u16) -> Result<(), SockError> {
        let entry = self.sock_mut(sock)?;
        if entry.sock_type != SockType::Stream {
            return Err(SockError::InvalidType);
        }
        if entry.local.is_none() {
            return Err(SockError::InvalidOp);
        }
        entry.listening = true;
        entry.backlog = backlog.max(1);
        Ok(())
    }

    fn accept(&mut self, sock: SockId) -> Result<(SockId, SocketAddr), SockError> {
        let entry = self.sock_mut(sock)?;
        if !entry.listening {
            return Err(SockError::InvalidOp);
        }
        let Some(child) = entry.accept_q.pop_front() else {
            return Err(SockError::ConnSignalTimeout);
        };
        let peer = self.sock(child)?.peer_addr.ok_or(SockError::Fault)?;
        Ok((child, peer))
    }

    fn rx_data_from(
        &mut self,
        sock: SockId,
        buf: &mut [u8],
        peek: bool,
    ) -> Result<(usize, Option<SocketAddr>), SockError> {
        let sock_type = self.sock(sock)?.sock_type;
        let entry = self.sock_mut(sock)?;

        let Some((chunk, from)) = entry.rx_q.front().cloned() else {
            if entry.rx_closed {
                return Err(SockError::Closed);
            }
            return Err(Self::rx_wait_err(entry));
        };

        match sock_type {
            SockType::Datagram => {
                // A datagram either fits or is dropped with an overflow
                // indication.
                if chunk.len() > buf.len() {
                    entry.rx_q.pop_front();
                    return Err(SockError::DataBufOvf);
                }
                buf[..chunk.len()].copy_from_slice(&chunk);
                if !peek {
                    entry.rx_q.pop_front();
                }
                Ok((chunk.len(), Some(from)))
            }
            SockType::Stream => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if !peek {
                    if n < chunk.len() {
                        entry.rx_q[0].0.drain(..n);
                    } else {
                        entry.rx_q.pop_front();
                    }
                }
                Ok((n, Some(from)))
            }
        }
    }

    fn tx_data_to(
        &mut self,
        sock: SockId,
        data: &[u8],
        addr: Option<&SocketAddr>,
    ) -> Result<usize, SockError> {
        let sock_type = self.sock(sock)?.sock_type;

        match sock_type {
            SockType::Datagram => {
                if data.len() > DATAGRAM_MAX {
                    return Err(SockError::InvalidAddrLen);
                }
                let local = self.autobind(sock)?;
                let dst = match addr.copied().or(self.sock(sock)?.peer_addr) {
                    Some(dst) => dst,
                    None => return Err(SockError::InvalidOp),
                };

                // Undeliverable datagrams vanish, as they would on a wire.
                if let Some(receiver) = self.datagram_receiver(&dst) {
                    self.sock_mut(receiver)?
                        .rx_q
                        .push_back((data.to_vec(), local));
                }
                Ok(data.len())
            }
            SockType::Stream => {
                let local = self.sock(sock)?.local.ok_or(SockError::InvalidOp)?;
                let Some(peer) = self.sock(sock)?.peer_sock else {
                    return Err(SockError::ConnClosed);
                };
                self.sock_mut(peer)?.rx_q.push_back((data.to_vec(), local));
                Ok(data.len())
            }
        }
    }

    fn timeout_conn_req_ms(&self, sock: SockId) -> Result<u32, SockError> {
        Ok(self.sock(sock)?.timeouts.conn_req_ms.unwrap_or(TIMEOUT_DFLT_MS))
    }

    fn set_timeout_conn_req_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError> {
        self.sock_mut(sock)?.timeouts.conn_req_ms = Some(ms);
        Ok(())
    }

    fn timeout_rx_q_ms(&self, sock: SockId) -> Result<u32, SockError> {
        Ok(self.sock(sock)?.timeouts.rx_q_ms.unwrap_or(TIMEOUT_DFLT_MS))
    }

    fn set_timeout_rx_q_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError> {
        self.sock_mut(sock)?.timeouts.rx_q_ms = Some(ms);
        Ok(())
    }

    fn timeout_tx_q_ms(&self, sock: SockId) -> Result<u32, SockError> {
        let entry = self.sock(sock)?;
        if entry.sock_type == SockType::Datagram {
            return Err(SockError::InvalidType);
        }
        Ok(entry.timeouts.tx_q_ms.unwrap_or(TIMEOUT_DFLT_MS))
    }

    fn set_timeout_tx_q_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError> {
        let entry = self.sock_mut(sock)?;
        if entry.sock_type == SockType::Datagram {
            return Err(SockError::InvalidType);
        }
        entry.timeouts.tx_q_ms = Some(ms);
        Ok(())
    }

    fn timeout_conn_accept_ms(&self, sock: SockId) -> Result<u32, SockError> {
        Ok(self
            .sock(sock)?
            .timeouts
            .conn_accept_ms
            .unwrap_or(TIMEOUT_DFLT_MS))
    }

    fn set_timeout_conn_accept_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError> {
        self.sock_mut(sock)?.timeouts.conn_accept_ms = Some(ms);
        Ok(())
    }

    fn set_timeout_conn_close_ms(&mut self, sock: SockId, _ms: u32) -> Result<(), SockError> {
        self.sock(sock)?;
        Ok(())
    }

    fn opt_set(
        &mut self,
        sock: SockId,
        level: i32,
        name: i32,
        value: &[u8],
    ) -> Result<(), SockError> {
        self.sock_mut(sock)?.opts.insert((level, name), value.to_vec());
        Ok(())
    }

    fn opt_get(&self, sock: SockId, level: i32, name: i32) -> Result<Vec<u8>, SockError> {
        self.sock(sock)?
            .opts
            .get(&(level, name))
            .cloned()
            .ok_or(SockError::InvalidOp)
    }

    fn sel(
        &mut self,
        rd: &[SockId],
        wr: &[SockId],
        ex: &[SockId],
        _timeout: Option<Duration>,
    ) -> Result<SelResult, SockError> {
        let mut result = SelResult::default();

        for sock in rd {
            if self.socks.get(sock).map(|s| s.readable()).unwrap_or(false) {
                result.rd.push(*sock);
            }
        }
        // Loopback queues are unbounded, so an open socket can always
        // transmit.
        for sock in wr {
            if self.socks.contains_key(sock) {
                result.wr.push(*sock);
            }
        }
        let _ = ex;

        Ok(result)
    }

    fn is_conn(&self, sock: SockId) -> bool {
        self.socks
            .get(&sock)
            .map(|s| s.peer_sock.is_some() || (s.sock_type == SockType::Datagram && s.peer_addr.is_some()))
            .unwrap_or(false)
    }

    fn sock_type(&self, sock: SockId) -> Result<SockType, SockError> {
        Ok(self.sock(sock)?.sock_type)
    }

    fn local_addr_raw(&self, sock: SockId) -> Result<Vec<u8>, SockError> {
        raw_addr(self.sock(sock)?.local)
    }

    fn remote_addr_raw(&self, sock: SockId) -> Result<Vec<u8>, SockError> {
        raw_addr(self.sock(sock)?.peer_addr)
    }

    fn rx_q_abort(&mut self, sock: SockId) -> Result<(), SockError> {
        let entry = self.sock_mut(sock)?;
        entry.rx_q.clear();
        entry.rx_closed = true;
        Ok(())
    }

    fn cfg_block(&mut self, sock: SockId, block: bool) -> Result<(), SockError> {
        self.sock_mut(sock)?.blocking = block;
        Ok(())
    }

    fn block_get(&self, sock: SockId) -> Result<bool, SockError> {
        Ok(self.sock(sock)?.blocking)
    }
}

fn raw_addr(addr: Option<SocketAddr>) -> Result<Vec<u8>, SockError> {
    let addr = addr.ok_or(SockError::InvalidState)?;
    let mut raw = addr.port().to_be_bytes().to_vec();
    match addr.ip() {
        IpAddr::V4(ip) => raw.extend_from_slice(&ip.octets()),
        IpAddr::V6(ip) => raw.extend_from_slice(&ip.octets()),
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram_pair() -> (LoopbackTransport, SockId, SockId) {
        let mut tp = LoopbackTransport::new();
        let a = tp
            .open(SockFamily::Inet, SockType::Datagram, SockProtocol::Udp)
            .unwrap();
        let b = tp
            .open(SockFamily::Inet, SockType::Datagram, SockProtocol::Udp)
            .unwrap();
        tp.bind(a, &"127.0.0.1:7001".parse().unwrap()).unwrap();
        tp.bind(b, &"127.0.0.1:7002".parse().unwrap()).unwrap();
        (tp, a, b)
    }

    #[test]
    fn datagram_round_trip() {
        let (mut tp, a, b) = datagram_pair();

        let n = tp
            .tx_data_to(a, b"ping", Some(&"127.0.0.1:7002".parse().unwrap()))
            .unwrap();
        assert_eq!(n, 4);

        let mut buf = [0u8; 16];
        let (n, from) = tp.rx_data_from(b, &mut buf, false).unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, Some("127.0.0.1:7001".parse().unwrap()));

        // Queue drained: the blocking wait reports a timeout.
        assert_eq!(
            tp.rx_data_from(b, &mut buf, false),
            Err(SockError::ConnSignalTimeout)
        );
    }

    #[test]
    fn datagram_peek_keeps_the_message() {
        let (mut tp, a, b) = datagram_pair();
        tp.tx_data_to(a, b"x", Some(&"127.0.0.1:7002".parse().unwrap()))
            .unwrap();

        let mut buf = [0u8; 4];
        tp.rx_data_from(b, &mut buf, true).unwrap();
        let (n, _) = tp.rx_data_from(b, &mut buf, false).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn oversized_datagram_is_dropped_with_overflow() {
        let (mut tp, a, b) = datagram_pair();
        tp.tx_data_to(a, &[9u8; 32], Some(&"127.0.0.1:7002".parse().unwrap()))
            .unwrap();

        let mut small = [0u8; 8];
        assert_eq!(
            tp.rx_data_from(b, &mut small, false),
            Err(SockError::DataBufOvf)
        );
        // The offending datagram is gone.
        assert_eq!(
            tp.rx_data_from(b, &mut small, false),
            Err(SockError::ConnSignalTimeout)
        );
    }

    #[test]
    fn bind_conflicts_and_wildcards() {
        let mut tp = LoopbackTransport::new();
        let a = tp
            .open(SockFamily::Inet, SockType::Datagram, SockProtocol::Udp)
            .unwrap();
        let b = tp
            .open(SockFamily::Inet, SockType::Datagram, SockProtocol::Udp)
            .unwrap();

        tp.bind(a, &"0.0.0.0:9000".parse().unwrap()).unwrap();
        assert_eq!(
            tp.bind(b, &"127.0.0.1:9000".parse().unwrap()),
            Err(SockError::AddrInUse)
        );

        // Datagrams to the concrete address land on the wildcard bind.
        let c = tp
            .open(SockFamily::Inet, SockType::Datagram, SockProtocol::Udp)
            .unwrap();
        tp.tx_data_to(c, b"hi", Some(&"127.0.0.1:9000".parse().unwrap()))
            .unwrap();
        let mut buf = [0u8; 4];
        let (n, _) = tp.rx_data_from(a, &mut buf, false).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn stream_connect_accept_and_half_close() {
        let mut tp = LoopbackTransport::new();

        let listener = tp
            .open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp)
            .unwrap();
        tp.bind(listener, &"127.0.0.1:8000".parse().unwrap())
            .unwrap();
        tp.listen(listener, 4).unwrap();

        let client = tp
            .open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp)
            .unwrap();
        tp.conn(client, &"127.0.0.1:8000".parse().unwrap()).unwrap();
        assert!(tp.is_conn(client));

        let (server, peer) = tp.accept(listener).unwrap();
        assert_eq!(peer, tp.sock(client).unwrap().local.unwrap());

        tp.tx_data_to(client, b"hello loopback", None).unwrap();
        let mut buf = [0u8; 5];
        let (n, _) = tp.rx_data_from(server, &mut buf, false).unwrap();
        assert_eq!(&buf[..n], b"hello");
        let mut rest = [0u8; 32];
        let (n, _) = tp.rx_data_from(server, &mut rest, false).unwrap();
        assert_eq!(&rest[..n], b" loopback");

        // Closing the client drains into end-of-stream on the server.
        tp.close(client).unwrap();
        assert_eq!(
            tp.rx_data_from(server, &mut rest, false),
            Err(SockError::Closed)
        );
    }

    #[test]
    fn connect_without_listener_fails() {
        let mut tp = LoopbackTransport::new();
        let client = tp
            .open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp)
            .unwrap();
        assert_eq!(
            tp.conn(client, &"127.0.0.1:8000".parse().unwrap()),
            Err(SockError::ConnFail)
        );
    }

    #[test]
    fn accept_queue_bounded_by_backlog() {
        let mut tp = LoopbackTransport::new();
        let listener = tp
            .open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp)
            .unwrap();
        tp.bind(listener, &"127.0.0.1:8000".parse().unwrap())
            .unwrap();
        tp.listen(listener, 1).unwrap();

        let first = tp
            .open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp)
            .unwrap();
        tp.conn(first, &"127.0.0.1:8000".parse().unwrap()).unwrap();

        let second = tp
            .open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp)
            .unwrap();
        assert_eq!(
            tp.conn(second, &"127.0.0.1:8000".parse().unwrap()),
            Err(SockError::ConnFail)
        );
    }

    #[test]
    fn select_readiness() {
        let (mut tp, a, b) = datagram_pair();

        let ready = tp.sel(&[a, b], &[a], &[], None).unwrap();
        assert!(ready.rd.is_empty());
        assert_eq!(ready.wr, vec![a]);

        tp.tx_data_to(a, b"x", Some(&"127.0.0.1:7002".parse().unwrap()))
            .unwrap();
        let ready = tp.sel(&[a, b], &[], &[], None).unwrap();
        assert_eq!(ready.rd, vec![b]);
    }

    #[test]
    fn rx_abort_discards_queue_and_marks_closed() {
        let (mut tp, a, b) = datagram_pair();
        tp.tx_data_to(a, b"x", Some(&"127.0.0.1:7002".parse().unwrap()))
            .unwrap();

        tp.rx_q_abort(b).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(tp.rx_data_from(b, &mut buf, false), Err(SockError::Closed));
    }

    #[test]
    fn nonblocking_receive_reports_empty_queue() {
        let (mut tp, _a, b) = datagram_pair();
        tp.cfg_block(b, false).unwrap();
        assert!(!tp.block_get(b).unwrap());

        let mut buf = [0u8; 4];
        assert_eq!(tp.rx_data_from(b, &mut buf, false), Err(SockError::RxQEmpty));
    }

    #[test]
    fn raw_addresses_for_the_name_calls() {
        let (tp, a, _b) = datagram_pair();
        let raw = tp.local_addr_raw(a).unwrap();
        assert_eq!(raw, vec![0x1b, 0x59, 127, 0, 0, 1]);
    }
}
