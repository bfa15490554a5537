//! The strict BSD-shaped facade: thin adapters over the transport that
//! return `0`/`-1` (or byte counts) and keep their detail in the counter
//! bank, plus the classic `inet_*` text conversions.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::ascii;
use crate::net::Net;
use crate::sock::transport::{SockError, SockFamily, SockId, SockProtocol, SockType};

pub const AF_INET: i32 = 2;
pub const AF_INET6: i32 = 10;

pub const SOCK_STREAM: i32 = 1;
pub const SOCK_DGRAM: i32 = 2;

pub const IPPROTO_TCP: i32 = 6;
pub const IPPROTO_UDP: i32 = 17;

pub const INADDR_ANY: u32 = 0;
pub const INADDR_LOOPBACK: u32 = 0x7F00_0001;
pub const INADDR_NONE: u32 = 0xFFFF_FFFF;

pub const IN6ADDR_ANY_INIT: [u8; 16] = [0; 16];
pub const IN6ADDR_LOOPBACK_INIT: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];

pub const SHUT_RD: i32 = 0;
pub const SHUT_WR: i32 = 1;
pub const SHUT_RDWR: i32 = 2;

/// Up to 64 sockets per descriptor set.
pub const FD_SETSIZE: usize = 64;

/// Length of the raw socket-address data carried in [`Sockaddr`]: 16-bit
/// port, 32-bit flow info (IPv6 only) and up to 16 address octets.
pub const SOCKADDR_DATA_LEN: usize = 22;

/// Raw port-plus-IPv4-address length, the boundary of the family scan in
/// [`Net::bsd_getsockname`].
const RAW_ADDR_LEN_V4: usize = 6;
const RAW_ADDR_LEN_V6: usize = 18;

/// The wire-shaped socket address of the facade: an address family plus
/// the port/address octets in network order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sockaddr {
    pub family: u16,
    pub data: [u8; SOCKADDR_DATA_LEN],
}

impl Default for Sockaddr {
    fn default() -> Self {
        Self {
            family: 0,
            data: [0; SOCKADDR_DATA_LEN],
        }
    }
}

impl Sockaddr {
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        let mut out = Self::default();
        out.data[..2].copy_from_slice(&addr.port().to_be_bytes());
        match addr {
            SocketAddr::V4(v4) => {
                out.family = AF_INET as u16;
                out.data[2..6].copy_from_slice(&v4.ip().octets());
            }
            SocketAddr::V6(v6) => {
                out.family = AF_INET6 as u16;
                out.data[6..22].copy_from_slice(&v6.ip().octets());
            }
        }
        out
    }

    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::from_be_bytes([self.data[0], self.data[1]]);
        if self.family == AF_INET as u16 {
            let octets: [u8; 4] = self.data[2..6].try_into().unwrap();
            Some(SocketAddr::from((Ipv4Addr::from(octets), port)))
        } else if self.family == AF_INET6 as u16 {
            let octets: [u8; 16] = self.data[6..22].try_into().unwrap();
            Some(SocketAddr::from((Ipv6Addr::from(octets), port)))
        } else {
            None
        }
    }
}

/// A select() descriptor set over the first [`FD_SETSIZE`] socket ids.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FdSet {
    bits: u64,
}

impl FdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zero(&mut self) {
        self.bits = 0;
    }

    pub fn set(&mut self, sock: SockId) {
        if (0..FD_SETSIZE as i32).contains(&sock) {
            self.bits |= 1 << sock;
        }
    }

    pub fn clr(&mut self, sock: SockId) {
        if (0..FD_SETSIZE as i32).contains(&sock) {
            self.bits &= !(1 << sock);
        }
    }

    pub fn is_set(&self, sock: SockId) -> bool {
        (0..FD_SETSIZE as i32).contains(&sock) && self.bits & (1 << sock) != 0
    }

    fn ids_below(&self, nfds: i32) -> Vec<SockId> {
        (0..nfds.clamp(0, FD_SETSIZE as i32))
            .filter(|sock| self.is_set(*sock))
            .collect()
    }

    fn assign(&mut self, ids: &[SockId]) {
        self.zero();
        for sock in ids {
            self.set(*sock);
        }
    }
}

/// Read/write shutdown progression of a stream socket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ShutdownMode {
    None,
    Rd,
    Wr,
    RdWr,
}

impl ShutdownMode {
    fn from_how(how: i32) -> Option<Self> {
        match how {
            SHUT_RD => Some(Self::Rd),
            SHUT_WR => Some(Self::Wr),
            SHUT_RDWR => Some(Self::RdWr),
            _ => None,
        }
    }
}

/// Facade-level socket bookkeeping, keyed by transport socket id.
#[derive(Debug, Default)]
pub(crate) struct BsdState {
    shutdown: HashMap<SockId, ShutdownMode>,
}

impl BsdState {
    pub(crate) fn register(&mut self, sock: SockId) {
        self.shutdown.insert(sock, ShutdownMode::None);
    }

    pub(crate) fn unregister(&mut self, sock: SockId) {
        self.shutdown.remove(&sock);
    }

    fn mode(&self, sock: SockId) -> ShutdownMode {
        *self.shutdown.get(&sock).unwrap_or(&ShutdownMode::None)
    }

    fn set_mode(&mut self, sock: SockId, mode: ShutdownMode) {
        self.shutdown.insert(sock, mode);
    }
}

impl Net {
    fn bsd_fault(&self) -> i32 {
        if let Ok(mut stack) = self.lock("bsd_fault") {
            stack.ctrs.bsd.fault += 1;
        }
        -1
    }

    pub fn bsd_socket(&self, family: i32, sock_type: i32, protocol: i32) -> i32 {
        let family = match family {
            AF_INET => SockFamily::Inet,
            AF_INET6 => SockFamily::Inet6,
            _ => return self.bsd_fault(),
        };
        let (sock_type, dflt_proto) = match sock_type {
            SOCK_STREAM => (SockType::Stream, SockProtocol::Tcp),
            SOCK_DGRAM => (SockType::Datagram, SockProtocol::Udp),
            _ => return self.bsd_fault(),
        };
        let protocol = match (protocol, dflt_proto) {
            (0, dflt) => dflt,
            (IPPROTO_TCP, SockProtocol::Tcp) => SockProtocol::Tcp,
            (IPPROTO_UDP, SockProtocol::Udp) => SockProtocol::Udp,
            _ => return self.bsd_fault(),
        };

        let Ok(mut stack) = self.lock("socket") else {
            return -1;
        };
        match stack.transport.open(family, sock_type, protocol) {
            Ok(sock) => {
                stack.bsd.register(sock);
                sock
            }
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_close(&self, sock: SockId) -> i32 {
        let Ok(mut stack) = self.lock("close") else {
            return -1;
        };
        stack.bsd.unregister(sock);
        match stack.transport.close(sock) {
            Ok(()) => 0,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_bind(&self, sock: SockId, addr: &Sockaddr) -> i32 {
        let Some(addr) = addr.to_socket_addr() else {
            return self.bsd_fault();
        };
        let Ok(mut stack) = self.lock("bind") else {
            return -1;
        };
        match stack.transport.bind(sock, &addr) {
            Ok(()) => 0,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_connect(&self, sock: SockId, addr: &Sockaddr) -> i32 {
        let Some(addr) = addr.to_socket_addr() else {
            return self.bsd_fault();
        };
        let Ok(mut stack) = self.lock("connect") else {
            return -1;
        };
        match stack.transport.conn(sock, &addr) {
            Ok(()) => 0,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_listen(&self, sock: SockId, backlog: i32) -> i32 {
        let Ok(backlog) = u16::try_from(backlog) else {
            return self.bsd_fault();
        };
        let Ok(mut stack) = self.lock("listen") else {
            return -1;
        };
        match stack.transport.listen(sock, backlog) {
            Ok(()) => 0,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_accept(&self, sock: SockId, addr_out: Option<&mut Sockaddr>) -> i32 {
        let Ok(mut stack) = self.lock("accept") else {
            return -1;
        };
        match stack.transport.accept(sock) {
            Ok((child, peer)) => {
                stack.bsd.register(child);
                if let Some(out) = addr_out {
                    *out = Sockaddr::from_socket_addr(&peer);
                }
                child
            }
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_recv(&self, sock: SockId, buf: &mut [u8]) -> isize {
        self.bsd_recvfrom(sock, buf, None)
    }

    pub fn bsd_recvfrom(
        &self,
        sock: SockId,
        buf: &mut [u8],
        addr_out: Option<&mut Sockaddr>,
    ) -> isize {
        let Ok(mut stack) = self.lock("recvfrom") else {
            return -1;
        };
        match stack.transport.rx_data_from(sock, buf, false) {
            Ok((n, from)) => {
                if let (Some(out), Some(from)) = (addr_out, from) {
                    *out = Sockaddr::from_socket_addr(&from);
                }
                n as isize
            }
            // An orderly peer shutdown reads as end of stream.
            Err(SockError::Closed | SockError::ConnClosed | SockError::RxQClosed) => 0,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_send(&self, sock: SockId, data: &[u8]) -> isize {
        self.bsd_sendto(sock, data, None)
    }

    pub fn bsd_sendto(&self, sock: SockId, data: &[u8], addr: Option<&Sockaddr>) -> isize {
        let to = match addr {
            Some(addr) => match addr.to_socket_addr() {
                Some(to) => Some(to),
                None => return self.bsd_fault() as isize,
            },
            None => None,
        };
        let Ok(mut stack) = self.lock("sendto") else {
            return -1;
        };
        match stack.transport.tx_data_to(sock, data, to.as_ref()) {
            Ok(n) => n as isize,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    pub fn bsd_setsockopt(&self, sock: SockId, level: i32, name: i32, value: &[u8]) -> i32 {
        let Ok(mut stack) = self.lock("setsockopt") else {
            return -1;
        };
        match stack.transport.opt_set(sock, level, name, value) {
            Ok(()) => 0,
            Err(_) => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    /// Copies the option value into `buf`; returns the value length, or -1.
    pub fn bsd_getsockopt(&self, sock: SockId, level: i32, name: i32, buf: &mut [u8]) -> i32 {
        let Ok(mut stack) = self.lock("getsockopt") else {
            return -1;
        };
        match stack.transport.opt_get(sock, level, name) {
            Ok(value) if value.len() <= buf.len() => {
                buf[..value.len()].copy_from_slice(&value);
                value.len() as i32
            }
            _ => {
                stack.ctrs.bsd.fault += 1;
                -1
            }
        }
    }

    /// Wait for readiness on the descriptors below `nfds` in the given
    /// sets. Ready descriptors are written back in place; on timeout all
    /// sets are cleared and 0 is returned.
    pub fn bsd_select(
        &self,
        nfds: i32,
        rd: Option<&mut FdSet>,
        wr: Option<&mut FdSet>,
        ex: Option<&mut FdSet>,
        timeout: Option<Duration>,
    ) -> i32 {
        let rd_ids = rd.as_ref().map(|s| s.ids_below(nfds)).unwrap_or_default();
        let wr_ids = wr.as_ref().map(|s| s.ids_below(nfds)).unwrap_or_default();
        let ex_ids = ex.as_ref().map(|s| s.ids_below(nfds)).unwrap_or_default();

        let result = {
            let Ok(mut stack) = self.lock("select") else {
                return -1;
            };
            stack.transport.sel(&rd_ids, &wr_ids, &ex_ids, timeout)
        };

        match result {
            Ok(ready) => {
                let count = (ready.rd.len() + ready.wr.len() + ready.ex.len()) as i32;
                if let Some(set) = rd {
                    set.assign(&ready.rd);
                }
                if let Some(set) = wr {
                    set.assign(&ready.wr);
                }
                if let Some(set) = ex {
                    set.assign(&ready.ex);
                }
                count
            }
            Err(_) => self.bsd_fault(),
        }
    }

    /// Shut down one or both halves of a connected stream socket. The read
    /// half drops queued data and aborts a blocked reader; the write half
    /// (and a full shutdown) proceeds to close. Repeating a direction, or
    /// shutting an already fully-shut socket, fails.
    pub fn bsd_shutdown(&self, sock: SockId, how: i32) -> i32 {
        let Some(mode) = ShutdownMode::from_how(how) else {
            return self.bsd_fault();
        };

        let Ok(mut stack) = self.lock("shutdown") else {
            return -1;
        };

        if !stack.transport.is_conn(sock) {
            stack.ctrs.bsd.fault += 1;
            return -1;
        }
        if stack.transport.sock_type(sock) != Ok(SockType::Stream) {
            stack.ctrs.bsd.fault += 1;
            return -1;
        }

        let cur = stack.bsd.mode(sock);
        let allowed = match (cur, mode) {
            (ShutdownMode::None, _) => true,
            (ShutdownMode::Rd, ShutdownMode::Wr | ShutdownMode::RdWr) => true,
            (ShutdownMode::Wr, ShutdownMode::Rd | ShutdownMode::RdWr) => true,
            _ => false,
        };
        if !allowed {
            stack.ctrs.bsd.fault += 1;
            return -1;
        }

        stack.bsd.set_mode(sock, mode);

        match (cur, mode) {
            (ShutdownMode::None, ShutdownMode::Rd) => {
                // Keep the connection's transmit side; only the receive
                // queue is torn down.
                if stack.transport.rx_q_abort(sock).is_err() {
                    stack.ctrs.bsd.fault += 1;
                    return -1;
                }
            }
            _ => {
                // Write-half and full shutdowns close the connection.
                stack.bsd.unregister(sock);
                if stack.transport.close(sock).is_err() {
                    stack.ctrs.bsd.fault += 1;
                    return -1;
                }
            }
        }

        0
    }

    pub fn bsd_getsockname(&self, sock: SockId, addr_out: &mut Sockaddr) -> i32 {
        let raw = {
            let Ok(stack) = self.lock("getsockname") else {
                return -1;
            };
            stack.transport.local_addr_raw(sock)
        };
        match raw {
            Ok(raw) => sockaddr_from_raw(&raw, addr_out),
            Err(_) => self.bsd_fault(),
        }
    }

    pub fn bsd_getpeername(&self, sock: SockId, addr_out: &mut Sockaddr) -> i32 {
        let raw = {
            let Ok(stack) = self.lock("getpeername") else {
                return -1;
            };
            stack.transport.remote_addr_raw(sock)
        };
        match raw {
            Ok(raw) => sockaddr_from_raw(&raw, addr_out),
            Err(_) => self.bsd_fault(),
        }
    }

    pub fn bsd_gethostname(&self) -> String {
        self.lock("gethostname")
            .map(|stack| stack.host_name.clone())
            .unwrap_or_default()
    }

    pub fn bsd_sethostname(&self, name: &str) -> i32 {
        let Ok(mut stack) = self.lock("sethostname") else {
            return -1;
        };
        if name.is_empty() || name.len() > stack.cfg.dns.host_name_len_max {
            stack.ctrs.bsd.fault += 1;
            return -1;
        }
        stack.host_name = name.to_owned();
        0
    }
}

/// Populate a [`Sockaddr`] from raw connection address bytes (16-bit
/// big-endian port followed by the address octets), inferring the family
/// by scanning for a non-zero span beyond the IPv4 length.
fn sockaddr_from_raw(raw: &[u8], addr_out: &mut Sockaddr) -> i32 {
    if raw.len() < RAW_ADDR_LEN_V4 {
        return -1;
    }

    let v6 = raw.len() >= RAW_ADDR_LEN_V6 && raw[RAW_ADDR_LEN_V4..].iter().any(|b| *b != 0);

    *addr_out = Sockaddr::default();
    addr_out.data[..2].copy_from_slice(&raw[..2]);
    if v6 {
        addr_out.family = AF_INET6 as u16;
        addr_out.data[6..22].copy_from_slice(&raw[2..18]);
    } else {
        addr_out.family = AF_INET as u16;
        addr_out.data[2..6].copy_from_slice(&raw[2..6]);
    }

    0
}

/// `inet_addr`: dotted-decimal text to a big-endian address value, or
/// [`INADDR_NONE`] on any parse failure.
pub fn inet_addr(s: &str) -> u32 {
    inet_aton(s).unwrap_or(INADDR_NONE)
}

/// `inet_aton`: like [`inet_addr`], but failure is distinguishable from
/// `255.255.255.255`.
pub fn inet_aton(s: &str) -> Option<u32> {
    ascii::str_to_ipv4(s).ok().map(u32::from)
}

pub fn inet_ntoa(addr: u32) -> String {
    ascii::ipv4_to_str(Ipv4Addr::from(addr), false)
}

pub fn inet_pton(family: i32, s: &str) -> Option<IpAddr> {
    match family {
        AF_INET => ascii::str_to_ipv4(s).ok().map(IpAddr::V4),
        AF_INET6 => ascii::str_to_ipv6(s).ok().map(IpAddr::V6),
        _ => None,
    }
}

pub fn inet_ntop(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => ascii::ipv4_to_str(*v4, false),
        IpAddr::V6(v6) => ascii::ipv6_to_str(v6, true, false),
    }
}
