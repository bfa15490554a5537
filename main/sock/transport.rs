//! Transport collaborator contract: the socket layer of the underlying
//! TCP/UDP implementation. The stack's helpers and the BSD facade are
//! shape-adapters over this trait.

use std::fmt::Debug;
use std::net::SocketAddr;
use std::time::Duration;

/// Socket handle assigned by the transport layer.
pub type SockId = i32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SockFamily {
    Inet,
    Inet6,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SockType {
    Stream,
    Datagram,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SockProtocol {
    Tcp,
    Udp,
}

/// The transport error taxonomy. The application helpers classify each of
/// these into retry-or-surface behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SockError {
    InitNotComplete,
    NotUsed,
    InvalidSock,
    InvalidType,
    InvalidFamily,
    InvalidProtocol,
    InvalidAddr,
    InvalidAddrLen,
    InvalidOp,
    InvalidState,
    InvalidTime,
    AddrInUse,
    AddrNoneAvail,
    ConnInUse,
    ConnInProgress,
    ConnFail,
    /// A blocking wait (receive queue, accept queue, connect completion)
    /// timed out.
    ConnSignalTimeout,
    NoneAvail,
    PortNbrNoneAvail,
    IfLinkDown,
    Closed,
    ConnClosed,
    /// Receive queue empty on a non-blocking socket.
    RxQEmpty,
    RxQClosed,
    TxQFull,
    /// A datagram was larger than the caller's buffer.
    DataBufOvf,
    Fault,
}

/// Descriptors found ready by [`SockTransport::sel`]. Empty sets mean the
/// wait timed out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelResult {
    pub rd: Vec<SockId>,
    pub wr: Vec<SockId>,
    pub ex: Vec<SockId>,
}

impl SelResult {
    pub fn is_empty(&self) -> bool {
        self.rd.is_empty() && self.wr.is_empty() && self.ex.is_empty()
    }
}

/// The transport socket surface consumed by this crate. Blocking behavior
/// and per-socket timeouts live in the transport; a receive on an empty
/// queue blocks up to the configured receive timeout and then reports
/// [`SockError::ConnSignalTimeout`]. A successful receive always returns at
/// least one byte; end of stream is [`SockError::Closed`].
pub trait SockTransport: Debug + Send {
    fn open(
        &mut self,
        family: SockFamily,
        sock_type: SockType,
        protocol: SockProtocol,
    ) -> Result<SockId, SockError>;

    fn close(&mut self, sock: SockId) -> Result<(), SockError>;

    fn bind(&mut self, sock: SockId, addr: &SocketAddr) -> Result<(), SockError>;

    fn conn(&mut self, sock: SockId, addr: &SocketAddr) -> Result<(), SockError>;

    fn listen(&mut self, sock: SockId, backlog: u16) -> Result<(), SockError>;

    fn accept(&mut self, sock: SockId) -> Result<(SockId, SocketAddr), SockError>;

    /// Receive into `buf`; the source address accompanies datagram reads.
    fn rx_data_from(
        &mut self,
        sock: SockId,
        buf: &mut [u8],
        peek: bool,
    ) -> Result<(usize, Option<SocketAddr>), SockError>;

    /// Transmit from `data`, to `addr` for unconnected datagram sockets.
    fn tx_data_to(
        &mut self,
        sock: SockId,
        data: &[u8],
        addr: Option<&SocketAddr>,
    ) -> Result<usize, SockError>;

    fn timeout_conn_req_ms(&self, sock: SockId) -> Result<u32, SockError>;
    fn set_timeout_conn_req_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError>;
    fn timeout_rx_q_ms(&self, sock: SockId) -> Result<u32, SockError>;
    fn set_timeout_rx_q_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError>;
    fn timeout_tx_q_ms(&self, sock: SockId) -> Result<u32, SockError>;
    /// Unavailable on datagram sockets; reports [`SockError::InvalidType`]
    /// there.
    fn set_timeout_tx_q_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError>;
    fn timeout_conn_accept_ms(&self, sock: SockId) -> Result<u32, SockError>;
    fn set_timeout_conn_accept_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError>;
    fn set_timeout_conn_close_ms(&mut self, sock: SockId, ms: u32) -> Result<(), SockError>;

    fn opt_set(&mut self, sock: SockId, level: i32, name: i32, value: &[u8])
        -> Result<(), SockError>;
    fn opt_get(&self, sock: SockId, level: i32, name: i32) -> Result<Vec<u8>, SockError>;

    /// Wait for readiness on the given descriptor sets. An empty
    /// [`SelResult`] reports a timeout.
    fn sel(
        &mut self,
        rd: &[SockId],
        wr: &[SockId],
        ex: &[SockId],
        timeout: Option<Duration>,
    ) -> Result<SelResult, SockError>;

    fn is_conn(&self, sock: SockId) -> bool;

    fn sock_type(&self, sock: SockId) -> Result<SockType, SockError>;

    /// Raw local connection address: 16-bit big-endian port followed by the
    /// address octets (4 or 16).
    fn local_addr_raw(&self, sock: SockId) -> Result<Vec<u8>, SockError>;

    fn remote_addr_raw(&self, sock: SockId) -> Result<Vec<u8>, SockError>;

    /// Drop all queued receive data and abort any reader blocked on the
    /// socket's receive queue.
    fn rx_q_abort(&mut self, sock: SockId) -> Result<(), SockError>;

    /// Configure blocking behavior for the socket's waits. Transports that
    /// only support blocking sockets can leave the default.
    fn cfg_block(&mut self, sock: SockId, block: bool) -> Result<(), SockError> {
        let _ = (sock, block);
        Ok(())
    }

    fn block_get(&self, sock: SockId) -> Result<bool, SockError> {
        let _ = sock;
        Ok(true)
    }

    /// Enable transport security on the socket. Unavailable unless the
    /// transport ships a TLS layer.
    fn cfg_secure(&mut self, sock: SockId, secure: bool) -> Result<(), SockError> {
        let _ = (sock, secure);
        Err(SockError::InvalidOp)
    }
}

#[cfg(test)]
pub(crate) use mock::{MockTransport, SharedTransport};
