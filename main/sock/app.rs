//! Application socket helpers: the transport calls wrapped in a bounded
//! retry shell with a per-attempt timeout and an inter-attempt delay.
//!
//! Every wrapper follows the same shape: save the socket's configured
//! timeout and install the caller's, attempt the transport call under the
//! global lock, classify the error, and either retry after `time_dly_ms`
//! (transitory errors, up to `retry_max` extra attempts) or surface a
//! coarse [`AppError`]. The saved timeout is restored on every exit path.
//! The delay sleeps run with the lock released.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::net::{Net, Stack};
use crate::sock::transport::{SockError, SockFamily, SockId, SockProtocol, SockType};

/// Coarse error taxonomy surfaced by the helpers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppError {
    /// Transitory resource exhaustion; the retry budget ran out.
    NoneAvail,
    InvalidArg,
    InvalidOp,
    FaultTransitory,
    Fault,
    ConnClosed,
    ConnFail,
    DataBufOvf,
    Rx,
    Tx,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Class {
    Transitory,
    InvalidArg,
    InvalidOp,
    ConnClosed,
    ConnFail,
    BufOvf,
    Fatal,
}

fn classify(err: SockError) -> Class {
    use SockError::*;
    match err {
        InitNotComplete | AddrInUse | AddrNoneAvail | ConnInUse | ConnInProgress
        | ConnSignalTimeout | NoneAvail | PortNbrNoneAvail | IfLinkDown | RxQEmpty | TxQFull => {
            Class::Transitory
        }
        NotUsed | InvalidSock | InvalidType | InvalidFamily | InvalidProtocol | InvalidAddr
        | InvalidAddrLen | InvalidTime => Class::InvalidArg,
        InvalidOp | InvalidState => Class::InvalidOp,
        Closed | ConnClosed | RxQClosed => Class::ConnClosed,
        ConnFail => Class::ConnFail,
        DataBufOvf => Class::BufOvf,
        Fault => Class::Fatal,
    }
}

fn surface(class: Class, transitory: AppError, fatal: AppError) -> AppError {
    match class {
        Class::Transitory => transitory,
        Class::InvalidArg => AppError::InvalidArg,
        Class::InvalidOp => AppError::InvalidOp,
        Class::ConnClosed => AppError::ConnClosed,
        Class::ConnFail => AppError::ConnFail,
        Class::BufOvf => AppError::DataBufOvf,
        Class::Fatal => fatal,
    }
}

/// Errors from installing or restoring a per-socket timeout.
fn timeout_err(err: SockError) -> AppError {
    match err {
        SockError::NotUsed | SockError::InvalidSock | SockError::InvalidTime => AppError::InvalidArg,
        SockError::InitNotComplete => AppError::FaultTransitory,
        _ => AppError::Fault,
    }
}

/// Outcome of [`Net::sock_rx`]: the accumulated byte count is meaningful
/// even when an error ended the loop early.
#[derive(Debug, PartialEq, Eq)]
pub struct SockRxResult {
    pub len: usize,
    /// Source address of the last datagram received, if any.
    pub from: Option<SocketAddr>,
    pub err: Option<AppError>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SockTxResult {
    pub len: usize,
    pub err: Option<AppError>,
}

/// Build a socket address from a raw family, port and address-octet tuple.
pub fn set_sock_addr(family: SockFamily, port: u16, addr: &[u8]) -> Result<SocketAddr, AppError> {
    match family {
        SockFamily::Inet => {
            let octets: [u8; 4] = addr.try_into().map_err(|_| AppError::InvalidArg)?;
            Ok(SocketAddr::from((Ipv4Addr::from(octets), port)))
        }
        SockFamily::Inet6 => {
            let octets: [u8; 16] = addr.try_into().map_err(|_| AppError::InvalidArg)?;
            Ok(SocketAddr::from((Ipv6Addr::from(octets), port)))
        }
    }
}

impl Net {
    /// The common retry shell: run `attempt` under the global lock,
    /// sleeping `time_dly_ms` before each retry of a transitory error.
    fn app_attempts<T>(
        &self,
        token: &'static str,
        retry_max: u16,
        time_dly_ms: u32,
        transitory: AppError,
        fatal: AppError,
        mut attempt: impl FnMut(&mut Stack) -> Result<T, SockError>,
    ) -> Result<T, AppError> {
        let mut retries = 0u16;

        loop {
            if retries > 0 {
                std::thread::sleep(Duration::from_millis(time_dly_ms.into()));
            }

            let result = {
                let mut stack = self.lock(token).map_err(|_| AppError::Fault)?;
                attempt(&mut stack)
            };

            let err = match result {
                Ok(v) => return Ok(v),
                Err(err) => err,
            };

            let class = classify(err);
            if class == Class::Transitory && retries < retry_max {
                retries += 1;
                if let Ok(mut stack) = self.lock(token) {
                    stack.ctrs.sock.app_retry += 1;
                }
                continue;
            }

            log::debug!("{token} failed after {} attempt(s): {err:?}", retries + 1);
            if let Ok(mut stack) = self.lock(token) {
                stack.ctrs.sock.app_fault += 1;
            }
            return Err(surface(class, transitory, fatal));
        }
    }

    fn save_and_set_timeout(
        &self,
        token: &'static str,
        timeout_ms: u32,
        get: impl Fn(&mut Stack) -> Result<u32, SockError>,
        set: impl Fn(&mut Stack, u32) -> Result<(), SockError>,
    ) -> Result<Option<u32>, AppError> {
        if timeout_ms == 0 {
            return Ok(None);
        }

        let mut stack = self.lock(token).map_err(|_| AppError::Fault)?;
        let saved = get(&mut stack).map_err(timeout_err)?;
        set(&mut stack, timeout_ms).map_err(timeout_err)?;
        Ok(Some(saved))
    }

    fn restore_timeout(
        &self,
        token: &'static str,
        saved: Option<u32>,
        set: impl Fn(&mut Stack, u32) -> Result<(), SockError>,
    ) {
        let Some(ms) = saved else {
            return;
        };

        if let Ok(mut stack) = self.lock(token) {
            if set(&mut stack, ms).is_err() {
                stack.ctrs.sock.timeout_restore_skipped += 1;
                log::debug!("saved socket timeout not restored after {token}");
            }
        }
    }

    pub fn sock_open(
        &self,
        family: SockFamily,
        sock_type: SockType,
        protocol: SockProtocol,
        retry_max: u16,
        time_dly_ms: u32,
    ) -> Result<SockId, AppError> {
        self.app_attempts(
            "sock_open",
            retry_max,
            time_dly_ms,
            AppError::NoneAvail,
            AppError::Fault,
            |stack| {
                let sock = stack.transport.open(family, sock_type, protocol)?;
                stack.bsd.register(sock);
                Ok(sock)
            },
        )
    }

    pub fn sock_close(&self, sock: SockId, timeout_ms: u32) -> Result<(), AppError> {
        let mut stack = self.lock("sock_close").map_err(|_| AppError::Fault)?;

        if timeout_ms > 0 {
            if let Err(err) = stack.transport.set_timeout_conn_close_ms(sock, timeout_ms) {
                stack.ctrs.sock.app_fault += 1;
                return Err(timeout_err(err));
            }
        }

        stack.bsd.unregister(sock);

        match stack.transport.close(sock) {
            Ok(()) => Ok(()),
            Err(err) => {
                stack.ctrs.sock.app_fault += 1;
                Err(surface(
                    classify(err),
                    AppError::FaultTransitory,
                    AppError::Fault,
                ))
            }
        }
    }

    pub fn sock_bind(
        &self,
        sock: SockId,
        addr: &SocketAddr,
        retry_max: u16,
        time_dly_ms: u32,
    ) -> Result<(), AppError> {
        self.app_attempts(
            "sock_bind",
            retry_max,
            time_dly_ms,
            AppError::NoneAvail,
            AppError::Fault,
            |stack| stack.transport.bind(sock, addr),
        )
    }

    /// Connect with bounded retries. The caller's `timeout_ms` bounds each
    /// individual attempt; the socket's previously configured connect
    /// timeout is restored before returning.
    pub fn sock_conn(
        &self,
        sock: SockId,
        addr: &SocketAddr,
        retry_max: u16,
        timeout_ms: u32,
        time_dly_ms: u32,
    ) -> Result<(), AppError> {
        let saved = self.save_and_set_timeout(
            "sock_conn",
            timeout_ms,
            |stack| stack.transport.timeout_conn_req_ms(sock),
            |stack, ms| stack.transport.set_timeout_conn_req_ms(sock, ms),
        )?;

        let result = self.app_attempts(
            "sock_conn",
            retry_max,
            time_dly_ms,
            AppError::NoneAvail,
            AppError::Fault,
            |stack| stack.transport.conn(sock, addr),
        );

        self.restore_timeout("sock_conn", saved, |stack, ms| {
            stack.transport.set_timeout_conn_req_ms(sock, ms)
        });

        result
    }

    pub fn sock_listen(&self, sock: SockId, backlog: u16) -> Result<(), AppError> {
        self.app_attempts(
            "sock_listen",
            0,
            0,
            AppError::FaultTransitory,
            AppError::Fault,
            |stack| stack.transport.listen(sock, backlog),
        )
    }

    pub fn sock_accept(
        &self,
        sock: SockId,
        retry_max: u16,
        timeout_ms: u32,
        time_dly_ms: u32,
    ) -> Result<(SockId, SocketAddr), AppError> {
        let saved = self.save_and_set_timeout(
            "sock_accept",
            timeout_ms,
            |stack| stack.transport.timeout_conn_accept_ms(sock),
            |stack, ms| stack.transport.set_timeout_conn_accept_ms(sock, ms),
        )?;

        let result = self.app_attempts(
            "sock_accept",
            retry_max,
            time_dly_ms,
            AppError::NoneAvail,
            AppError::Fault,
            |stack| {
                let (child, peer) = stack.transport.accept(sock)?;
                stack.bsd.register(child);
                Ok((child, peer))
            },
        );

        self.restore_timeout("sock_accept", saved, |stack, ms| {
            stack.transport.set_timeout_conn_accept_ms(sock, ms)
        });

        result
    }

    /// Receive until `rx_th` bytes accumulate (clamped to `[1, buf.len()]`),
    /// the retry budget runs out, or a terminal error occurs. A successful
    /// chunk resets the retry counter.
    #[allow(clippy::too_many_arguments)]
    pub fn sock_rx(
        &self,
        sock: SockId,
        buf: &mut [u8],
        rx_th: usize,
        peek: bool,
        retry_max: u16,
        timeout_ms: u32,
        time_dly_ms: u32,
    ) -> SockRxResult {
        if buf.is_empty() {
            return SockRxResult {
                len: 0,
                from: None,
                err: Some(AppError::InvalidArg),
            };
        }

        let saved = match self.save_and_set_timeout(
            "sock_rx",
            timeout_ms,
            |stack| stack.transport.timeout_rx_q_ms(sock),
            |stack, ms| stack.transport.set_timeout_rx_q_ms(sock, ms),
        ) {
            Ok(saved) => saved,
            Err(err) => {
                return SockRxResult {
                    len: 0,
                    from: None,
                    err: Some(err),
                }
            }
        };

        let th = rx_th.clamp(1, buf.len());
        let mut len = 0usize;
        let mut from = None;
        let mut err = None;
        let mut retries = 0u16;
        let mut dly = false;

        while len < th && retries <= retry_max {
            if dly {
                std::thread::sleep(Duration::from_millis(time_dly_ms.into()));
            }

            let result = match self.lock("sock_rx") {
                Ok(mut stack) => stack.transport.rx_data_from(sock, &mut buf[len..], peek),
                Err(_) => {
                    err = Some(AppError::Fault);
                    break;
                }
            };

            match result {
                Ok((n, src)) => {
                    len += n;
                    if src.is_some() {
                        from = src;
                    }
                    retries = 0;
                    dly = false;
                    err = None;
                }
                Err(e) => match classify(e) {
                    Class::Transitory => {
                        retries += 1;
                        dly = true;
                        err = Some(AppError::FaultTransitory);
                    }
                    class => {
                        err = Some(surface(class, AppError::FaultTransitory, AppError::Rx));
                        break;
                    }
                },
            }
        }

        if len >= th {
            err = None;
        }

        self.restore_timeout("sock_rx", saved, |stack, ms| {
            stack.transport.set_timeout_rx_q_ms(sock, ms)
        });

        if err.is_some() {
            if let Ok(mut stack) = self.lock("sock_rx") {
                stack.ctrs.sock.app_fault += 1;
            }
        }

        SockRxResult { len, from, err }
    }

    /// Transmit the whole of `data`, retrying transitory transmit-queue
    /// exhaustion. Partial progress resets the retry counter.
    pub fn sock_tx(
        &self,
        sock: SockId,
        data: &[u8],
        to: Option<&SocketAddr>,
        retry_max: u16,
        timeout_ms: u32,
        time_dly_ms: u32,
    ) -> SockTxResult {
        let saved = if timeout_ms > 0 {
            let mut stack = match self.lock("sock_tx") {
                Ok(stack) => stack,
                Err(_) => {
                    return SockTxResult {
                        len: 0,
                        err: Some(AppError::Fault),
                    }
                }
            };

            let installed = stack
                .transport
                .timeout_tx_q_ms(sock)
                .and_then(|saved| stack.transport.set_timeout_tx_q_ms(sock, timeout_ms).map(|()| saved));
            match installed {
                Ok(saved) => Some(saved),
                // No transmit-queue timeout on datagram sockets; proceed
                // with nothing to restore.
                Err(SockError::InvalidType) => {
                    stack.ctrs.sock.timeout_restore_skipped += 1;
                    log::debug!("transmit-queue timeout unavailable on socket {sock}");
                    None
                }
                Err(err) => {
                    return SockTxResult {
                        len: 0,
                        err: Some(timeout_err(err)),
                    }
                }
            }
        } else {
            None
        };

        let mut len = 0usize;
        let mut err = None;
        let mut retries = 0u16;
        let mut dly = false;

        while len < data.len() && retries <= retry_max {
            if dly {
                std::thread::sleep(Duration::from_millis(time_dly_ms.into()));
            }

            let result = match self.lock("sock_tx") {
                Ok(mut stack) => stack.transport.tx_data_to(sock, &data[len..], to),
                Err(_) => {
                    err = Some(AppError::Fault);
                    break;
                }
            };

            match result {
                Ok(n) => {
                    len += n;
                    retries = 0;
                    dly = false;
                    err = None;
                }
                Err(e) => match classify(e) {
                    Class::Transitory => {
                        retries += 1;
                        dly = true;
                        err = Some(AppError::FaultTransitory);
                    }
                    class => {
                        err = Some(surface(class, AppError::FaultTransitory, AppError::Tx));
                        break;
                    }
                },
            }
        }

        self.restore_timeout("sock_tx", saved, |stack, ms| {
            stack.transport.set_timeout_tx_q_ms(sock, ms)
        });

        if err.is_some() {
            if let Ok(mut stack) = self.lock("sock_tx") {
                stack.ctrs.sock.app_fault += 1;
            }
        }

        SockTxResult { len, err }
    }

    /// Resolve a host name (or literal) and connect a stream socket to the
    /// first resolved address that accepts, in resolution order.
    pub fn client_stream_open_by_hostname(
        &self,
        host: &str,
        port: u16,
        retry_max: u16,
        timeout_ms: u32,
        time_dly_ms: u32,
    ) -> Result<(SockId, SocketAddr), AppError> {
        let hints = crate::sock::addrinfo::AddrInfoHints {
            sock_type: Some(SockType::Stream),
            ..Default::default()
        };
        let service = port.to_string();
        let service = (port != 0).then_some(service.as_str());

        let records = self
            .getaddrinfo(Some(host), service, Some(&hints))
            .map_err(|err| match err {
                crate::sock::addrinfo::EaiError::Again => AppError::FaultTransitory,
                _ => AppError::Fault,
            })?;

        let mut last = AppError::ConnFail;
        for record in &records {
            match self.client_stream_open(record.sock_addr, retry_max, timeout_ms, time_dly_ms) {
                Ok(sock) => return Ok((sock, record.sock_addr)),
                Err(err) => last = err,
            }
        }

        Err(last)
    }

    /// Open a stream socket and connect it, closing the socket again if the
    /// connect fails.
    pub fn client_stream_open(
        &self,
        remote: SocketAddr,
        retry_max: u16,
        timeout_ms: u32,
        time_dly_ms: u32,
    ) -> Result<SockId, AppError> {
        let family = match remote {
            SocketAddr::V4(_) => SockFamily::Inet,
            SocketAddr::V6(_) => SockFamily::Inet6,
        };

        let sock = self.sock_open(
            family,
            SockType::Stream,
            SockProtocol::Tcp,
            retry_max,
            time_dly_ms,
        )?;

        match self.sock_conn(sock, &remote, retry_max, timeout_ms, time_dly_ms) {
            Ok(()) => Ok(sock),
            Err(err) => {
                let _ = self.sock_close(sock, 0);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::net::testutil::test_net;
    use crate::sock::transport::SockError;

    fn addr() -> SocketAddr {
        "10.0.0.2:80".parse().unwrap()
    }

    #[test]
    fn conn_retries_transitory_error_and_restores_timeout() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        t.transport
            .lock()
            .unwrap()
            .conn_results
            .push_back(Err(SockError::AddrInUse));

        let started = Instant::now();
        t.net.sock_conn(sock, &addr(), 2, 500, 100).unwrap();

        let transport = t.transport.lock().unwrap();
        // Two attempts separated by the configured delay, and the saved
        // timeout reinstalled after the temporary one.
        assert_eq!(transport.conn_attempts, 2);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(transport.timeout_sets, vec![(sock, 500), (sock, 5000)]);
        assert_eq!(*transport.timeout_conn_req.get(&sock).unwrap(), 5000);
    }

    #[test]
    fn conn_gives_up_after_retry_budget() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        for _ in 0..3 {
            t.transport
                .lock()
                .unwrap()
                .conn_results
                .push_back(Err(SockError::AddrInUse));
        }

        assert_eq!(
            t.net.sock_conn(sock, &addr(), 2, 500, 1),
            Err(AppError::NoneAvail)
        );

        let transport = t.transport.lock().unwrap();
        assert_eq!(transport.conn_attempts, 3);
        // Restored even though every attempt failed.
        assert_eq!(transport.timeout_sets.last(), Some(&(sock, 5000)));
        assert_eq!(t.net.counters().sock.app_retry, 2);
        assert_eq!(t.net.counters().sock.app_fault, 1);
    }

    #[test]
    fn conn_invalid_argument_does_not_retry() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        t.transport
            .lock()
            .unwrap()
            .conn_results
            .push_back(Err(SockError::InvalidSock));

        assert_eq!(
            t.net.sock_conn(sock, &addr(), 5, 0, 1),
            Err(AppError::InvalidArg)
        );
        assert_eq!(t.transport.lock().unwrap().conn_attempts, 1);
    }

    #[test]
    fn rx_accumulates_to_threshold() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        {
            let mut transport = t.transport.lock().unwrap();
            transport.rx_results.push_back(Ok((vec![1, 2, 3], None)));
            transport.rx_results.push_back(Ok((vec![4, 5], None)));
        }

        let mut buf = [0u8; 8];
        let result = t.net.sock_rx(sock, &mut buf, 5, false, 0, 0, 0);

        assert_eq!(result.len, 5);
        assert_eq!(result.err, None);
        assert_eq!(&buf[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(t.transport.lock().unwrap().rx_attempts, 2);
    }

    #[test]
    fn rx_partial_data_with_exhausted_retries() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        t.transport
            .lock()
            .unwrap()
            .rx_results
            .push_back(Ok((vec![9, 9, 9], None)));
        // Subsequent attempts hit the mock's default receive timeout.

        let mut buf = [0u8; 8];
        let result = t.net.sock_rx(sock, &mut buf, 8, false, 1, 0, 1);

        assert_eq!(result.len, 3);
        assert_eq!(result.err, Some(AppError::FaultTransitory));
    }

    #[test]
    fn rx_closed_connection_surfaces_immediately() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        t.transport
            .lock()
            .unwrap()
            .rx_results
            .push_back(Err(SockError::Closed));

        let mut buf = [0u8; 8];
        let result = t.net.sock_rx(sock, &mut buf, 1, false, 5, 0, 1);

        assert_eq!(result.len, 0);
        assert_eq!(result.err, Some(AppError::ConnClosed));
        assert_eq!(t.transport.lock().unwrap().rx_attempts, 1);
    }

    #[test]
    fn rx_installs_and_restores_receive_timeout() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        t.transport
            .lock()
            .unwrap()
            .rx_results
            .push_back(Ok((vec![1], None)));

        let mut buf = [0u8; 4];
        let result = t.net.sock_rx(sock, &mut buf, 1, false, 0, 250, 0);

        assert_eq!(result.len, 1);
        let transport = t.transport.lock().unwrap();
        assert_eq!(transport.timeout_sets, vec![(sock, 250), (sock, 5000)]);
    }

    #[test]
    fn tx_retries_queue_exhaustion() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Stream, SockProtocol::Tcp, 0, 0)
            .unwrap();

        {
            let mut transport = t.transport.lock().unwrap();
            transport.tx_results.push_back(Err(SockError::TxQFull));
            transport.tx_results.push_back(Ok(4));
        }

        let result = t.net.sock_tx(sock, &[1, 2, 3, 4], None, 2, 0, 1);
        assert_eq!(result.len, 4);
        assert_eq!(result.err, None);
        assert_eq!(t.transport.lock().unwrap().tx_attempts, 2);
    }

    #[test]
    fn tx_datagram_timeout_is_tolerated() {
        let t = test_net(|_| {});
        let sock = t
            .net
            .sock_open(SockFamily::Inet, SockType::Datagram, SockProtocol::Udp, 0, 0)
            .unwrap();

        let result = t.net.sock_tx(sock, &[1, 2], Some(&addr()), 0, 100, 0);

        // The datagram socket has no transmit-queue timeout; the send still
        // proceeds and the skip is counted.
        assert_eq!(result.len, 2);
        assert_eq!(result.err, None);
        assert_eq!(t.net.counters().sock.timeout_restore_skipped, 1);
    }

    #[test]
    fn client_stream_open_closes_socket_on_connect_failure() {
        let t = test_net(|_| {});

        t.transport
            .lock()
            .unwrap()
            .conn_results
            .push_back(Err(SockError::ConnFail));

        assert_eq!(
            t.net.client_stream_open(addr(), 0, 0, 0),
            Err(AppError::ConnFail)
        );
        assert_eq!(t.transport.lock().unwrap().closed.len(), 1);
    }

    #[test]
    fn open_by_hostname_walks_the_resolved_addresses() {
        let t = test_net(|_| {});

        // The literal resolves to one address; a scripted refusal first
        // proves the close-on-failure path, then a clean run connects.
        t.transport
            .lock()
            .unwrap()
            .conn_results
            .push_back(Err(SockError::ConnFail));
        assert_eq!(
            t.net.client_stream_open_by_hostname("10.0.0.9", 80, 0, 0, 0),
            Err(AppError::ConnFail)
        );
        assert_eq!(t.transport.lock().unwrap().closed.len(), 1);

        let (sock, addr) = t
            .net
            .client_stream_open_by_hostname("10.0.0.9", 80, 0, 0, 0)
            .unwrap();
        assert_eq!(addr, "10.0.0.9:80".parse().unwrap());
        assert!(t.transport.lock().unwrap().connected.contains(&sock));
    }

    #[test]
    fn open_by_hostname_needs_a_resolvable_name() {
        let t = test_net(|_| {});
        // No resolver is wired in, so a non-literal host cannot resolve.
        assert_eq!(
            t.net
                .client_stream_open_by_hostname("server.example.com", 80, 0, 0, 0),
            Err(AppError::Fault)
        );
    }

    #[test]
    fn set_sock_addr_validates_length() {
        assert_eq!(
            set_sock_addr(SockFamily::Inet, 80, &[10, 0, 0, 1]).unwrap(),
            "10.0.0.1:80".parse().unwrap()
        );
        assert_eq!(
            set_sock_addr(SockFamily::Inet, 80, &[10, 0, 0]),
            Err(AppError::InvalidArg)
        );
        let v6 = set_sock_addr(SockFamily::Inet6, 443, &[0u8; 16]).unwrap();
        assert_eq!(v6, "[::]:443".parse().unwrap());
    }
}
