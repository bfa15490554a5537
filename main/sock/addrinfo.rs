//! BSD name resolution: `getaddrinfo`, `getnameinfo` and their supporting
//! well-known-service dictionary and EAI error codes. Forward and reverse
//! host lookups go through the optional DNS collaborator; everything else
//! resolves locally.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use once_cell::sync::Lazy;

use crate::ascii;
use crate::net::Net;
use crate::sock::dns::{DnsFlags, DnsStatus};
use crate::sock::transport::{SockFamily, SockProtocol, SockType};

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct AiFlags: u32 {
        /// Returned addresses are meant for bind + accept; node-less
        /// lookups yield the wildcard address instead of loopback.
        const PASSIVE     = 0x01;
        /// Fill in the canonical name of the host.
        const CANONNAME   = 0x02;
        /// The node must be a numeric address literal; never consult DNS.
        const NUMERICHOST = 0x04;
        /// The service must be a decimal port number.
        const NUMERICSERV = 0x08;
        /// Only return addresses of families configured on this system.
        const ADDRCONFIG  = 0x20;
    }
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct NiFlags: u32 {
        /// Fail if the host name cannot be resolved.
        const NAMEREQD    = 0x01;
        /// The port belongs to a datagram service.
        const DGRAM       = 0x02;
        /// Truncate the resolved name at the first dot.
        const NOFQDN      = 0x04;
        const NUMERICHOST = 0x08;
        const NUMERICSERV = 0x10;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum EaiError {
    AddrFamily = 1,
    Again = 2,
    BadFlags = 3,
    Fail = 4,
    Family = 5,
    Memory = 6,
    NoName = 7,
    Overflow = 8,
    Service = 9,
    SockType = 10,
    System = 11,
}

impl EaiError {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Fixed English text for an EAI code.
pub fn gai_strerror(errcode: i32) -> &'static str {
    match errcode {
        1 => "Address family for hostname not supported.",
        2 => "Temporary failure in name resolution.",
        3 => "Bad value for ai_flags.",
        4 => "Non-recoverable failure in name resolution.",
        5 => "ai_family not supported.",
        6 => "Memory allocation failure.",
        7 => "Name or service not known.",
        8 => "Argument buffer overflow.",
        9 => "Servname not supported for ai_socktype.",
        10 => "ai_socktype not supported.",
        11 => "System error.",
        _ => "Unknown EAI error.",
    }
}

/// Protocol hint of a well-known service; the two-protocol values name the
/// preferred protocol first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServiceProtocol {
    Udp,
    Tcp,
    UdpTcp,
    TcpUdp,
}

impl ServiceProtocol {
    fn preferred(self) -> SockProtocol {
        match self {
            ServiceProtocol::Udp | ServiceProtocol::UdpTcp => SockProtocol::Udp,
            ServiceProtocol::Tcp | ServiceProtocol::TcpUdp => SockProtocol::Tcp,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct ServiceEntry {
    name: &'static str,
    port: u16,
    protocol: ServiceProtocol,
}

/// The well-known services this suite recognizes by name and port.
static SERVICES: &[ServiceEntry] = &[
    ServiceEntry { name: "ftp-data", port: 20, protocol: ServiceProtocol::Tcp },
    ServiceEntry { name: "ftp", port: 21, protocol: ServiceProtocol::Tcp },
    ServiceEntry { name: "telnet", port: 23, protocol: ServiceProtocol::Tcp },
    ServiceEntry { name: "smtp", port: 25, protocol: ServiceProtocol::Tcp },
    ServiceEntry { name: "dns", port: 53, protocol: ServiceProtocol::UdpTcp },
    ServiceEntry { name: "bootps", port: 67, protocol: ServiceProtocol::UdpTcp },
    ServiceEntry { name: "bootpc", port: 68, protocol: ServiceProtocol::UdpTcp },
    ServiceEntry { name: "tftp", port: 69, protocol: ServiceProtocol::Udp },
    ServiceEntry { name: "http", port: 80, protocol: ServiceProtocol::TcpUdp },
    ServiceEntry { name: "ntp", port: 123, protocol: ServiceProtocol::TcpUdp },
    ServiceEntry { name: "snmp", port: 161, protocol: ServiceProtocol::TcpUdp },
    ServiceEntry { name: "https", port: 443, protocol: ServiceProtocol::TcpUdp },
    ServiceEntry { name: "smtps", port: 465, protocol: ServiceProtocol::Tcp },
];

static SERVICES_BY_NAME: Lazy<HashMap<&'static str, &'static ServiceEntry>> =
    Lazy::new(|| SERVICES.iter().map(|e| (e.name, e)).collect());

static SERVICES_BY_PORT: Lazy<HashMap<u16, &'static ServiceEntry>> =
    Lazy::new(|| SERVICES.iter().map(|e| (e.port, e)).collect());

/// Hints narrowing a [`Net::getaddrinfo`] lookup.
#[derive(Clone, Debug, Default)]
pub struct AddrInfoHints {
    pub family: Option<SockFamily>,
    pub sock_type: Option<SockType>,
    pub protocol: Option<SockProtocol>,
    pub flags: AiFlags,
}

/// One resolved address record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrInfo {
    pub family: SockFamily,
    pub sock_addr: SocketAddr,
    pub protocol: Option<SockProtocol>,
    pub canon_name: Option<String>,
}

/// Companion to `getaddrinfo`; the record list frees as one unit.
pub fn freeaddrinfo(res: Vec<AddrInfo>) {
    drop(res);
}

/// Host and service names resolved by [`Net::getnameinfo`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameInfo {
    pub host: Option<String>,
    pub service: Option<String>,
}

fn push_record(
    results: &mut Vec<AddrInfo>,
    ip: IpAddr,
    port: u16,
    protocol: Option<SockProtocol>,
    canon_name: Option<String>,
) {
    let family = match ip {
        IpAddr::V4(_) => SockFamily::Inet,
        IpAddr::V6(_) => SockFamily::Inet6,
    };
    results.push(AddrInfo {
        family,
        sock_addr: SocketAddr::new(ip, port),
        protocol,
        canon_name,
    });
}

impl Net {
    /// Resolve a node name and/or service to a list of address records.
    pub fn getaddrinfo(
        &self,
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&AddrInfoHints>,
    ) -> Result<Vec<AddrInfo>, EaiError> {
        if node.is_none() && service.is_none() {
            return Err(EaiError::NoName);
        }

        let hints = hints.cloned().unwrap_or_default();
        let flags = hints.flags;

        let (mut want_v4, mut want_v6) = match hints.family {
            None => (true, true),
            Some(SockFamily::Inet) => (true, false),
            Some(SockFamily::Inet6) => (false, true),
        };

        if flags.contains(AiFlags::ADDRCONFIG) {
            let Ok(stack) = self.lock("getaddrinfo") else {
                return Err(EaiError::System);
            };
            want_v4 &= stack.iface.ipv4_configured();
            want_v6 &= stack.iface.ipv6_configured();
        }

        let hint_protocol = hints.protocol.or(match hints.sock_type {
            Some(SockType::Stream) => Some(SockProtocol::Tcp),
            Some(SockType::Datagram) => Some(SockProtocol::Udp),
            None => None,
        });

        // Service: dictionary first, decimal port as the fallback.
        let mut service_port: Option<u16> = None;
        let mut service_protocol: Option<ServiceProtocol> = None;
        if let Some(service) = service {
            let numeric_only = flags.contains(AiFlags::NUMERICSERV);

            if !numeric_only {
                if let Some(entry) = SERVICES_BY_NAME.get(service) {
                    service_port = Some(entry.port);
                    service_protocol = Some(entry.protocol);
                }
            }

            if service_port.is_none() {
                match service.parse::<u32>() {
                    Ok(port) if (1..=65535).contains(&port) => {
                        let port = port as u16;
                        service_port = Some(port);
                        service_protocol = SERVICES_BY_PORT.get(&port).map(|e| e.protocol);
                    }
                    Ok(_) => return Err(EaiError::NoName),
                    Err(_) if numeric_only => return Err(EaiError::NoName),
                    Err(_) => return Err(EaiError::Service),
                }
            }
        }

        // Protocol tie-break: hint wins, then the service's preference.
        let protocol = hint_protocol.or(service_protocol.map(ServiceProtocol::preferred));
        let port = service_port.unwrap_or(0);

        let mut results = Vec::new();

        match node {
            None => {
                // No node: wildcard for passive lookups, loopback otherwise,
                // one record per enabled family, IPv6 first.
                let passive = flags.contains(AiFlags::PASSIVE);
                if want_v6 {
                    let ip = if passive {
                        Ipv6Addr::UNSPECIFIED
                    } else {
                        Ipv6Addr::LOCALHOST
                    };
                    push_record(&mut results, IpAddr::V6(ip), port, protocol, None);
                }
                if want_v4 {
                    let ip = if passive {
                        Ipv4Addr::UNSPECIFIED
                    } else {
                        Ipv4Addr::LOCALHOST
                    };
                    push_record(&mut results, IpAddr::V4(ip), port, protocol, None);
                }
            }
            Some(node) => match ascii::str_to_ip(node) {
                Ok(ip) => {
                    let family_ok = match ip {
                        IpAddr::V4(_) => want_v4,
                        IpAddr::V6(_) => want_v6,
                    };
                    if !family_ok {
                        return Err(EaiError::AddrFamily);
                    }
                    push_record(&mut results, ip, port, protocol, None);
                }
                Err(_) if flags.contains(AiFlags::NUMERICHOST) => {
                    return Err(EaiError::NoName);
                }
                Err(_) => {
                    let mut dns_flags = DnsFlags::empty();
                    match (want_v4, want_v6) {
                        (true, true) => {}
                        (true, false) => dns_flags |= DnsFlags::IPV4_ONLY,
                        (false, true) => dns_flags |= DnsFlags::IPV6_ONLY,
                        (false, false) => return Err(EaiError::NoName),
                    }
                    let want_canon = flags.contains(AiFlags::CANONNAME);
                    if want_canon {
                        dns_flags |= DnsFlags::CANON;
                    }

                    let (reply, limit) = {
                        let Ok(mut stack) = self.lock("getaddrinfo") else {
                            return Err(EaiError::System);
                        };
                        let limit = stack.cfg.dns.max_addrs_per_host;
                        let Some(dns) = stack.dns.as_mut() else {
                            return Err(EaiError::Fail);
                        };
                        (dns.get_host(node, limit, dns_flags), limit)
                    };

                    match reply.status {
                        DnsStatus::Resolved => {
                            let canon = if want_canon {
                                reply.canon_name.clone()
                            } else {
                                None
                            };
                            for ip in reply.addrs.into_iter().take(limit) {
                                let family_ok = match ip {
                                    IpAddr::V4(_) => want_v4,
                                    IpAddr::V6(_) => want_v6,
                                };
                                if family_ok {
                                    push_record(&mut results, ip, port, protocol, canon.clone());
                                }
                            }
                        }
                        DnsStatus::Failed => return Err(EaiError::Fail),
                        DnsStatus::Pending | DnsStatus::Unknown | DnsStatus::None => {
                            return Err(EaiError::Again)
                        }
                    }
                }
            },
        }

        if results.is_empty() {
            return Err(EaiError::NoName);
        }

        Ok(results)
    }

    /// Resolve a socket address back to host and service text, the inverse
    /// of [`getaddrinfo`](Self::getaddrinfo).
    pub fn getnameinfo(
        &self,
        addr: &SocketAddr,
        want_host: bool,
        want_service: bool,
        flags: NiFlags,
    ) -> Result<NameInfo, EaiError> {
        if !want_host && !want_service {
            return Err(EaiError::NoName);
        }

        let numeric_host = match addr.ip() {
            IpAddr::V4(v4) => ascii::ipv4_to_str(v4, false),
            IpAddr::V6(v6) => ascii::ipv6_to_str(&v6, true, false),
        };
        let port = addr.port();

        let mut info = NameInfo::default();

        if want_host {
            if flags.contains(NiFlags::NUMERICHOST) {
                info.host = Some(numeric_host.clone());
            } else {
                let mut dns_flags = DnsFlags::REVERSE_LOOKUP;
                dns_flags |= match addr.ip() {
                    IpAddr::V4(_) => DnsFlags::IPV4_ONLY,
                    IpAddr::V6(_) => DnsFlags::IPV6_ONLY,
                };

                let reply = {
                    let Ok(mut stack) = self.lock("getnameinfo") else {
                        return Err(EaiError::System);
                    };
                    let limit = stack.cfg.dns.max_addrs_per_host;
                    stack
                        .dns
                        .as_mut()
                        .map(|dns| dns.get_host(&numeric_host, limit, dns_flags))
                };

                info.host = match reply.map(|r| (r.status, r.canon_name)) {
                    Some((DnsStatus::Resolved | DnsStatus::Unknown, canon)) => {
                        Some(canon.unwrap_or_else(|| numeric_host.clone()))
                    }
                    Some((DnsStatus::Pending | DnsStatus::None, _)) => {
                        return Err(EaiError::Again);
                    }
                    // Resolution failed (or no resolver): numeric text
                    // unless the caller required a name.
                    Some((DnsStatus::Failed, _)) | None => {
                        if flags.contains(NiFlags::NAMEREQD) {
                            return Err(EaiError::NoName);
                        }
                        Some(numeric_host.clone())
                    }
                };
            }

            if flags.contains(NiFlags::NOFQDN) {
                if flags.contains(NiFlags::NUMERICHOST) {
                    return Err(EaiError::NoName);
                }
                if let Some(host) = &mut info.host {
                    if let Some(dot) = host.find('.') {
                        host.truncate(dot);
                    }
                }
            }
        }

        if want_service {
            let mut resolved = None;

            if !flags.contains(NiFlags::NUMERICSERV) {
                if let Some(entry) = SERVICES_BY_PORT.get(&port) {
                    // A datagram lookup of a TCP-only service has no answer.
                    if flags.contains(NiFlags::DGRAM) && entry.protocol == ServiceProtocol::Tcp {
                        return Err(EaiError::NoName);
                    }
                    resolved = Some(entry.name.to_owned());
                }
            }

            info.service = match resolved {
                Some(name) => Some(name),
                None => {
                    if port == 0 {
                        return Err(EaiError::NoName);
                    }
                    Some(port.to_string())
                }
            };
        }

        Ok(info)
    }
}
