//! Text forms of MAC, IPv4 and IPv6 addresses.
//!
//! The IPv4 parser implements the full classic `inet_addr` family of forms
//! (`a`, `a.b`, `a.b.c`, `a.b.c.d`) with the per-form maxima those forms
//! imply. The IPv6 parser accepts colon-separated hex groups with at most
//! one `::` elision; a leading or trailing lone colon (including `":::"`)
//! is rejected.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AsciiError {
    /// Wrong overall shape: too many parts, too few groups, empty string.
    InvalidStrLen,
    /// A character outside the address alphabet.
    InvalidChar,
    /// Too many digits in one part.
    InvalidCharLen,
    /// A part overflows its widest possible value.
    InvalidCharVal,
    /// Misplaced separator: leading, trailing or doubled.
    InvalidCharSeq,
    /// A part exceeds the maximum for its position in the chosen form.
    InvalidPartLen,
}

/// Parse six hex octets separated consistently by `-` or `:`. Each octet
/// may be one or two digits.
pub fn str_to_mac(s: &str) -> Result<[u8; 6], AsciiError> {
    let sep = match s.chars().find(|c| *c == '-' || *c == ':') {
        Some(sep) => sep,
        None => return Err(AsciiError::InvalidStrLen),
    };
    let other = if sep == '-' { ':' } else { '-' };
    if s.contains(other) {
        return Err(AsciiError::InvalidCharSeq);
    }

    let mut mac = [0u8; 6];
    let mut count = 0;

    for (i, part) in s.split(sep).enumerate() {
        if i >= 6 {
            return Err(AsciiError::InvalidStrLen);
        }
        if part.is_empty() {
            return Err(AsciiError::InvalidCharSeq);
        }
        if part.len() > 2 {
            return Err(AsciiError::InvalidCharLen);
        }
        if !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AsciiError::InvalidChar);
        }
        mac[i] = u8::from_str_radix(part, 16).map_err(|_| AsciiError::InvalidChar)?;
        count += 1;
    }

    if count != 6 {
        return Err(AsciiError::InvalidStrLen);
    }

    Ok(mac)
}

pub fn mac_to_str(mac: &[u8; 6], lowercase: bool, colon_sep: bool) -> String {
    let sep = if colon_sep { ":" } else { "-" };
    let parts: Vec<String> = mac
        .iter()
        .map(|octet| {
            if lowercase {
                format!("{octet:02x}")
            } else {
                format!("{octet:02X}")
            }
        })
        .collect();
    parts.join(sep)
}

/// Maximum total value per dotted form, indexed by the number of dots.
const FORM_MAX: [u64; 4] = [u32::MAX as u64, 0xFF_FFFF, 0xFFFF, 0xFF];

/// Parse the classic dotted-decimal forms. With fewer than four parts the
/// last part fills all remaining octets, so `"192.168.320"` is the same
/// address as `"192.168.1.64"`.
pub fn str_to_ipv4(s: &str) -> Result<Ipv4Addr, AsciiError> {
    if s.is_empty() {
        return Err(AsciiError::InvalidStrLen);
    }

    let mut parts = [0u64; 4];
    let mut dots = 0usize;
    let mut digits = 0u32;
    let mut prev: Option<char> = None;

    for ch in s.chars() {
        match ch {
            '0'..='9' => {
                digits += 1;
                if digits > 10 {
                    return Err(AsciiError::InvalidCharLen);
                }
                parts[dots] = parts[dots] * 10 + u64::from(ch as u8 - b'0');
                if parts[dots] > u64::from(u32::MAX) {
                    return Err(AsciiError::InvalidCharVal);
                }
            }
            '.' => {
                if prev.is_none() || prev == Some('.') {
                    return Err(AsciiError::InvalidCharSeq);
                }
                dots += 1;
                if dots >= 4 {
                    return Err(AsciiError::InvalidStrLen);
                }
                digits = 0;
            }
            _ => return Err(AsciiError::InvalidChar),
        }
        prev = Some(ch);
    }

    if prev == Some('.') {
        return Err(AsciiError::InvalidCharSeq);
    }

    // Leading parts are single octets; the last part may span the rest.
    for part in parts.iter().take(dots) {
        if *part > 0xFF {
            return Err(AsciiError::InvalidPartLen);
        }
    }
    if parts[dots] > FORM_MAX[dots] {
        return Err(AsciiError::InvalidPartLen);
    }

    let mut addr: u32 = 0;
    for (i, part) in parts.iter().take(dots).enumerate() {
        addr |= (*part as u32) << (24 - 8 * i as u32);
    }
    addr |= parts[dots] as u32;

    Ok(Ipv4Addr::from(addr))
}

pub fn ipv4_to_str(addr: Ipv4Addr, lead_zeros: bool) -> String {
    let octets = addr.octets();
    if lead_zeros {
        format!(
            "{:03}.{:03}.{:03}.{:03}",
            octets[0], octets[1], octets[2], octets[3]
        )
    } else {
        format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
    }
}

/// Parse colon-separated hex groups with at most one `::` elision. Groups
/// shorter than four digits are zero-extended.
pub fn str_to_ipv6(s: &str) -> Result<Ipv6Addr, AsciiError> {
    if s.is_empty() {
        return Err(AsciiError::InvalidStrLen);
    }

    let mut segments = [0u16; 8];

    match s.find("::") {
        Some(pos) => {
            let head = &s[..pos];
            let tail = &s[pos + 2..];
            if tail.contains("::") {
                return Err(AsciiError::InvalidCharSeq);
            }

            let head_groups = parse_groups(head)?;
            let tail_groups = parse_groups(tail)?;
            if head_groups.len() + tail_groups.len() >= 8 {
                return Err(AsciiError::InvalidStrLen);
            }

            segments[..head_groups.len()].copy_from_slice(&head_groups);
            segments[8 - tail_groups.len()..].copy_from_slice(&tail_groups);
        }
        None => {
            let groups = parse_groups(s)?;
            if groups.len() != 8 {
                return Err(AsciiError::InvalidStrLen);
            }
            segments.copy_from_slice(&groups);
        }
    }

    Ok(Ipv6Addr::new(
        segments[0],
        segments[1],
        segments[2],
        segments[3],
        segments[4],
        segments[5],
        segments[6],
        segments[7],
    ))
}

fn parse_groups(s: &str) -> Result<Vec<u16>, AsciiError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }

    s.split(':')
        .map(|group| {
            if group.is_empty() {
                // A lone colon at either end, or a third ':' of ":::".
                return Err(AsciiError::InvalidCharSeq);
            }
            if group.len() > 4 {
                return Err(AsciiError::InvalidCharLen);
            }
            if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(AsciiError::InvalidChar);
            }
            u16::from_str_radix(group, 16).map_err(|_| AsciiError::InvalidChar)
        })
        .collect()
}

/// Full eight-group form, no `::` compression.
pub fn ipv6_to_str(addr: &Ipv6Addr, lowercase: bool, lead_zeros: bool) -> String {
    let parts: Vec<String> = addr
        .segments()
        .iter()
        .map(|group| match (lowercase, lead_zeros) {
            (true, true) => format!("{group:04x}"),
            (true, false) => format!("{group:x}"),
            (false, true) => format!("{group:04X}"),
            (false, false) => format!("{group:X}"),
        })
        .collect();
    parts.join(":")
}

/// Parse either family, deciding by the first separator found. The literal
/// `"localhost"` resolves to the IPv4 loopback.
pub fn str_to_ip(s: &str) -> Result<IpAddr, AsciiError> {
    if s == "localhost" {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    match s.chars().find(|c| *c == '.' || *c == ':') {
        Some('.') => str_to_ipv4(s).map(IpAddr::V4),
        Some(':') => str_to_ipv6(s).map(IpAddr::V6),
        _ => {
            // A bare decimal number is still a valid single-part IPv4 form.
            str_to_ipv4(s).map(IpAddr::V4)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_canonical_form() {
        assert_eq!(str_to_ipv4("0.0.0.0").unwrap(), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(
            str_to_ipv4("255.255.255.255").unwrap(),
            Ipv4Addr::new(255, 255, 255, 255)
        );
        assert_eq!(
            str_to_ipv4("192.168.1.64").unwrap(),
            Ipv4Addr::new(192, 168, 1, 64)
        );
    }

    #[test]
    fn ipv4_short_forms() {
        // Three-part: last part spans two octets.
        assert_eq!(
            str_to_ipv4("192.168.320").unwrap(),
            Ipv4Addr::new(192, 168, 1, 64)
        );
        // Two-part: last part spans three octets.
        assert_eq!(
            str_to_ipv4("192.11010368").unwrap(),
            Ipv4Addr::new(192, 168, 1, 64)
        );
        // One part: the whole address.
        assert_eq!(
            str_to_ipv4("3232235840").unwrap(),
            Ipv4Addr::new(192, 168, 1, 64)
        );
        assert_eq!(str_to_ipv4("255.16777215").unwrap(), Ipv4Addr::new(255, 255, 255, 255));
    }

    #[test]
    fn ipv4_error_split() {
        assert_eq!(str_to_ipv4("1.2.3.4.5"), Err(AsciiError::InvalidStrLen));
        assert_eq!(str_to_ipv4("1..2.3"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_ipv4(".1.2.3"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_ipv4("1.2.3."), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_ipv4("256.1.1.1"), Err(AsciiError::InvalidPartLen));
        assert_eq!(str_to_ipv4("1.2.3.x"), Err(AsciiError::InvalidChar));
        assert_eq!(str_to_ipv4(""), Err(AsciiError::InvalidStrLen));
        // 2^32 overflows the single-part form.
        assert_eq!(str_to_ipv4("4294967296"), Err(AsciiError::InvalidCharVal));
        assert_eq!(str_to_ipv4("00000000001"), Err(AsciiError::InvalidCharLen));
    }

    #[test]
    fn ipv4_round_trip() {
        for text in ["0.0.0.0", "127.0.0.1", "192.168.1.64", "255.255.255.255"] {
            assert_eq!(ipv4_to_str(str_to_ipv4(text).unwrap(), false), text);
        }
        assert_eq!(
            ipv4_to_str(Ipv4Addr::new(10, 0, 0, 1), true),
            "010.000.000.001"
        );
    }

    #[test]
    fn ipv6_basic_forms() {
        assert_eq!(str_to_ipv6("::").unwrap(), Ipv6Addr::UNSPECIFIED);
        assert_eq!(str_to_ipv6("::1").unwrap(), Ipv6Addr::LOCALHOST);
        assert_eq!(
            str_to_ipv6("fe80::1").unwrap(),
            Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)
        );
        assert_eq!(
            str_to_ipv6("1:2:3:4:5:6:7:8").unwrap(),
            Ipv6Addr::new(1, 2, 3, 4, 5, 6, 7, 8)
        );
        assert_eq!(
            str_to_ipv6("2001:db8::8:800:200C:417A").unwrap(),
            Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0x8, 0x800, 0x200c, 0x417a)
        );
        // Leading-zero-short groups zero-extend.
        assert_eq!(
            str_to_ipv6("fe80:0:0:0:0:0:0:1").unwrap(),
            Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)
        );
        // Elision standing for a single group.
        assert_eq!(
            str_to_ipv6("1:2:3:4:5:6:7::").unwrap(),
            Ipv6Addr::new(1, 2, 3, 4, 5, 6, 7, 0)
        );
    }

    #[test]
    fn ipv6_rejects_malformed() {
        assert_eq!(str_to_ipv6(":::1"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_ipv6(":1:2:3:4:5:6:7:8"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_ipv6("1:2:3"), Err(AsciiError::InvalidStrLen));
        assert_eq!(str_to_ipv6("1::2::3"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_ipv6("1:2:3:4:5:6:7:8:9"), Err(AsciiError::InvalidStrLen));
        assert_eq!(
            str_to_ipv6("1:2:3:4:5:6:7::8"),
            Err(AsciiError::InvalidStrLen)
        );
        assert_eq!(str_to_ipv6("12345::"), Err(AsciiError::InvalidCharLen));
        assert_eq!(str_to_ipv6("g::1"), Err(AsciiError::InvalidChar));
        assert_eq!(str_to_ipv6(""), Err(AsciiError::InvalidStrLen));
    }

    #[test]
    fn ipv6_to_str_formats() {
        let addr = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0x200c, 0x417a);
        assert_eq!(
            ipv6_to_str(&addr, true, true),
            "fe80:0000:0000:0000:0000:0000:200c:417a"
        );
        assert_eq!(ipv6_to_str(&addr, true, false), "fe80:0:0:0:0:0:200c:417a");
        assert_eq!(ipv6_to_str(&addr, false, false), "FE80:0:0:0:0:0:200C:417A");
    }

    #[test]
    fn mac_forms() {
        assert_eq!(
            str_to_mac("00-1A-2B-3C-4D-5E").unwrap(),
            [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]
        );
        assert_eq!(
            str_to_mac("0:1a:2B:c:4D:5").unwrap(),
            [0x00, 0x1a, 0x2b, 0x0c, 0x4d, 0x05]
        );

        assert_eq!(str_to_mac("00-1A:2B-3C-4D-5E"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_mac("-00-1A-2B-3C-4D-5E"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_mac("00-1A-2B-3C-4D-"), Err(AsciiError::InvalidCharSeq));
        assert_eq!(str_to_mac("00-1A-2B-3C-4D"), Err(AsciiError::InvalidStrLen));
        assert_eq!(str_to_mac("00-1A-2B-3C-4D-5E-6F"), Err(AsciiError::InvalidStrLen));
        assert_eq!(str_to_mac("001-1A-2B-3C-4D-5E"), Err(AsciiError::InvalidCharLen));
        assert_eq!(str_to_mac("0g-1A-2B-3C-4D-5E"), Err(AsciiError::InvalidChar));
        assert_eq!(str_to_mac("001A2B3C4D5E"), Err(AsciiError::InvalidStrLen));
    }

    #[test]
    fn mac_round_trip() {
        let mac = [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];
        assert_eq!(str_to_mac(&mac_to_str(&mac, false, false)).unwrap(), mac);
        assert_eq!(str_to_mac(&mac_to_str(&mac, true, true)).unwrap(), mac);
        assert_eq!(mac_to_str(&mac, false, false), "00-1A-2B-3C-4D-5E");
        assert_eq!(mac_to_str(&mac, true, true), "00:1a:2b:3c:4d:5e");
    }

    #[test]
    fn ip_dispatch() {
        assert_eq!(
            str_to_ip("localhost").unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(
            str_to_ip("10.0.0.1").unwrap(),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(
            str_to_ip("fe80::1").unwrap(),
            IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))
        );
        assert_eq!(
            str_to_ip("167772161").unwrap(),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(str_to_ip("not an address"), Err(AsciiError::InvalidChar));
    }
}
