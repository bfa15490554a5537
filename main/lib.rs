//! An embedded dual-stack TCP/IP suite core: the scheduled timer wheel, the
//! MLDv1 listener engine and the socket facade (application helpers, a
//! BSD-shaped surface and name resolution), glued together under one
//! process-wide network lock.
//!
//! The transport itself (TCP/UDP state machines), the interface manager, the
//! ICMPv6 datagram builder and the DNS resolver are collaborators: the stack
//! talks to them through the traits in [`net::iface`], [`net::icmpv6`],
//! [`sock::transport`] and [`sock::dns`], and an embedding wires real
//! drivers (or test doubles) into [`net::Net::init`].

pub mod ascii;
pub mod core;
pub mod net;
pub mod sock;

pub use crate::net::{Collaborators, InitError, Net};
