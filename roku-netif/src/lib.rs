//! Enumerating network interfaces and their IPv4 addresses
//!
//! The roku-netif crate describes the host's network interfaces as a
//! sequence of [`NetworkEvent`]s. A snapshot of the current state is
//! available from [`get_interfaces`]; the same event type can equally
//! be produced by a host framework that learns about link changes some
//! other way, and fed to the SSDP responder as they happen.
//!
//! Only IPv4 addresses are reported: SSDP discovery by Roku controllers
//! is IPv4-only.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use bitflags::bitflags;
use std::net::IpAddr;
use std::num::NonZeroU32;

/// Kernel network interface index (1-based)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceIndex(pub NonZeroU32);

impl InterfaceIndex {
    /// Wrap a raw kernel index, which is never zero for a real interface
    #[must_use]
    pub fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(Self)
    }
}

bitflags! {
    /// Link flags, a subset of the POSIX `IFF_*` flags
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        /// Administratively up
        const UP = 0x1;
        /// Has a valid broadcast address
        const BROADCAST = 0x2;
        /// Loopback interface
        const LOOPBACK = 0x4;
        /// Point-to-point link
        const POINTTOPOINT = 0x8; // not preserving Posix misspelling
        /// Operationally up
        const RUNNING = 0x40;
        /// Supports multicast
        const MULTICAST = 0x1000;
    }
}

/// A change in the set of network interfaces or addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A new link (or new flags on an existing link)
    NewLink(InterfaceIndex, String, Flags),

    /// A link has gone away
    DelLink(InterfaceIndex),

    /// A new address on a link, with its prefix length
    NewAddr(InterfaceIndex, IpAddr, u8),

    /// An address has been removed from a link
    DelAddr(InterfaceIndex, IpAddr, u8),
}

mod getifaddrs;
pub use getifaddrs::get_interfaces;
