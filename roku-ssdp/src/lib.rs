//! Implementing the SSDP responder half of a Roku ECP device
//!
//! The roku-ssdp crate makes an emulated device discoverable by Roku
//! controller apps, universal remotes and home-automation hubs. It
//! does two things:
//!
//!  - answers SSDP `M-SEARCH` queries for `roku:ecp` (or `ssdp:all`)
//!    with a unicast reply, immediately and once per query;
//!  - periodically multicasts `NOTIFY ssdp:alive` announcements, and
//!    sends `ssdp:byebye` when the advertisement is withdrawn.
//!
//! In both cases the `LOCATION` header points at the device's HTTP
//! server, using whichever local address the peer can reach.
//!
//! The protocol logic lives in [`engine::Engine`], which owns no
//! sockets and never blocks; the socket-owning wrapper for MIO-style
//! polling loops is [`Service`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use std::net::Ipv4Addr;

/// The SSDP multicast group
pub const SSDP_MULTICAST: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// The standard SSDP port
pub const SSDP_PORT: u16 = 1900;

/// The search target and notification type of a Roku ECP device
pub const ROKU_ECP: &str = "roku:ecp";

/// A resource being advertised
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// Notification type, e.g. `roku:ecp`
    pub notification_type: String,

    /// Where the resource can be found
    ///
    /// The host part is replaced, in each message sent, by the local
    /// IP address the message is sent from.
    pub location: url::Url,
}

/// Errors from setting up or running the SSDP responder
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket setup failed
    #[error("SSDP socket setup failed")]
    Io(#[from] std::io::Error),

    /// A UDP trait method failed
    #[error("SSDP UDP operation failed")]
    Udp(#[from] udp::Error),

    /// Multicast-capable interfaces exist, but none could join the group
    #[error("could not join the SSDP multicast group on any interface")]
    NoMulticastMembership,
}

pub mod engine;
pub mod message;
pub mod refresh_timer;
pub mod udp;

mod service;
pub use service::Service;

/// Timing parameters for announcements and multicast membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Period between `ssdp:alive` salvos
    pub announce_interval: std::time::Duration,

    /// Period between leave-and-rejoin refreshes of group membership
    pub membership_refresh: std::time::Duration,

    /// Advertised `CACHE-CONTROL: max-age`
    pub max_age: std::time::Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            announce_interval: std::time::Duration::from_secs(60),
            membership_refresh: std::time::Duration::from_secs(60),
            max_age: std::time::Duration::from_secs(300),
        }
    }
}
