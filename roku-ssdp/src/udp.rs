//! Abstracting the UDP socket operations the SSDP engine needs
use roku_netif::InterfaceIndex;
use ::std::net::{IpAddr, SocketAddr};

mod error;
pub use error::{Error, Syscall};

/// Sending a datagram with a chosen source address
///
/// The SSDP engine answers each search from the address it arrived on,
/// and announces once per interface address, so the source must be
/// picked per datagram rather than left to the routing table.
pub trait TargetedSend {
    /// Fill a buffer of `size` bytes with `f` and send what it wrote
    /// from `from` to `to`
    ///
    /// # Errors
    ///
    /// Returns `Err` if `sendmsg` fails or either address is not IPv4.
    fn send_with<F>(
        &self,
        size: usize,
        to: &SocketAddr,
        from: &IpAddr,
        f: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut [u8]) -> usize;
}

/// Receiving a datagram along with the local address it arrived on
pub trait TargetedReceive {
    /// Receive one datagram into `buffer`
    ///
    /// Returns its length, the local address a reply should come from
    /// (for a multicast search, the interface address rather than
    /// 239.255.255.250), and the sender.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `recvmsg` fails, including `WouldBlock` when
    /// nothing is waiting, or if the datagram carried no packet info.
    fn receive_to(
        &self,
        buffer: &mut [u8],
    ) -> Result<(usize, IpAddr, SocketAddr), Error>;
}

/// Joining and leaving the SSDP group on one interface
pub trait Multicast {
    /// Start receiving `multicast_address` on `interface`
    ///
    /// # Errors
    ///
    /// Returns `Err` if the membership request is refused.
    fn join_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: InterfaceIndex,
    ) -> Result<(), Error>;

    /// Stop receiving `multicast_address` on `interface`
    ///
    /// # Errors
    ///
    /// Returns `Err` if the membership request is refused.
    fn leave_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: InterfaceIndex,
    ) -> Result<(), Error>;
}

/// Socket setup and the `sendmsg`/`recvmsg` calls behind the traits
pub mod std;

/// The traits for `mio` sockets
pub mod mio;
