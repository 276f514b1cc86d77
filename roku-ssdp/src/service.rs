use crate::engine::Engine;
use crate::udp::TargetedReceive;
use crate::{udp, Advertisement, Error, Timings, SSDP_PORT};
use roku_netif::{Flags, NetworkEvent};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Most datagrams handled per [`Service::drain`]
const DRAIN_BUDGET: usize = 64;

/// The SSDP responder, owning its socket, for MIO polling loops
///
/// The socket is registered for readability with the caller's
/// `mio::Registry`; when the poll reports the token readable, call
/// [`Service::ready`] and then [`Service::drain`]. Periodic
/// announcements happen in [`Service::tick`].
pub struct Service {
    engine: Engine,
    socket: mio::net::UdpSocket,
    readable: bool,
}

impl Service {
    /// Create the responder socket, join the SSDP group and register
    ///
    /// `port` is the local port to bind, normally [`SSDP_PORT`];
    /// announcements always go to the standard port.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the socket cannot be created or registered,
    /// if the interface list cannot be read, or if multicast-capable
    /// interfaces exist but none of them could join the group. Having
    /// no such interfaces at all is only a warning: unicast searches
    /// are still answered.
    pub fn new(
        registry: &mio::Registry,
        token: mio::Token,
        port: u16,
        timings: &Timings,
        now: Instant,
    ) -> Result<Self, Error> {
        let mut socket =
            mio::net::UdpSocket::from_std(udp::std::setup_socket(port)?);
        let mut engine = Engine::new(timings, SSDP_PORT, now);

        let mut candidates = 0usize;
        let mut failures = 0usize;
        for event in roku_netif::get_interfaces()? {
            if let NetworkEvent::NewLink(_, _, flags) = &event {
                if flags.contains(Flags::MULTICAST) {
                    candidates += 1;
                }
            }
            if let Err(e) = engine.on_network_event(&event, &socket) {
                warn!(?event, error = %e, "could not join SSDP group");
                failures += 1;
            }
        }

        if candidates == 0 {
            warn!("no multicast-capable interfaces, only unicast searches will be answered");
        } else if failures >= candidates {
            return Err(Error::NoMulticastMembership);
        }

        registry.register(&mut socket, token, mio::Interest::READABLE)?;
        info!(
            port = socket.local_addr()?.port(),
            interfaces = engine.joined_interfaces(),
            "SSDP responder listening"
        );

        Ok(Self {
            engine,
            socket,
            readable: false,
        })
    }

    /// The address the responder socket is bound to
    ///
    /// # Errors
    ///
    /// Passes on errors from `getsockname`.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start advertising a resource
    pub fn advertise<USN>(
        &mut self,
        unique_service_name: USN,
        advertisement: Advertisement,
        now: Instant,
    ) where
        USN: Into<String>,
    {
        self.engine
            .advertise(unique_service_name.into(), advertisement, now);
    }

    /// Stop advertising a resource, sending `ssdp:byebye`
    pub fn deadvertise(&mut self, unique_service_name: &str) {
        self.engine.deadvertise(unique_service_name, &self.socket);
    }

    /// Pass on a change in the system's network interfaces
    ///
    /// # Errors
    ///
    /// Returns `Err` if joining or leaving the multicast group fails.
    pub fn on_network_event(&mut self, event: &NetworkEvent) -> Result<(), Error> {
        self.engine.on_network_event(event, &self.socket)?;
        Ok(())
    }

    /// Run any periodic work which has fallen due
    pub fn tick(&mut self, now: Instant) {
        self.engine.tick(now, &self.socket);
    }

    /// How long until [`Service::tick`] next has work to do
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        self.engine.next_wakeup(now)
    }

    /// Note a poll event for this service's token
    pub fn ready(&mut self, event: &mio::event::Event) {
        if event.is_readable() {
            self.set_readable();
        }
    }

    /// Mark the socket as having data waiting
    pub fn set_readable(&mut self) {
        self.readable = true;
    }

    /// Whether the socket may still have unread datagrams
    ///
    /// True after a [`Service::drain`] that stopped at its budget; the
    /// caller should then drain again without waiting for a new poll
    /// event, because MIO readiness is edge-triggered.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Handle waiting datagrams, up to a fixed budget
    ///
    /// Returns the number of datagrams taken off the socket. Reading
    /// until `WouldBlock` clears the readable flag.
    pub fn drain(&mut self) -> usize {
        let mut buf = [0u8; 1500];
        let mut handled = 0;
        while self.readable && handled < DRAIN_BUDGET {
            match self.socket.receive_to(&mut buf) {
                Ok((n, wasto, wasfrom)) => {
                    self.engine
                        .on_data(&buf[0..n], &self.socket, wasto, wasfrom);
                    handled += 1;
                }
                Err(e) if e.is_would_block() => self.readable = false,
                Err(e) => {
                    debug!(error = %e, "SSDP receive failed");
                    handled += 1;
                }
            }
        }
        handled
    }
}
