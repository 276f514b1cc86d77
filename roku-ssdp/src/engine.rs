//! The sans-IO core of the SSDP responder
use crate::message;
use crate::message::Message;
use crate::refresh_timer::RefreshTimer;
use crate::udp;
use crate::{Advertisement, Timings, SSDP_MULTICAST};
use roku_netif::{Flags, InterfaceIndex, NetworkEvent};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const MAX_PACKET_SIZE: usize = 512;

struct Interface {
    ips: Vec<IpAddr>,
    up: bool,
}

/// Does a search for `search` find a resource of type `candidate`?
///
/// True for `ssdp:all`, for an exact match, and (UPnP DA 1.0 s1.2.3)
/// for a versioned type searched at a lower version than the one
/// offered.
pub fn target_match(search: &str, candidate: &str) -> bool {
    if search == "ssdp:all" {
        return true;
    }
    if search == candidate {
        return true;
    }
    if let Some((sbase, sversion)) = search.rsplit_once(':') {
        if let Some((cbase, cversion)) = candidate.rsplit_once(':') {
            if sbase == cbase {
                if let Ok(sversion) = sversion.parse::<usize>() {
                    if let Ok(cversion) = cversion.parse::<usize>() {
                        return cversion >= sversion;
                    }
                }
            }
        }
    }
    false
}

/// The core of the SSDP responder
///
/// This struct handles parsing and emitting SSDP messages; it does
/// not own the UDP socket, which is left to its owner (usually
/// [`crate::Service`]). The owner passes in incoming datagrams with
/// [`Engine::on_data`], interface changes with
/// [`Engine::on_network_event`], and calls [`Engine::tick`] regularly
/// with the current time; [`Engine::next_wakeup`] says how long the
/// owner may sleep before the next tick matters.
///
/// Searches are answered as soon as they arrive, whatever the state
/// of the announcement timer, with one reply per matching
/// advertisement and no suppression of repeated queries.
pub struct Engine {
    interfaces: HashMap<InterfaceIndex, Interface>,
    advertisements: HashMap<String, Advertisement>,
    announce: RefreshTimer,
    membership: RefreshTimer,
    max_age_secs: u64,
    notify_destination: SocketAddr,
}

impl Engine {
    /// Create a new Engine
    ///
    /// `port` is the SSDP port, which NOTIFY messages are sent to.
    /// Announcements are due immediately; the first membership refresh
    /// is one period away.
    #[must_use]
    pub fn new(timings: &Timings, port: u16, now: Instant) -> Self {
        let mut membership = RefreshTimer::new(timings.membership_refresh, now);
        membership.update_refresh(now);
        Engine {
            interfaces: HashMap::default(),
            advertisements: HashMap::default(),
            announce: RefreshTimer::new(timings.announce_interval, now),
            membership,
            max_age_secs: timings.max_age.as_secs(),
            notify_destination: SocketAddr::V4(SocketAddrV4::new(
                SSDP_MULTICAST,
                port,
            )),
        }
    }

    /// Obtain the desired delay before the next [`Engine::tick`] is needed
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        self.announce
            .remaining(now)
            .min(self.membership.remaining(now))
    }

    /// Number of interfaces on which the multicast group was joined
    #[must_use]
    pub fn joined_interfaces(&self) -> usize {
        self.interfaces.len()
    }

    /// Run any periodic work which has fallen due
    ///
    /// Announcements go out first, then membership is refreshed.
    pub fn tick<SCK: udp::TargetedSend + udp::Multicast>(
        &mut self,
        now: Instant,
        socket: &SCK,
    ) {
        if self.announce.is_due(now) {
            if !self.advertisements.is_empty() {
                debug!("sending ssdp:alive salvo");
            }
            for (key, value) in &self.advertisements {
                self.notify_on_all(key, value, socket);
            }
            self.announce.update_refresh(now);
        }

        if self.membership.is_due(now) {
            self.refresh_membership(socket);
            self.membership.update_refresh(now);
        }
    }

    fn refresh_membership<SCK: udp::Multicast>(&self, socket: &SCK) {
        for ix in self.interfaces.keys() {
            // Leaving can fail harmlessly if the kernel already dropped us
            let _ = Self::leave_multicast(*ix, socket);
            match Self::join_multicast(*ix, socket) {
                Ok(()) => debug!(interface = ix.0.get(), "refreshed membership"),
                Err(e) => warn!(
                    interface = ix.0.get(),
                    error = %e,
                    "membership refresh failed, retrying next period"
                ),
            }
        }
    }

    /// Notify the `Engine` that a datagram has arrived
    ///
    /// `wasto` is the local address it arrived on, which is used both
    /// as the source of any reply and as the host in its `LOCATION`.
    /// Anything that isn't a well-formed search is dropped.
    pub fn on_data<SCK: udp::TargetedSend>(
        &mut self,
        buf: &[u8],
        socket: &SCK,
        wasto: IpAddr,
        wasfrom: SocketAddr,
    ) {
        let search_target = match message::parse(buf) {
            Ok(Message::Search { search_target, .. }) => search_target,
            Ok(other) => {
                trace!(?other, from = %wasfrom, "ignoring");
                return;
            }
            Err(e) => {
                trace!(error = %e, from = %wasfrom, "dropping datagram");
                return;
            }
        };

        for (key, value) in &self.advertisements {
            if !target_match(&search_target, &value.notification_type) {
                continue;
            }
            let mut url = value.location.clone();
            let _ = url.set_ip_host(wasto);

            let response_type = if search_target == "ssdp:all" {
                &value.notification_type
            } else {
                &search_target
            };
            info!(from = %wasfrom, st = %search_target, "answering M-SEARCH");
            if let Err(e) =
                socket.send_with(MAX_PACKET_SIZE, &wasfrom, &wasto, |b| {
                    message::build_response(
                        b,
                        response_type,
                        key,
                        url.as_str(),
                        self.max_age_secs,
                    )
                })
            {
                warn!(to = %wasfrom, error = %e, "search reply failed");
            }
        }
    }

    fn join_multicast<SCK: udp::Multicast>(
        interface: InterfaceIndex,
        multicast: &SCK,
    ) -> Result<(), udp::Error> {
        multicast
            .join_multicast_group(&IpAddr::V4(SSDP_MULTICAST), interface)
    }

    fn leave_multicast<SCK: udp::Multicast>(
        interface: InterfaceIndex,
        multicast: &SCK,
    ) -> Result<(), udp::Error> {
        multicast
            .leave_multicast_group(&IpAddr::V4(SSDP_MULTICAST), interface)
    }

    fn send_all<SCK: udp::TargetedSend>(&self, ips: &[IpAddr], socket: &SCK) {
        for ip in ips {
            for (key, value) in &self.advertisements {
                self.notify_on(key, value, ip, socket);
            }
        }
    }

    /// Notify the `Engine` of a network interface change
    ///
    /// New multicast-capable links are joined to the SSDP group (and
    /// removed ones left); an address appearing on an up link, or a
    /// link with addresses coming up, gets an immediate announcement.
    ///
    /// # Errors
    ///
    /// Passes on errors from the underlying system-calls for joining
    /// (and leaving) multicast groups.
    pub fn on_network_event<SCK: udp::TargetedSend + udp::Multicast>(
        &mut self,
        e: &NetworkEvent,
        socket: &SCK,
    ) -> Result<(), udp::Error> {
        match e {
            NetworkEvent::NewLink(ix, name, flags) => {
                if flags.contains(Flags::MULTICAST) {
                    let up = flags.contains(Flags::RUNNING | Flags::UP);
                    let mut do_send = false;
                    if let Some(v) = self.interfaces.get_mut(ix) {
                        if up && !v.up {
                            do_send = true;
                        }
                        v.up = up;
                    } else {
                        Self::join_multicast(*ix, socket)?;
                        debug!(interface = %name, "joined SSDP group");
                        self.interfaces.insert(
                            *ix,
                            Interface {
                                ips: Vec::new(),
                                up,
                            },
                        );
                    }
                    if do_send {
                        self.send_all(&self.interfaces[ix].ips, socket);
                    }
                }
            }
            NetworkEvent::DelLink(ix) => {
                if self.interfaces.remove(ix).is_some() {
                    Self::leave_multicast(*ix, socket)?;
                }
            }
            NetworkEvent::NewAddr(ix, addr, _prefix) => {
                if addr.is_ipv4() {
                    // roku-netif guarantees we get a NewLink before
                    // any NewAddr
                    if let Some(ref mut v) = self.interfaces.get_mut(ix) {
                        if !v.ips.contains(addr) {
                            v.ips.push(*addr);
                            if v.up {
                                self.send_all(&[*addr], socket);
                            }
                        }
                    }
                }
            }
            NetworkEvent::DelAddr(ix, addr, _prefix) => {
                if let Some(ref mut v) = self.interfaces.get_mut(ix) {
                    if let Some(n) = v.ips.iter().position(|a| a == addr) {
                        v.ips.swap_remove(n);
                    }
                }
            }
        }
        Ok(())
    }

    fn notify_on<SCK: udp::TargetedSend>(
        &self,
        unique_service_name: &str,
        advertisement: &Advertisement,
        source: &IpAddr,
        socket: &SCK,
    ) {
        let mut url = advertisement.location.clone();
        let _ = url.set_ip_host(*source);
        if let Err(e) = socket.send_with(
            MAX_PACKET_SIZE,
            &self.notify_destination,
            source,
            |b| {
                message::build_notify(
                    b,
                    &advertisement.notification_type,
                    unique_service_name,
                    url.as_str(),
                    self.max_age_secs,
                )
            },
        ) {
            warn!(from = %source, error = %e, "ssdp:alive failed");
        }
    }

    fn notify_on_all<SCK: udp::TargetedSend>(
        &self,
        unique_service_name: &str,
        advertisement: &Advertisement,
        socket: &SCK,
    ) {
        for interface in self.interfaces.values() {
            if interface.up {
                for ip in &interface.ips {
                    self.notify_on(
                        unique_service_name,
                        advertisement,
                        ip,
                        socket,
                    );
                }
            }
        }
    }

    fn byebye_on_all<SCK: udp::TargetedSend>(
        &self,
        notification_type: &str,
        unique_service_name: &str,
        socket: &SCK,
    ) {
        for interface in self.interfaces.values() {
            if interface.up {
                for ip in &interface.ips {
                    if let Err(e) = socket.send_with(
                        MAX_PACKET_SIZE,
                        &self.notify_destination,
                        ip,
                        |b| {
                            message::build_byebye(
                                b,
                                notification_type,
                                unique_service_name,
                            )
                        },
                    ) {
                        warn!(from = %ip, error = %e, "ssdp:byebye failed");
                    }
                }
            }
        }
    }

    /// Advertise a local resource to SSDP peers
    ///
    /// The announcement timer is reset, so the first `ssdp:alive`
    /// goes out on the next [`Engine::tick`].
    pub fn advertise(
        &mut self,
        unique_service_name: String,
        advertisement: Advertisement,
        now: Instant,
    ) {
        self.advertisements
            .insert(unique_service_name, advertisement);
        self.announce.reset(now);
    }

    /// Withdraw an advertisement for a local resource
    ///
    /// For instance, it is "polite" to call this if shutting down
    /// cleanly.
    pub fn deadvertise<SCK: udp::TargetedSend>(
        &mut self,
        unique_service_name: &str,
        socket: &SCK,
    ) {
        if let Some(advertisement) =
            self.advertisements.remove(unique_service_name)
        {
            self.byebye_on_all(
                &advertisement.notification_type,
                unique_service_name,
                socket,
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/engine.rs"]
mod tests;
