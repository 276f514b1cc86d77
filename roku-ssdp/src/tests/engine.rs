use super::*;
use crate::message::parse;
use crate::{ROKU_ECP, SSDP_PORT};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;

/* ==== Tests for target_match() ==== */

#[test]
fn target_match_ssdp_all() {
    assert!(target_match("ssdp:all", "roku:ecp"));
    assert!(!target_match("roku:ecp", "ssdp:all"));
}

#[test]
fn target_match_equality() {
    assert!(target_match("roku:ecp", "roku:ecp"));
    assert!(!target_match("roku:ecp", "upnp:rootdevice"));
}

#[test]
fn target_match_downlevel() {
    assert!(target_match(
        "urn:schemas-upnp-org:device:Basic:1",
        "urn:schemas-upnp-org:device:Basic:2"
    ));
    assert!(!target_match(
        "urn:schemas-upnp-org:device:Basic:2",
        "urn:schemas-upnp-org:device:Basic:1"
    ));
    assert!(!target_match("fnord", "roku:ecp"));
    assert!(!target_match("roku:ecp", "roku:X"));
}

#[derive(Default)]
struct FakeSocket {
    sends: Mutex<Vec<(SocketAddr, IpAddr, Message)>>,
    mcasts: Mutex<Vec<(IpAddr, InterfaceIndex, bool)>>,
    injecting_multicast_error: bool,
    injecting_send_error: bool,
}

impl FakeSocket {
    fn contains_send<F>(&self, wasto: SocketAddr, wasfrom: IpAddr, mut f: F) -> bool
    where
        F: FnMut(&Message) -> bool,
    {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .any(|(to, from, msg)| *to == wasto && *from == wasfrom && f(msg))
    }

    fn contains_notify(&self, from: IpAddr, usn: &str, loc: &str) -> bool {
        self.contains_send(multicast_dest(), from, |m| {
            matches!(m,
                     Message::NotifyAlive { notification_type, unique_service_name, location }
                     if notification_type == ROKU_ECP
                     && unique_service_name == usn
                     && location == loc)
        })
    }

    fn no_sends(&self) -> bool {
        self.sends.lock().unwrap().is_empty()
    }

    fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    fn contains_mcast(
        &self,
        group: IpAddr,
        interface: InterfaceIndex,
        join: bool,
    ) -> bool {
        self.mcasts
            .lock()
            .unwrap()
            .iter()
            .any(|(gp, ix, jn)| *gp == group && *ix == interface && *jn == join)
    }

    fn no_mcasts(&self) -> bool {
        self.mcasts.lock().unwrap().is_empty()
    }

    fn mcast_count(&self) -> usize {
        self.mcasts.lock().unwrap().len()
    }

    fn clear(&self) {
        self.sends.lock().unwrap().clear();
        self.mcasts.lock().unwrap().clear();
    }

    fn build_notify(notification_type: &str) -> Vec<u8> {
        let mut buf = [0u8; 512];
        let n = message::build_notify(
            &mut buf,
            notification_type,
            "uuid:37",
            "http://me",
            300,
        );
        buf[0..n].to_vec()
    }

    fn build_response(search_target: &str) -> Vec<u8> {
        let mut buf = [0u8; 512];
        let n = message::build_response(
            &mut buf,
            search_target,
            "uuid:37",
            "http://me",
            300,
        );
        buf[0..n].to_vec()
    }

    fn build_search(search_target: &str) -> Vec<u8> {
        let mut buf = [0u8; 512];
        let n = message::build_search(&mut buf, search_target);
        buf[0..n].to_vec()
    }

    fn inject_multicast_error(&mut self, errors: bool) {
        self.injecting_multicast_error = errors;
    }

    fn inject_send_error(&mut self, errors: bool) {
        self.injecting_send_error = errors;
    }

    fn injected(syscall: udp::Syscall) -> udp::Error {
        udp::Error::Syscall(
            syscall,
            std::io::Error::new(std::io::ErrorKind::Other, "injected"),
        )
    }
}

impl udp::TargetedSend for FakeSocket {
    fn send_with<F>(
        &self,
        size: usize,
        to: &SocketAddr,
        from: &IpAddr,
        f: F,
    ) -> Result<(), udp::Error>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        if self.injecting_send_error {
            return Err(Self::injected(udp::Syscall::Sendmsg));
        }
        let mut buffer = vec![0u8; size];
        let actual_size = f(&mut buffer);
        self.sends.lock().unwrap().push((
            *to,
            *from,
            parse(&buffer[0..actual_size]).unwrap(),
        ));
        Ok(())
    }
}

impl udp::Multicast for FakeSocket {
    fn join_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: InterfaceIndex,
    ) -> Result<(), udp::Error> {
        if self.injecting_multicast_error {
            return Err(Self::injected(udp::Syscall::JoinMulticast));
        }
        self.mcasts
            .lock()
            .unwrap()
            .push((*multicast_address, interface, true));
        Ok(())
    }

    fn leave_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: InterfaceIndex,
    ) -> Result<(), udp::Error> {
        if self.injecting_multicast_error {
            return Err(Self::injected(udp::Syscall::LeaveMulticast));
        }
        self.mcasts
            .lock()
            .unwrap()
            .push((*multicast_address, interface, false));
        Ok(())
    }
}

fn multicast_dest() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900))
}

const LOCAL_SRC: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 100, 1));
const LOCAL_SRC_2: IpAddr = IpAddr::V4(Ipv4Addr::new(169, 254, 33, 203));
const MULTICAST_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250));
const USN: &str = "uuid:roku:ecp:1E2D3C4B5A69";

fn local_ix() -> InterfaceIndex {
    InterfaceIndex::new(4).unwrap()
}

fn remote_src() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 100, 60), 12345))
}

fn new_eth0_if() -> NetworkEvent {
    NetworkEvent::NewLink(
        local_ix(),
        "jeth0".to_string(),
        Flags::UP | Flags::RUNNING | Flags::MULTICAST,
    )
}

fn new_eth0_if_down() -> NetworkEvent {
    NetworkEvent::NewLink(local_ix(), "jeth0".to_string(), Flags::MULTICAST)
}

fn new_eth0_if_nomulti() -> NetworkEvent {
    NetworkEvent::NewLink(
        local_ix(),
        "jeth0".to_string(),
        Flags::UP | Flags::RUNNING,
    )
}

fn del_eth0() -> NetworkEvent {
    NetworkEvent::DelLink(local_ix())
}

fn new_eth0_addr() -> NetworkEvent {
    NetworkEvent::NewAddr(local_ix(), LOCAL_SRC, 24)
}

fn new_eth0_addr_2() -> NetworkEvent {
    NetworkEvent::NewAddr(local_ix(), LOCAL_SRC_2, 16)
}

fn del_eth0_addr() -> NetworkEvent {
    NetworkEvent::DelAddr(local_ix(), LOCAL_SRC, 24)
}

fn ecp_advert() -> Advertisement {
    Advertisement {
        notification_type: ROKU_ECP.to_string(),
        location: url::Url::parse("http://127.0.0.1:8060/").unwrap(),
    }
}

struct Fixture {
    e: Engine,
    s: FakeSocket,
    now: Instant,
}

impl Default for Fixture {
    fn default() -> Self {
        let now = Instant::now();
        Fixture {
            e: Engine::new(&Timings::default(), SSDP_PORT, now),
            s: FakeSocket::default(),
            now,
        }
    }
}

impl Fixture {
    fn new_with<F: FnMut(&mut Fixture)>(mut f: F) -> Fixture {
        let mut fixture = Fixture::default();
        f(&mut fixture);
        fixture.s.clear();
        fixture
    }

    fn advertise(&mut self) {
        self.e.advertise(USN.to_string(), ecp_advert(), self.now);
    }

    fn with_eth0(&mut self) {
        self.e.on_network_event(&new_eth0_if(), &self.s).unwrap();
        self.e.on_network_event(&new_eth0_addr(), &self.s).unwrap();
    }

    fn search(&mut self, st: &str) {
        let n = FakeSocket::build_search(st);
        self.e.on_data(&n, &self.s, LOCAL_SRC, remote_src());
    }

    fn after(&self, secs: u64) -> Instant {
        self.now + Duration::from_secs(secs)
    }
}

/* ==== Tests for search handling ==== */

#[test]
fn bogus_message_ignored() {
    let mut f = Fixture::new_with(|f| f.advertise());

    f.e.on_data(b"foo", &f.s, LOCAL_SRC, remote_src());

    assert!(f.s.no_sends());
}

#[test]
fn response_sent_to_specific_search() {
    let mut f = Fixture::new_with(|f| f.advertise());

    f.search("roku:ecp");

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_send(remote_src(), LOCAL_SRC, |m| matches!(m,
            Message::Response { search_target, unique_service_name, location }
            if search_target == "roku:ecp"
            && unique_service_name == USN
            && location == "http://192.168.100.1:8060/")));
}

#[test]
fn response_sent_to_generic_search() {
    let mut f = Fixture::new_with(|f| f.advertise());

    f.search("ssdp:all");

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_send(remote_src(), LOCAL_SRC, |m| matches!(m,
            Message::Response { search_target, .. }
            if search_target == "roku:ecp")));
}

#[test]
fn response_not_sent_to_other_search() {
    let mut f = Fixture::new_with(|f| f.advertise());

    f.search("upnp:rootdevice");

    assert!(f.s.no_sends());
}

#[test]
fn response_not_sent_without_advertisement() {
    let mut f = Fixture::default();

    f.search("roku:ecp");

    assert!(f.s.no_sends());
}

#[test]
fn every_search_answered() {
    let mut f = Fixture::new_with(|f| f.advertise());

    f.search("roku:ecp");
    f.search("roku:ecp");
    f.search("ssdp:all");

    assert_eq!(f.s.send_count(), 3);
}

#[test]
fn search_answered_before_first_announcement() {
    let mut f = Fixture::new_with(|f| f.advertise());

    // No tick, and no interfaces known yet
    f.search("roku:ecp");

    assert_eq!(f.s.send_count(), 1);
}

#[test]
fn reply_location_follows_receiving_address() {
    let mut f = Fixture::new_with(|f| f.advertise());

    let n = FakeSocket::build_search("roku:ecp");
    f.e.on_data(&n, &f.s, LOCAL_SRC_2, remote_src());

    assert!(f.s.contains_send(remote_src(), LOCAL_SRC_2, |m| matches!(m,
            Message::Response { location, .. }
            if location == "http://169.254.33.203:8060/")));
}

#[test]
fn notify_and_response_ignored() {
    let mut f = Fixture::new_with(|f| f.advertise());

    let n = FakeSocket::build_notify("roku:ecp");
    f.e.on_data(&n, &f.s, LOCAL_SRC, remote_src());
    let n = FakeSocket::build_response("roku:ecp");
    f.e.on_data(&n, &f.s, LOCAL_SRC, remote_src());

    assert!(f.s.no_sends());
}

#[test]
fn search_reply_failure_tolerated() {
    let mut f = Fixture::new_with(|f| {
        f.advertise();
        f.s.inject_send_error(true);
    });

    f.search("roku:ecp");
    f.s.inject_send_error(false);
    f.search("roku:ecp");

    assert_eq!(f.s.send_count(), 1);
}

/* ==== Tests for announcements ==== */

#[test]
fn notify_sent_on_network_event() {
    let mut f = Fixture::new_with(|f| {
        f.advertise();
        f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();
    });

    f.e.on_network_event(&new_eth0_addr(), &f.s).unwrap();

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_notify(LOCAL_SRC, USN, "http://192.168.100.1:8060/"));
}

#[test]
fn no_notify_sent_on_down_interface() {
    let mut f = Fixture::new_with(|f| {
        f.advertise();
        f.e.on_network_event(&new_eth0_if_down(), &f.s).unwrap();
    });

    f.e.on_network_event(&new_eth0_addr(), &f.s).unwrap();
    f.e.tick(f.now, &f.s);

    assert!(f.s.no_sends());
}

#[test]
fn notify_sent_on_interface_newly_up() {
    let mut f = Fixture::new_with(|f| {
        f.advertise();
        f.e.on_network_event(&new_eth0_if_down(), &f.s).unwrap();
        f.e.on_network_event(&new_eth0_addr(), &f.s).unwrap();
    });

    f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_notify(LOCAL_SRC, USN, "http://192.168.100.1:8060/"));
}

#[test]
fn notify_sent_on_first_tick() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.advertise();
    });

    f.e.tick(f.now, &f.s);

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_notify(LOCAL_SRC, USN, "http://192.168.100.1:8060/"));
}

#[test]
fn notify_repeated_each_interval() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.advertise();
    });

    f.e.tick(f.now, &f.s);
    f.e.tick(f.after(1), &f.s);
    f.e.tick(f.after(59), &f.s);
    assert_eq!(f.s.send_count(), 1);

    f.e.tick(f.after(60), &f.s);
    assert_eq!(f.s.send_count(), 2);
}

#[test]
fn notify_sent_on_two_ips() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.e.on_network_event(&new_eth0_addr_2(), &f.s).unwrap();
        f.advertise();
    });

    f.e.tick(f.now, &f.s);

    assert_eq!(f.s.send_count(), 2);
    assert!(f.s.contains_notify(LOCAL_SRC, USN, "http://192.168.100.1:8060/"));
    assert!(f.s.contains_notify(
        LOCAL_SRC_2,
        USN,
        "http://169.254.33.203:8060/"
    ));
}

#[test]
fn no_notify_sent_on_deleted_ip() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.e.on_network_event(&new_eth0_addr_2(), &f.s).unwrap();
        f.e.on_network_event(&del_eth0_addr(), &f.s).unwrap();
        f.advertise();
    });

    f.e.tick(f.now, &f.s);

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_notify(
        LOCAL_SRC_2,
        USN,
        "http://169.254.33.203:8060/"
    ));
}

#[test]
fn announce_failure_tolerated() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.advertise();
        f.s.inject_send_error(true);
    });

    f.e.tick(f.now, &f.s);

    assert!(f.s.no_sends());
    assert_eq!(f.e.next_wakeup(f.now), Duration::from_secs(60));
}

#[test]
fn byebye_sent_on_deadvertise() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.advertise();
    });

    f.e.deadvertise(USN, &f.s);

    assert_eq!(f.s.send_count(), 1);
    assert!(f.s.contains_send(multicast_dest(), LOCAL_SRC, |m| matches!(m,
            Message::NotifyByeBye { notification_type, unique_service_name }
            if notification_type == "roku:ecp"
            && unique_service_name == USN)));
}

#[test]
fn deadvertised_resource_not_found() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.advertise();
        f.e.deadvertise(USN, &f.s);
    });

    f.search("roku:ecp");
    f.e.tick(f.now, &f.s);

    assert!(f.s.no_sends());
}

#[test]
fn deadvertise_unknown_ignored() {
    let mut f = Fixture::new_with(|f| f.with_eth0());

    f.e.deadvertise(USN, &f.s);

    assert!(f.s.no_sends());
}

/* ==== Tests for IPv4 multicast handling ==== */

#[test]
fn join_multicast_on_new_interface() {
    let mut f = Fixture::default();

    f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();

    assert_eq!(f.s.mcast_count(), 1);
    assert!(f.s.contains_mcast(MULTICAST_IP, local_ix(), true));
    assert_eq!(f.e.joined_interfaces(), 1);
}

#[test]
fn dont_join_multicast_on_repeat_interface() {
    let mut f = Fixture::new_with(|f| {
        f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();
    });

    f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();

    assert!(f.s.no_mcasts());
}

#[test]
fn dont_join_multicast_on_non_multicast_interface() {
    let mut f = Fixture::default();

    f.e.on_network_event(&new_eth0_if_nomulti(), &f.s).unwrap();

    assert!(f.s.no_mcasts());
    assert_eq!(f.e.joined_interfaces(), 0);
}

#[test]
fn leave_multicast_on_interface_gone() {
    let mut f = Fixture::new_with(|f| f.with_eth0());

    f.e.on_network_event(&del_eth0(), &f.s).unwrap();

    assert_eq!(f.s.mcast_count(), 1);
    assert!(f.s.contains_mcast(MULTICAST_IP, local_ix(), false));
    assert_eq!(f.e.joined_interfaces(), 0);
}

#[test]
fn error_join_multicast_on_new_interface() {
    let mut f = Fixture::new_with(|f| f.s.inject_multicast_error(true));

    assert!(f.e.on_network_event(&new_eth0_if(), &f.s).is_err());
    assert_eq!(f.e.joined_interfaces(), 0);
}

#[test]
fn error_leave_multicast_on_interface_gone() {
    let mut f = Fixture::new_with(|f| {
        f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();
        f.s.inject_multicast_error(true);
    });

    assert!(f.e.on_network_event(&del_eth0(), &f.s).is_err());
}

#[test]
fn membership_refreshed_each_period() {
    let mut f = Fixture::new_with(|f| f.with_eth0());

    f.e.tick(f.now, &f.s);
    assert!(f.s.no_mcasts());

    f.e.tick(f.after(60), &f.s);
    assert_eq!(f.s.mcast_count(), 2);
    assert!(f.s.contains_mcast(MULTICAST_IP, local_ix(), false));
    assert!(f.s.contains_mcast(MULTICAST_IP, local_ix(), true));
}

#[test]
fn membership_refresh_failure_tolerated() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.s.inject_multicast_error(true);
    });

    f.e.tick(f.after(60), &f.s);

    assert!(f.s.no_mcasts());
    assert_eq!(f.e.joined_interfaces(), 1);
    assert_eq!(f.e.next_wakeup(f.after(60)), Duration::from_secs(60));
}

/* ==== Tests for timer handling ==== */

#[test]
fn announce_due_immediately() {
    let f = Fixture::default();

    assert!(f.e.next_wakeup(f.now).is_zero());
}

#[test]
fn tick_sets_timeouts() {
    let mut f = Fixture::default();

    f.e.tick(f.now, &f.s);

    assert_eq!(f.e.next_wakeup(f.now), Duration::from_secs(60));
    assert_eq!(f.e.next_wakeup(f.after(45)), Duration::from_secs(15));
}

#[test]
fn wakeup_is_earliest_timer() {
    let now = Instant::now();
    let timings = Timings {
        announce_interval: Duration::from_secs(30),
        membership_refresh: Duration::from_secs(90),
        max_age: Duration::from_secs(300),
    };
    let mut e = Engine::new(&timings, SSDP_PORT, now);
    let s = FakeSocket::default();

    e.tick(now, &s);

    assert_eq!(e.next_wakeup(now), Duration::from_secs(30));
}

#[test]
fn advertise_makes_announce_due() {
    let mut f = Fixture::new_with(|f| {
        f.with_eth0();
        f.e.tick(f.now, &f.s);
    });
    assert!(!f.e.next_wakeup(f.after(10)).is_zero());

    f.e.advertise(USN.to_string(), ecp_advert(), f.after(10));

    assert!(f.e.next_wakeup(f.after(10)).is_zero());
    f.e.tick(f.after(10), &f.s);
    assert_eq!(f.s.send_count(), 1);
}

/* ==== Tests for out-of-sequence messages ==== */

#[test]
fn bogus_dellink_ignored() {
    let mut f = Fixture::default();

    f.e.on_network_event(&del_eth0(), &f.s).unwrap();

    assert!(f.s.no_mcasts());
}

#[test]
fn bogus_deladdr_ignored() {
    let mut f = Fixture::default();

    f.e.on_network_event(&del_eth0_addr(), &f.s).unwrap();
}

#[test]
fn address_before_link_ignored() {
    let mut f = Fixture::new_with(|f| f.advertise());

    f.e.on_network_event(&new_eth0_addr(), &f.s).unwrap();
    f.e.tick(f.now, &f.s);

    assert!(f.s.no_sends());
}

#[test]
fn repeat_address_ignored() {
    let mut f = Fixture::new_with(|f| {
        f.advertise();
        f.with_eth0();
    });

    f.e.on_network_event(&new_eth0_addr(), &f.s).unwrap();

    assert!(f.s.no_sends());
}

#[test]
fn ipv6_address_ignored() {
    let mut f = Fixture::new_with(|f| {
        f.advertise();
        f.e.on_network_event(&new_eth0_if(), &f.s).unwrap();
    });

    f.e.on_network_event(
        &NetworkEvent::NewAddr(local_ix(), IpAddr::V6(Ipv6Addr::LOCALHOST), 64),
        &f.s,
    )
    .unwrap();
    f.e.tick(f.now, &f.s);

    assert!(f.s.no_sends());
}
