use super::*;
use nix::ifaddrs;
use nix::net::if_::InterfaceFlags;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

/** Obtain the current list of network interfaces

The returned iterator provides a sequence of [NetworkEvent]
objects, each describing a network interface (as
[NetworkEvent::NewLink]) or an IPv4 address on that interface (as
[NetworkEvent::NewAddr]). The [NetworkEvent::NewLink] event for an
interface is always produced before any of that interface's
[NetworkEvent::NewAddr] events.

Interface indexes are the kernel's own, so they can be passed
straight to `IP_ADD_MEMBERSHIP` or `IP_PKTINFO`. An interface whose
index cannot be looked up is left out altogether.

As the list is a snapshot of the current state, no
[NetworkEvent::DelLink] or [NetworkEvent::DelAddr] events will be
generated.

Listing the multicast-capable interfaces, which are the ones the
SSDP responder will join:

```rust
# use roku_netif::*;
for name in get_interfaces()?
    .filter_map(|e| match e {
        NetworkEvent::NewLink(_i, name, flags)
            if flags.contains(Flags::RUNNING | Flags::UP | Flags::MULTICAST)
                => Some(name),
        _ => None,
    }) {
    println!("multicast-capable: {}", name);
};
# Ok::<(), std::io::Error>(())
```
 */
pub fn get_interfaces(
) -> Result<impl Iterator<Item = NetworkEvent>, std::io::Error> {
    get_interfaces_inner(ifaddrs::getifaddrs, kernel_index)
}

fn kernel_index(name: &str) -> Option<u32> {
    nix::net::if_::if_nametoindex(name).ok()
}

fn get_interfaces_inner(
    getifaddrs: fn() -> nix::Result<ifaddrs::InterfaceAddressIterator>,
    resolve: fn(&str) -> Option<u32>,
) -> Result<impl Iterator<Item = NetworkEvent>, std::io::Error> {
    Ok(InterfaceMap::new(getifaddrs()?, resolve))
}

/** Turn getifaddrs results into link and address events
 */
struct InterfaceMap<ITER>
where
    ITER: Iterator<Item = ifaddrs::InterfaceAddress>,
{
    iter: ITER,
    pending: Option<NetworkEvent>,
    index_map: HashMap<String, Option<InterfaceIndex>>,
    resolve: fn(&str) -> Option<u32>,
}

impl<ITER> Iterator for InterfaceMap<ITER>
where
    ITER: Iterator<Item = ifaddrs::InterfaceAddress>,
{
    type Item = NetworkEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_some() {
            return self.pending.take();
        }
        loop {
            let ifaddr = self.iter.next()?;
            let (new_link, new_addr) = self.check(ifaddr);
            if new_link.is_some() {
                self.pending = new_addr;
                return new_link;
            }
            if new_addr.is_some() {
                return new_addr;
            }
        }
    }
}

impl<ITER> InterfaceMap<ITER>
where
    ITER: Iterator<Item = ifaddrs::InterfaceAddress>,
{
    fn new(iter: ITER, resolve: fn(&str) -> Option<u32>) -> Self {
        InterfaceMap {
            iter,
            pending: None,
            index_map: HashMap::default(),
            resolve,
        }
    }

    /** Process one InterfaceAddress result from getifaddrs
     *
     * One result can give rise to at most one NewLink message and one
     * NewAddr, so we return a 2-tuple of Options.
     */
    fn check(
        &mut self,
        ifaddr: ifaddrs::InterfaceAddress,
    ) -> (Option<NetworkEvent>, Option<NetworkEvent>) {
        /* Undo Linux aliasing: "eth0:1" is "eth0" really. */
        let name = match ifaddr.interface_name.split_once(':') {
            None => ifaddr.interface_name,
            Some((prefix, _alias)) => prefix.to_string(),
        };

        let (index, link_message) = match self.index_map.entry(name) {
            Entry::Occupied(e) => (*e.get(), None),
            Entry::Vacant(e) => {
                let index =
                    (self.resolve)(e.key()).and_then(InterfaceIndex::new);
                let message = index.map(|ix| {
                    NetworkEvent::NewLink(
                        ix,
                        e.key().clone(),
                        map_interface_flags(&ifaddr.flags),
                    )
                });
                e.insert(index);
                (index, message)
            }
        };

        let Some(index) = index else {
            return (None, None);
        };

        let mut addr_message = None;

        if let (Some(addr), Some(mask)) = (ifaddr.address, ifaddr.netmask) {
            if let (Some(ipv4), Some(netmask)) =
                (addr.as_sockaddr_in(), mask.as_sockaddr_in())
            {
                addr_message = Some(NetworkEvent::NewAddr(
                    index,
                    IpAddr::from(Ipv4Addr::from(ipv4.ip())),
                    u32::from(netmask.ip()).leading_ones() as u8,
                ));
            }
        }
        (link_message, addr_message)
    }
}

fn map_interface_flags(flags: &InterfaceFlags) -> Flags {
    let mut newflags = Flags::default();
    for (iff, newf) in [
        (InterfaceFlags::IFF_UP, Flags::UP),
        (InterfaceFlags::IFF_RUNNING, Flags::RUNNING),
        (InterfaceFlags::IFF_LOOPBACK, Flags::LOOPBACK),
        (InterfaceFlags::IFF_POINTOPOINT, Flags::POINTTOPOINT),
        (InterfaceFlags::IFF_BROADCAST, Flags::BROADCAST),
        (InterfaceFlags::IFF_MULTICAST, Flags::MULTICAST),
    ] {
        if flags.contains(iff) {
            newflags |= newf;
        }
    }
    newflags
}
