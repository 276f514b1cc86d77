use nix::cmsg_space;
use nix::sys::socket::sockopt::Ipv4PacketInfo;
use nix::sys::socket::{
    recvmsg, sendmsg, setsockopt, ControlMessage, ControlMessageOwned,
    MsgFlags, SockaddrIn, SockaddrStorage,
};
use roku_netif::InterfaceIndex;
use std::io::{self, IoSlice, IoSliceMut};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::os::unix::prelude::RawFd;

/// Create the responder's UDP socket
///
/// Non-blocking, `SO_REUSEADDR` (other SSDP stacks on the same host
/// also want port 1900), bound to `0.0.0.0:port`, and with `IP_PKTINFO`
/// enabled so that [`receive_to`] can report the local address each
/// datagram arrived on.
///
/// # Errors
///
/// Passes on errors from any of the underlying system calls.
pub fn setup_socket(port: u16) -> io::Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())?;
    setsockopt(&socket, Ipv4PacketInfo, &true)?;
    Ok(socket.into())
}

/// Join or leave (`op`) the SSDP group on one interface
///
/// `std::net` only selects the interface by address, which is ambiguous
/// when two links share a subnet, so this goes through `ip_mreqn`.
#[allow(clippy::cast_possible_truncation)] // socklen_t
#[allow(clippy::cast_possible_wrap)] // ifindex
pub(crate) fn set_membership(
    fd: RawFd,
    op: libc::c_int,
    group: &IpAddr,
    interface: InterfaceIndex,
) -> io::Result<()> {
    let IpAddr::V4(group) = group else {
        return Err(io::ErrorKind::Unsupported.into());
    };
    let request = libc::ip_mreqn {
        imr_multiaddr: libc::in_addr {
            s_addr: u32::from_ne_bytes(group.octets()),
        },
        imr_address: libc::in_addr { s_addr: 0 },
        imr_ifindex: interface.0.get() as libc::c_int,
    };
    // SAFETY: request outlives the call and its size is passed.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            op,
            std::ptr::addr_of!(request).cast::<libc::c_void>(),
            std::mem::size_of_val(&request) as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Send `buffer` to `to` with `from` as its source address
///
/// Both addresses must be IPv4.
pub(crate) fn send_from(
    fd: RawFd,
    buffer: &[u8],
    to: &SocketAddr,
    from: &IpAddr,
) -> io::Result<()> {
    let (SocketAddr::V4(to), IpAddr::V4(from)) = (to, from) else {
        return Err(io::ErrorKind::Unsupported.into());
    };
    let source = libc::in_pktinfo {
        ipi_ifindex: 0,
        ipi_addr: libc::in_addr { s_addr: 0 },
        ipi_spec_dst: libc::in_addr {
            s_addr: u32::from(*from).to_be(),
        },
    };
    sendmsg(
        fd,
        &[IoSlice::new(buffer)],
        &[ControlMessage::Ipv4PacketInfo(&source)],
        MsgFlags::empty(),
        Some(&SockaddrIn::from(*to)),
    )
    .map_err(|e| {
        tracing::trace!(%to, %from, error = %e, "sendmsg");
        io::Error::from(e)
    })?;
    Ok(())
}

/// Receive one datagram: its length, the local address it arrived on,
/// and the sender
///
/// The socket must have `IP_PKTINFO` enabled (see [`setup_socket`]);
/// datagrams without it, or from a non-IPv4 sender, are `InvalidData`.
pub(crate) fn receive_to(
    fd: RawFd,
    buffer: &mut [u8],
) -> io::Result<(usize, IpAddr, SocketAddr)> {
    let mut cmsgs = cmsg_space!(libc::in_pktinfo);
    let mut iov = [IoSliceMut::new(buffer)];
    let msg = recvmsg::<SockaddrStorage>(
        fd,
        &mut iov,
        Some(&mut cmsgs),
        MsgFlags::empty(),
    )?;
    let Some(ControlMessageOwned::Ipv4PacketInfo(info)) = msg.cmsgs().next()
    else {
        return Err(io::ErrorKind::InvalidData.into());
    };
    let local = Ipv4Addr::from(u32::from_be(info.ipi_spec_dst.s_addr));
    let Some(sender) = msg.address.as_ref().and_then(SockaddrStorage::as_sockaddr_in)
    else {
        return Err(io::ErrorKind::InvalidData.into());
    };
    let sender = SocketAddrV4::new(Ipv4Addr::from(sender.ip()), sender.port());
    Ok((msg.bytes, IpAddr::V4(local), SocketAddr::V4(sender)))
}
