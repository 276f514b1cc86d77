use super::{Error, Syscall};
use ::std::net::{IpAddr, SocketAddr};
use ::std::os::unix::io::AsRawFd;
use roku_netif::InterfaceIndex;

impl super::TargetedSend for mio::net::UdpSocket {
    fn send_with<F>(
        &self,
        size: usize,
        to: &SocketAddr,
        from: &IpAddr,
        f: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let mut buffer = vec![0u8; size];
        let actual_size = f(&mut buffer);
        self.try_io(|| {
            super::std::send_from(
                self.as_raw_fd(),
                &buffer[0..actual_size],
                to,
                from,
            )
        })
        .map_err(|e| Error::from_io(Syscall::Sendmsg, e))
    }
}

impl super::TargetedReceive for mio::net::UdpSocket {
    fn receive_to(
        &self,
        buffer: &mut [u8],
    ) -> Result<(usize, IpAddr, SocketAddr), Error> {
        self.try_io(|| super::std::receive_to(self.as_raw_fd(), buffer))
            .map_err(|e| Error::from_io(Syscall::Recvmsg, e))
    }
}

impl super::Multicast for mio::net::UdpSocket {
    fn join_multicast_group(
        &self,
        address: &IpAddr,
        interface: InterfaceIndex,
    ) -> Result<(), Error> {
        super::std::set_membership(
            self.as_raw_fd(),
            libc::IP_ADD_MEMBERSHIP,
            address,
            interface,
        )
        .map_err(|e| Error::from_io(Syscall::JoinMulticast, e))
    }

    fn leave_multicast_group(
        &self,
        address: &IpAddr,
        interface: InterfaceIndex,
    ) -> Result<(), Error> {
        super::std::set_membership(
            self.as_raw_fd(),
            libc::IP_DROP_MEMBERSHIP,
            address,
            interface,
        )
        .map_err(|e| Error::from_io(Syscall::LeaveMulticast, e))
    }
}
