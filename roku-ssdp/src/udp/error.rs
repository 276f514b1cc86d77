/// The list of system calls which can return errors
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    /// recvmsg() returned an error
    Recvmsg,
    /// sendmsg() returned an error
    Sendmsg,
    /// setsockopt(IP_ADD_MEMBERSHIP) returned an error
    JoinMulticast,
    /// setsockopt(IP_DROP_MEMBERSHIP) returned an error
    LeaveMulticast,
}

/// The errors which can be returned from UDP trait methods
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// recvmsg didn't return packet info as expected
    #[error("recvmsg: no pktinfo returned")]
    NoPacketInfo,

    /// IPv6 attempted (NYI)
    #[error("IPv6 not implemented")]
    Ipv6NotImplemented,

    /// A system call returned an error
    #[error("error from syscall {0:?}")]
    Syscall(Syscall, #[source] std::io::Error),
}

impl Error {
    /// Whether this is just the non-blocking "nothing more to read"
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Syscall(_, e)
                 if e.kind() == std::io::ErrorKind::WouldBlock)
    }

    /// Classify an error from one of the `udp::std` helpers
    pub(crate) fn from_io(syscall: Syscall, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::Unsupported => Self::Ipv6NotImplemented,
            std::io::ErrorKind::InvalidData
                if syscall == Syscall::Recvmsg =>
            {
                Self::NoPacketInfo
            }
            _ => Self::Syscall(syscall, e),
        }
    }
}
