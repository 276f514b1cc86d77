//! Parsing and building SSDP datagrams
use std::collections::BTreeMap;
use std::fmt::Write;

/// Value of the `SERVER` header in everything we send
pub const SERVER: &str = "Roku/9.4.0 UPnP/1.0 Roku/9.4.0";

/// A parsed SSDP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `NOTIFY` with `NTS: ssdp:alive`
    NotifyAlive {
        /// NT header
        notification_type: String,
        /// USN header
        unique_service_name: String,
        /// LOCATION header
        location: String,
    },
    /// `NOTIFY` with `NTS: ssdp:byebye`
    NotifyByeBye {
        /// NT header
        notification_type: String,
        /// USN header
        unique_service_name: String,
    },
    /// `M-SEARCH`
    Search {
        /// ST header
        search_target: String,
        /// MX header, if any
        maximum_wait_sec: Option<u8>,
    },
    /// A unicast reply to a search
    Response {
        /// ST header
        search_target: String,
        /// USN header
        unique_service_name: String,
        /// LOCATION header
        location: String,
    },
}

/// Reasons a datagram is not a usable SSDP message
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Not UTF-8, unknown start line, or required headers missing
    #[error("invalid SSDP message")]
    InvalidData,
    /// Empty datagram
    #[error("empty SSDP message")]
    UnexpectedEof,
}

/// Parse one datagram
///
/// Header names are case-insensitive; values are trimmed. `MAN` is
/// not required of searches, and `MX` is optional but must be a
/// number if present.
///
/// # Errors
///
/// Returns `Err` for anything that isn't a well-formed SSDP message.
pub fn parse(buf: &[u8]) -> Result<Message, Error> {
    let packet = std::str::from_utf8(buf).map_err(|_| Error::InvalidData)?;

    let mut iter = packet.lines();

    let prefix = iter.next().ok_or(Error::UnexpectedEof)?;

    let mut map = BTreeMap::new();
    for line in iter {
        if let Some((key, value)) = line.split_once(':') {
            map.insert(key.trim().to_ascii_uppercase(), value.trim());
        }
    }
    match prefix.trim_end() {
        "NOTIFY * HTTP/1.1" => match map.get("NTS") {
            Some(&"ssdp:alive") => {
                if let (Some(nt), Some(usn), Some(loc)) =
                    (map.get("NT"), map.get("USN"), map.get("LOCATION"))
                {
                    return Ok(Message::NotifyAlive {
                        notification_type: String::from(*nt),
                        unique_service_name: String::from(*usn),
                        location: String::from(*loc),
                    });
                }
            }
            Some(&"ssdp:byebye") => {
                if let (Some(nt), Some(usn)) = (map.get("NT"), map.get("USN"))
                {
                    return Ok(Message::NotifyByeBye {
                        notification_type: String::from(*nt),
                        unique_service_name: String::from(*usn),
                    });
                }
            }
            _ => {}
        },
        "HTTP/1.1 200 OK" => {
            if let (Some(st), Some(usn), Some(loc)) =
                (map.get("ST"), map.get("USN"), map.get("LOCATION"))
            {
                return Ok(Message::Response {
                    search_target: String::from(*st),
                    unique_service_name: String::from(*usn),
                    location: String::from(*loc),
                });
            }
        }
        "M-SEARCH * HTTP/1.1" => {
            if let Some(st) = map.get("ST") {
                let maximum_wait_sec = match map.get("MX") {
                    None => None,
                    Some(mx) => {
                        Some(mx.parse::<u8>().map_err(|_| Error::InvalidData)?)
                    }
                };
                return Ok(Message::Search {
                    search_target: String::from(*st),
                    maximum_wait_sec,
                });
            }
        }
        _ => {}
    }
    Err(Error::InvalidData)
}

/// A fixed-buffer writer that refuses to overflow
struct MessageCursor<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> MessageCursor<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        MessageCursor { buf, offset: 0 }
    }

    const fn position(&self) -> usize {
        self.offset
    }
}

impl std::fmt::Write for MessageCursor<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let n = s.len();
        if n + self.offset > self.buf.len() {
            return Err(std::fmt::Error);
        }
        self.buf[self.offset..self.offset + n].copy_from_slice(s.as_bytes());
        self.offset += n;
        Ok(())
    }
}

/// Build an `M-SEARCH`, returning its length
pub fn build_search(buf: &mut [u8], search_type: &str) -> usize {
    let mut cursor = MessageCursor::new(buf);
    let _ = write!(
        cursor,
        "M-SEARCH * HTTP/1.1\r
HOST: 239.255.255.250:1900\r
MAN: \"ssdp:discover\"\r
MX: 3\r
ST: {search_type}\r
\r\n"
    );
    cursor.position()
}

/// Build a search reply, returning its length
pub fn build_response(
    buf: &mut [u8],
    search_target: &str,
    unique_service_name: &str,
    location: &str,
    max_age_secs: u64,
) -> usize {
    let mut cursor = MessageCursor::new(buf);
    let _ = write!(
        cursor,
        "HTTP/1.1 200 OK\r
CACHE-CONTROL: max-age={max_age_secs}\r
ST: {search_target}\r
SERVER: {SERVER}\r
EXT:\r
LOCATION: {location}\r
USN: {unique_service_name}\r
\r\n"
    );
    cursor.position()
}

/// Build a `NOTIFY ssdp:alive`, returning its length
pub fn build_notify(
    buf: &mut [u8],
    notification_type: &str,
    unique_service_name: &str,
    location: &str,
    max_age_secs: u64,
) -> usize {
    let mut cursor = MessageCursor::new(buf);
    let _ = write!(
        cursor,
        "NOTIFY * HTTP/1.1\r
HOST: 239.255.255.250:1900\r
CACHE-CONTROL: max-age={max_age_secs}\r
NT: {notification_type}\r
NTS: ssdp:alive\r
SERVER: {SERVER}\r
LOCATION: {location}\r
USN: {unique_service_name}\r
\r\n"
    );
    cursor.position()
}

/// Build a `NOTIFY ssdp:byebye`, returning its length
pub fn build_byebye(
    buf: &mut [u8],
    notification_type: &str,
    unique_service_name: &str,
) -> usize {
    let mut cursor = MessageCursor::new(buf);
    let _ = write!(
        cursor,
        "NOTIFY * HTTP/1.1\r
HOST: 239.255.255.250:1900\r
NT: {notification_type}\r
NTS: ssdp:byebye\r
USN: {unique_service_name}\r
\r\n"
    );
    cursor.position()
}
