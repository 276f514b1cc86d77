//! Non-blocking HTTP/1.1 server, one request per connection
//!
//! All sockets are registered with the caller's `mio::Poll` under a
//! single token. Readiness only wakes the loop: [`HttpServer::service`]
//! tries every connection until `WouldBlock` on each call, so missed or
//! merged edge events cost nothing.
use crate::ecp::RequestParser;
use crate::http::{Request, Response};
use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};
use slotmap::{new_key_type, SlotMap};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

new_key_type! { struct ConnectionKey; }

/// Connection limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// A connection with no traffic for this long is closed, as is an
    /// answered one this long after its response went out
    pub idle_timeout: Duration,
    /// Further connections are refused while this many are open
    pub max_connections: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5),
            max_connections: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Writing,
    /// Response sent and write side shut; discarding input until the
    /// peer closes too
    Lingering,
}

enum Progress {
    Open,
    Closed,
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    parser: RequestParser,
    outgoing: Vec<u8>,
    written: usize,
    last_activity: Instant,
    phase: Phase,
}

impl Connection {
    fn pump<F>(&mut self, now: Instant, handler: &mut F) -> Progress
    where
        F: FnMut(&Request) -> Response,
    {
        if self.phase == Phase::Reading {
            if let Progress::Closed = self.read(now, handler) {
                return Progress::Closed;
            }
        }
        if self.phase == Phase::Writing {
            if let Progress::Closed = self.write(now) {
                return Progress::Closed;
            }
        }
        if self.phase == Phase::Lingering {
            return self.linger();
        }
        Progress::Open
    }

    fn read<F>(&mut self, now: Instant, handler: &mut F) -> Progress
    where
        F: FnMut(&Request) -> Response,
    {
        let mut buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    debug!(peer = %self.peer, "closed before a complete request");
                    return Progress::Closed;
                }
                Ok(n) => {
                    self.last_activity = now;
                    match self.parser.feed(&buf[0..n]) {
                        Ok(Some(request)) => {
                            let response = handler(&request);
                            debug!(
                                peer = %self.peer,
                                method = %request.method,
                                target = %request.target,
                                status = response.status.code(),
                                "request"
                            );
                            self.outgoing = response.to_bytes();
                            self.phase = Phase::Writing;
                            return Progress::Open;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            debug!(peer = %self.peer, error = %e, "dropping connection");
                            return Progress::Closed;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Progress::Open
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "read failed");
                    return Progress::Closed;
                }
            }
        }
    }

    fn write(&mut self, now: Instant) -> Progress {
        while self.written < self.outgoing.len() {
            match self.stream.write(&self.outgoing[self.written..]) {
                Ok(0) => return Progress::Closed,
                Ok(n) => {
                    self.written += n;
                    self.last_activity = now;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Progress::Open
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "write failed");
                    return Progress::Closed;
                }
            }
        }
        if let Err(e) = self.stream.shutdown(Shutdown::Write) {
            debug!(peer = %self.peer, error = %e, "shutdown failed");
            return Progress::Closed;
        }
        self.last_activity = now;
        self.phase = Phase::Lingering;
        Progress::Open
    }

    /// Input here never moves `last_activity`, so an answered
    /// connection is gone within one idle timeout of the flush
    fn linger(&mut self) -> Progress {
        let mut buf = [0u8; 256];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Progress::Closed,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Progress::Open
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return Progress::Closed,
            }
        }
    }
}

/// The listening socket and its open connections
pub struct HttpServer {
    listener: TcpListener,
    token: Token,
    settings: HttpSettings,
    connections: SlotMap<ConnectionKey, Connection>,
}

impl HttpServer {
    /// Bind, listen and register for readability
    ///
    /// Port 0 picks an ephemeral port; see [`HttpServer::local_addr`].
    ///
    /// # Errors
    ///
    /// Passes on failures from `bind`, `listen` or registration.
    pub fn bind(
        registry: &Registry,
        token: Token,
        addr: SocketAddr,
        settings: HttpSettings,
    ) -> io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        registry.register(&mut listener, token, Interest::READABLE)?;
        info!(addr = %listener.local_addr()?, "ECP server listening");
        Ok(Self {
            listener,
            token,
            settings,
            connections: SlotMap::with_key(),
        })
    }

    /// The address actually bound
    ///
    /// # Errors
    ///
    /// Passes on errors from `getsockname`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of connections currently open
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Accept, read, answer and close whatever is ready
    ///
    /// `handler` is called once for each complete request head, and its
    /// response is sent before the connection is closed. Connections
    /// with malformed or oversized requests are closed without a
    /// response. Returns the number of requests handled.
    pub fn service<F>(
        &mut self,
        registry: &Registry,
        now: Instant,
        mut handler: F,
    ) -> usize
    where
        F: FnMut(&Request) -> Response,
    {
        self.accept(registry, now);

        let mut handled = 0;
        let mut finished = Vec::new();
        for (key, conn) in &mut self.connections {
            let was_reading = conn.phase == Phase::Reading;
            let progress = conn.pump(now, &mut handler);
            if was_reading && conn.phase != Phase::Reading {
                handled += 1;
            }
            let idle = now.saturating_duration_since(conn.last_activity)
                >= self.settings.idle_timeout;
            match progress {
                Progress::Closed => finished.push(key),
                Progress::Open if idle => {
                    debug!(peer = %conn.peer, "idle timeout");
                    finished.push(key);
                }
                Progress::Open => {}
            }
        }

        for key in finished {
            if let Some(mut conn) = self.connections.remove(key) {
                // Closed on drop
                let _ = registry.deregister(&mut conn.stream);
            }
        }
        handled
    }

    /// When the earliest idle timeout falls due, if anything is open
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        self.connections
            .values()
            .map(|c| {
                (c.last_activity + self.settings.idle_timeout)
                    .saturating_duration_since(now)
            })
            .min()
    }

    fn accept(&mut self, registry: &Registry, now: Instant) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    if self.connections.len() >= self.settings.max_connections {
                        warn!(%peer, "too many connections, refusing");
                        continue;
                    }
                    if let Err(e) = registry.register(
                        &mut stream,
                        self.token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        warn!(%peer, error = %e, "could not register connection");
                        continue;
                    }
                    debug!(%peer, "accepted");
                    self.connections.insert(Connection {
                        stream,
                        peer,
                        parser: RequestParser::new(),
                        outgoing: Vec::new(),
                        written: 0,
                        last_activity: now,
                        phase: Phase::Reading,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("listener", &self.listener)
            .field("connections", &self.connections.len())
            .finish()
    }
}
