//! The lifecycle of one emulated device: configure, set up, tick, stop
use crate::config::{ConfigError, RokuConfig};
use crate::description::DESCRIPTION_PATH;
use crate::dispatch::{Dispatcher, KeyListener};
use crate::ecp::CommandServer;
use crate::error::Error;
use crate::identity::DeviceIdentity;
use crate::server::{HttpServer, HttpSettings};
use mio::{Events, Poll, Token};
use roku_netif::NetworkEvent;
use roku_ssdp::{Advertisement, Timings, ROKU_ECP};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::info;

const SSDP_TOKEN: Token = Token(0);
const HTTP_TOKEN: Token = Token(1);

struct Running {
    identity: DeviceIdentity,
    poll: Poll,
    events: Events,
    ssdp: roku_ssdp::Service,
    http: HttpServer,
    commands: CommandServer,
    dispatcher: Dispatcher,
}

impl Running {
    fn poll(&mut self, timeout: Duration) -> Result<(), Error> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                self.events.clear();
            }
            Err(e) => return Err(Error::Poll(e)),
        }
        for event in &self.events {
            // HTTP readiness needs no bookkeeping: every tick tries
            // every connection
            if event.token() == SSDP_TOKEN {
                self.ssdp.ready(event);
            }
        }
        Ok(())
    }
}

enum Phase {
    Configuring(Dispatcher),
    Running(Box<Running>),
    Stopped,
}

/// An emulated Roku: SSDP responder plus ECP server, driven by ticks
///
/// Configure it (name, port, listeners), call
/// [`setup`](EmulatedRoku::setup) once, then call
/// [`tick`](EmulatedRoku::tick) periodically from a single thread.
/// Nothing here blocks except [`wait`](EmulatedRoku::wait).
pub struct EmulatedRoku {
    device_name: String,
    port: u16,
    ssdp_port: u16,
    timings: Timings,
    http_settings: HttpSettings,
    phase: Phase,
}

impl Default for EmulatedRoku {
    fn default() -> Self {
        Self::new(&RokuConfig::default())
    }
}

impl EmulatedRoku {
    /// A device, not yet set up, using values from `config`
    ///
    /// `config` should already have been validated. Its `on_key_press`
    /// bindings are not registered here; see
    /// [`add_listener`](EmulatedRoku::add_listener).
    #[must_use]
    pub fn new(config: &RokuConfig) -> Self {
        Self {
            device_name: config.device_name.clone(),
            port: config.port,
            ssdp_port: config.ssdp.port,
            timings: config.timings(),
            http_settings: config.http_settings(),
            phase: Phase::Configuring(Dispatcher::new()),
        }
    }

    /// Change the device name
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] after setup, or
    /// [`ConfigError::EmptyDeviceName`].
    pub fn set_device_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.configuring()?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyDeviceName.into());
        }
        self.device_name = name;
        Ok(())
    }

    /// Change the ECP port; 0 picks an ephemeral port at setup
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] after setup.
    pub fn set_port(&mut self, port: u16) -> Result<(), Error> {
        self.configuring()?;
        self.port = port;
        Ok(())
    }

    /// Register a key listener, after any already registered
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] after setup.
    pub fn add_listener(&mut self, listener: Box<dyn KeyListener>) -> Result<(), Error> {
        match &mut self.phase {
            Phase::Configuring(dispatcher) => {
                dispatcher.register(listener);
                Ok(())
            }
            _ => Err(Error::AlreadyStarted),
        }
    }

    /// Register a closure as a key listener
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] after setup.
    pub fn on_key_press<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: Fn(&str, &str) + 'static,
    {
        self.add_listener(Box::new(f))
    }

    /// Bind sockets and start advertising
    ///
    /// On failure nothing is left bound and the device can be
    /// reconfigured and set up again.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if called twice, or [`Error::Setup`]
    /// naming the part that could not be set up.
    pub fn setup(&mut self, now: Instant) -> Result<(), Error> {
        let Phase::Configuring(_) = self.phase else {
            return Err(Error::AlreadyStarted);
        };
        let mut running = self.start(now)?;
        if let Phase::Configuring(dispatcher) =
            std::mem::replace(&mut self.phase, Phase::Stopped)
        {
            running.dispatcher = dispatcher;
        }
        info!(
            name = running.identity.device_name(),
            serial = running.identity.serial(),
            port = running.identity.port(),
            listeners = running.dispatcher.len(),
            "emulated Roku started"
        );
        self.phase = Phase::Running(running);
        Ok(())
    }

    fn start(&self, now: Instant) -> Result<Box<Running>, Error> {
        let poll = Poll::new().map_err(|e| Error::setup("poller", e))?;
        let http = HttpServer::bind(
            poll.registry(),
            HTTP_TOKEN,
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port)),
            self.http_settings,
        )
        .map_err(|e| Error::setup("ECP listener", e))?;
        let port = http
            .local_addr()
            .map_err(|e| Error::setup("ECP listener", e))?
            .port();
        let identity = DeviceIdentity::new(&self.device_name, port);

        let mut ssdp = roku_ssdp::Service::new(
            poll.registry(),
            SSDP_TOKEN,
            self.ssdp_port,
            &self.timings,
            now,
        )
        .map_err(|e| Error::setup("SSDP responder", e))?;
        // The host is replaced per message with the address sent from
        let location = url::Url::parse(&format!("http://127.0.0.1:{port}{DESCRIPTION_PATH}"))
            .map_err(|e| Error::setup("SSDP location", e))?;
        ssdp.advertise(
            identity.unique_service_name(),
            Advertisement {
                notification_type: ROKU_ECP.to_string(),
                location,
            },
            now,
        );

        Ok(Box::new(Running {
            commands: CommandServer::new(&identity),
            identity,
            poll,
            events: Events::with_capacity(64),
            ssdp,
            http,
            dispatcher: Dispatcher::new(),
        }))
    }

    /// Do whatever is due, without blocking
    ///
    /// Sends announcements that have fallen due, answers waiting
    /// searches, and services every HTTP connection once.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] before setup or after shutdown;
    /// [`Error::Poll`] if the poller fails.
    pub fn tick(&mut self, now: Instant) -> Result<(), Error> {
        let running = self.running()?;
        running.poll(Duration::ZERO)?;

        running.ssdp.tick(now);
        running.ssdp.drain();

        let Running {
            poll,
            http,
            commands,
            dispatcher,
            ..
        } = running;
        http.service(poll.registry(), now, |request| {
            commands.handle(request, dispatcher)
        });
        Ok(())
    }

    /// Sleep until a socket is ready, work falls due, or `timeout`
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] before setup or after shutdown;
    /// [`Error::Poll`] if the poller fails.
    pub fn wait(&mut self, timeout: Duration) -> Result<(), Error> {
        let now = Instant::now();
        let timeout = self
            .next_wakeup(now)
            .map_or(timeout, |due| due.min(timeout));
        self.running()?.poll(timeout)
    }

    /// Pass on a link or address change seen by the host
    ///
    /// New multicast-capable links join the SSDP group and new
    /// addresses are announced at once.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] unless running; [`Error::Network`] if the
    /// multicast group cannot be joined or left.
    pub fn on_network_event(&mut self, event: &NetworkEvent) -> Result<(), Error> {
        self.running()?
            .ssdp
            .on_network_event(event)
            .map_err(Error::Network)
    }

    /// How long until a tick next has timed work, if running
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        let Phase::Running(r) = &self.phase else {
            return None;
        };
        let ssdp = if r.ssdp.is_readable() {
            Duration::ZERO
        } else {
            r.ssdp.next_wakeup(now)
        };
        Some(r.http.next_wakeup(now).map_or(ssdp, |h| h.min(ssdp)))
    }

    /// Withdraw the advertisement and release all sockets
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] unless running.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.phase, Phase::Stopped) {
            Phase::Running(mut r) => {
                let usn = r.identity.unique_service_name();
                r.ssdp.deadvertise(&usn);
                info!(name = r.identity.device_name(), "emulated Roku stopped");
                Ok(())
            }
            other => {
                self.phase = other;
                Err(Error::NotStarted)
            }
        }
    }

    /// The device identity, once set up
    #[must_use]
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        match &self.phase {
            Phase::Running(r) => Some(&r.identity),
            _ => None,
        }
    }

    /// The ECP listening address, once set up
    #[must_use]
    pub fn http_addr(&self) -> Option<SocketAddr> {
        match &self.phase {
            Phase::Running(r) => r.http.local_addr().ok(),
            _ => None,
        }
    }

    /// The SSDP responder's address, once set up
    #[must_use]
    pub fn ssdp_addr(&self) -> Option<SocketAddr> {
        match &self.phase {
            Phase::Running(r) => r.ssdp.local_addr().ok(),
            _ => None,
        }
    }

    /// Whether setup has succeeded and shutdown not yet happened
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    /// The configured device name
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The configured ECP port (0 for ephemeral)
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    fn configuring(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Configuring(_) => Ok(()),
            _ => Err(Error::AlreadyStarted),
        }
    }

    fn running(&mut self) -> Result<&mut Running, Error> {
        match &mut self.phase {
            Phase::Running(r) => Ok(&mut **r),
            _ => Err(Error::NotStarted),
        }
    }
}

impl std::fmt::Debug for EmulatedRoku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatedRoku")
            .field("device_name", &self.device_name)
            .field("port", &self.port)
            .field("running", &self.is_running())
            .finish()
    }
}
