//! Lifecycle errors
use crate::config::ConfigError;

/// Errors from the [`EmulatedRoku`](crate::controller::EmulatedRoku) lifecycle
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A socket or poller could not be set up; the device is not running
    #[error("setup failed: {what}: {source}")]
    Setup {
        /// Which part failed
        what: &'static str,
        /// Underlying cause
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration can only change before setup
    #[error("already started")]
    AlreadyStarted,

    /// Ticking or shutting down before setup
    #[error("not started")]
    NotStarted,

    /// Invalid configuration value
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Following a network change failed
    #[error("could not follow network change: {0}")]
    Network(#[source] roku_ssdp::Error),

    /// Polling for socket readiness failed
    #[error("poll failed: {0}")]
    Poll(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn setup<E>(what: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Setup {
            what,
            source: source.into(),
        }
    }
}
