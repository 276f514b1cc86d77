//! The configuration record: file, command line, defaults
//!
//! Precedence is command line, then file, then the defaults below.
use crate::cli::Args;
use crate::dispatch::KeyEventType;
use crate::server::HttpSettings;
use roku_ssdp::Timings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device name when none is configured
pub const DEFAULT_DEVICE_NAME: &str = "ESPHome Roku";

/// ECP port when none is configured
pub const DEFAULT_PORT: u16 = 8060;

/// Config file looked for in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "emulated-roku.toml";

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_loop_interval_ms() -> u64 {
    16
}

/// Everything needed to run one emulated device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RokuConfig {
    /// Friendly name; also the seed for serial, UUID and MAC
    pub device_name: String,
    /// ECP HTTP port
    pub port: u16,
    /// Discovery settings
    pub ssdp: SsdpConfig,
    /// HTTP connection limits
    pub http: HttpConfig,
    /// Sleep between ticks when nothing is pending
    pub loop_interval_ms: u64,
    /// What to do with key events
    pub on_key_press: Vec<TriggerBinding>,
}

impl Default for RokuConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            port: default_port(),
            ssdp: SsdpConfig::default(),
            http: HttpConfig::default(),
            loop_interval_ms: default_loop_interval_ms(),
            on_key_press: Vec::new(),
        }
    }
}

/// `[ssdp]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SsdpConfig {
    /// Local UDP port for the responder
    pub port: u16,
    /// Seconds between `ssdp:alive` salvos
    pub announce_interval_secs: u64,
    /// Seconds between multicast group re-joins
    pub membership_refresh_secs: u64,
    /// `CACHE-CONTROL: max-age` in outgoing messages
    pub max_age_secs: u64,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            port: roku_ssdp::SSDP_PORT,
            announce_interval_secs: 60,
            membership_refresh_secs: 60,
            max_age_secs: 300,
        }
    }
}

/// `[http]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Milliseconds without traffic before a connection is closed
    pub idle_timeout_ms: u64,
    /// Simultaneous connections; extra ones are closed at once
    pub max_connections: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 5000,
            max_connections: 8,
        }
    }
}

/// One `[[on_key_press]]` entry
///
/// Each filter left out matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriggerBinding {
    /// `keydown`, `keyup` or `keypress`
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// Key name, e.g. `Home` or `Lit_a`
    #[serde(default)]
    pub key: Option<String>,
    /// Logged when the binding fires
    #[serde(default)]
    pub message: String,
}

impl TriggerBinding {
    /// Whether an event passes both filters
    #[must_use]
    pub fn matches(&self, event_type: &str, key: &str) -> bool {
        self.event_type.as_deref().map_or(true, |t| t == event_type)
            && self.key.as_deref().map_or(true, |k| k == key)
    }
}

/// Reasons a configuration is rejected
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML, or has wrongly-typed values
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// `device_name` is empty
    #[error("device_name must not be empty")]
    EmptyDeviceName,
    /// `port` is zero
    #[error("port must be between 1 and 65535")]
    ZeroPort,
    /// An interval or timeout is zero
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    /// `http.max_connections` is zero
    #[error("http.max_connections must be greater than zero")]
    ZeroConnections,
    /// A trigger binding names an event type that does not exist
    #[error("on_key_press type {0:?} is not keydown, keyup or keypress")]
    UnknownEventType(String),
}

impl RokuConfig {
    /// Parse a TOML document; unknown keys are ignored
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML. The result is
    /// not validated.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Let command-line flags override file values
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(name) = &args.name {
            self.device_name.clone_from(name);
        }
        if let Some(port) = args.port {
            self.port = port;
        }
    }

    /// Check every value is usable
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::EmptyDeviceName);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        for (name, value) in [
            ("ssdp.announce_interval_secs", self.ssdp.announce_interval_secs),
            (
                "ssdp.membership_refresh_secs",
                self.ssdp.membership_refresh_secs,
            ),
            ("ssdp.max_age_secs", self.ssdp.max_age_secs),
            ("http.idle_timeout_ms", self.http.idle_timeout_ms),
            ("loop_interval_ms", self.loop_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if self.http.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        for binding in &self.on_key_press {
            if let Some(t) = &binding.event_type {
                if t.parse::<KeyEventType>().is_err() {
                    return Err(ConfigError::UnknownEventType(t.clone()));
                }
            }
        }
        Ok(())
    }

    /// SSDP timer settings
    #[must_use]
    pub fn timings(&self) -> Timings {
        Timings {
            announce_interval: Duration::from_secs(self.ssdp.announce_interval_secs),
            membership_refresh: Duration::from_secs(
                self.ssdp.membership_refresh_secs,
            ),
            max_age: Duration::from_secs(self.ssdp.max_age_secs),
        }
    }

    /// HTTP server limits
    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            idle_timeout: Duration::from_millis(self.http.idle_timeout_ms),
            max_connections: self.http.max_connections,
        }
    }

    /// Main-loop sleep between ticks
    #[must_use]
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }
}

/// The file to load: the explicit one, else [`DEFAULT_CONFIG_FILE`] if present
#[must_use]
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
    cwd_config.exists().then_some(cwd_config)
}
