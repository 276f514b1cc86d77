//! Fanning key events out to registered listeners
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use tracing::warn;

/// What a listener may return on failure
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// The three kinds of key command ECP supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventType {
    /// `POST /keydown/<key>`
    KeyDown,
    /// `POST /keyup/<key>`
    KeyUp,
    /// `POST /keypress/<key>`, a down and up together
    KeyPress,
}

impl KeyEventType {
    /// The name used in URLs and passed to listeners
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::KeyPress => "keypress",
        }
    }
}

impl fmt::Display for KeyEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Not one of `keydown`, `keyup` or `keypress`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key event type {0:?}")]
pub struct UnknownEventType(pub String);

impl FromStr for KeyEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keydown" => Ok(Self::KeyDown),
            "keyup" => Ok(Self::KeyUp),
            "keypress" => Ok(Self::KeyPress),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

/// One received key command
///
/// Lives only for the duration of a single [`Dispatcher::emit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Down, up or press
    pub event_type: KeyEventType,
    /// Logical key name, already URL-decoded (e.g. `Home`, `Lit_a`)
    pub key: String,
}

impl KeyEvent {
    /// Construct a `KeyEvent`
    pub fn new(event_type: KeyEventType, key: impl Into<String>) -> Self {
        Self {
            event_type,
            key: key.into(),
        }
    }
}

/// Something that wants to hear about key events
///
/// Closures taking `(type, key)` are listeners too.
#[cfg_attr(test, mockall::automock)]
pub trait KeyListener {
    /// Called synchronously for every key event
    ///
    /// # Errors
    ///
    /// A failing listener is logged and otherwise ignored; it does not
    /// stop the event reaching the remaining listeners.
    fn notify(&self, event_type: &str, key: &str) -> Result<(), ListenerError>;
}

impl<F> KeyListener for F
where
    F: Fn(&str, &str),
{
    fn notify(&self, event_type: &str, key: &str) -> Result<(), ListenerError> {
        self(event_type, key);
        Ok(())
    }
}

/// The result of one [`Dispatcher::emit`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned `Err` or panicked
    pub failed: usize,
}

/// An ordered, append-only registry of key listeners
///
/// Listeners are called in registration order. Each call is isolated:
/// an error or panic in one listener is logged and the rest still run.
#[derive(Default)]
pub struct Dispatcher {
    listeners: Vec<Box<dyn KeyListener>>,
}

impl Dispatcher {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener at the end of the notification order
    pub fn register(&mut self, listener: Box<dyn KeyListener>) {
        self.listeners.push(listener);
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listeners are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener
    pub fn emit(&self, event: &KeyEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let event_type = event.event_type.as_str();
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| {
                listener.notify(event_type, &event.key)
            }));
            match result {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    warn!(listener = index, error = %e, "key listener failed");
                    outcome.failed += 1;
                }
                Err(_) => {
                    warn!(listener = index, "key listener panicked");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/dispatch.rs"]
mod tests;
