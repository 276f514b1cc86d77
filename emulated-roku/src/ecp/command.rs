//! Mapping requests onto ECP commands
use crate::dispatch::{KeyEvent, KeyEventType};
use crate::http::{Method, Request};
use percent_encoding::percent_decode_str;

/// A recognised ECP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `GET /`: the device description
    Description,
    /// `POST /keypress|keydown|keyup/<key>`
    Key(KeyEvent),
    /// `GET /query/apps`
    QueryApps,
    /// `GET /query/active-app`
    QueryActiveApp,
    /// `GET /query/device-info`
    QueryDeviceInfo,
    /// `GET /query/icon/<app>`
    QueryIcon(String),
    /// `POST /launch/<app>`
    Launch(String),
    /// `POST /input`
    Input,
    /// `POST /search`
    Search,
}

/// A well-formed request for something not implemented; answered 404
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported ECP command {method} {path}")]
pub struct UnsupportedCommand {
    /// Request method
    pub method: Method,
    /// Request path, without any query string
    pub path: String,
}

/// The path part of a request target
///
/// Accepts origin form (`/keypress/Home?x=1`) and absolute form
/// (`http://host:8060/keypress/Home`).
fn target_path(target: &str) -> Option<String> {
    if target.starts_with('/') {
        let path = target.split_once('?').map_or(target, |(p, _)| p);
        Some(path.to_string())
    } else {
        let url = url::Url::parse(target).ok()?;
        Some(url.path().to_string())
    }
}

/// Decode one path segment: `%XX` escapes, and `+` as space
///
/// Invalid UTF-8 after decoding is replaced rather than rejected.
#[must_use]
pub fn decode_segment(segment: &str) -> String {
    let spaced = segment.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// The single, non-empty segment following `prefix`
fn tail<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}

fn key_event(path: &str) -> Option<KeyEvent> {
    let (kind, raw) = path.strip_prefix('/')?.split_once('/')?;
    let event_type = kind.parse::<KeyEventType>().ok()?;
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    let key = decode_segment(raw);
    if key.is_empty() {
        return None;
    }
    Some(KeyEvent::new(event_type, key))
}

/// Work out which command a request is
///
/// # Errors
///
/// Returns [`UnsupportedCommand`] for every method and path
/// combination not listed in [`Command`], including key commands
/// whose key is empty.
pub fn route(request: &Request) -> Result<Command, UnsupportedCommand> {
    let unsupported = |path: String| UnsupportedCommand {
        method: request.method.clone(),
        path,
    };
    let Some(path) = target_path(&request.target) else {
        return Err(unsupported(request.target.clone()));
    };

    let command = match request.method {
        Method::Get => match path.as_str() {
            "/" => Some(Command::Description),
            "/query/apps" => Some(Command::QueryApps),
            "/query/active-app" => Some(Command::QueryActiveApp),
            "/query/device-info" => Some(Command::QueryDeviceInfo),
            p => tail(p, "/query/icon/")
                .map(|app| Command::QueryIcon(decode_segment(app))),
        },
        Method::Post => match path.as_str() {
            "/input" => Some(Command::Input),
            "/search" => Some(Command::Search),
            p => key_event(p).map(Command::Key).or_else(|| {
                tail(p, "/launch/")
                    .map(|app| Command::Launch(decode_segment(app)))
            }),
        },
        Method::Other(_) => None,
    };
    command.ok_or_else(|| unsupported(path))
}

#[cfg(test)]
#[path = "../tests/command.rs"]
mod tests;
