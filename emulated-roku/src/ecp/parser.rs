//! Incremental HTTP request-head parser
//!
//! Bytes are fed in whatever pieces the socket delivers them; the
//! outcome is the same however the stream is split.
use crate::http::{Method, Request, Version};

/// Longest accepted request line, excluding its line ending
pub const MAX_REQUEST_LINE: usize = 2048;

/// Longest accepted request head, including line endings
pub const MAX_HEAD: usize = 8192;

/// Why a request could not be parsed
///
/// The connection is dropped without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Request line exceeds [`MAX_REQUEST_LINE`]
    #[error("request line too long")]
    RequestLineTooLong,
    /// Request head exceeds [`MAX_HEAD`]
    #[error("request head too large")]
    HeadersTooLarge,
    /// Not `METHOD SP TARGET SP VERSION`
    #[error("malformed request line")]
    MalformedRequestLine,
    /// Neither `HTTP/1.0` nor `HTTP/1.1`
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    /// Header line without a colon, or with an empty name
    #[error("malformed header line")]
    MalformedHeader,
    /// Head is not valid UTF-8
    #[error("request head is not UTF-8")]
    InvalidUtf8,
}

/// Where the parser has got to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing useful yet
    AwaitingRequestLine,
    /// Request line seen, reading header fields
    AwaitingHeaders,
    /// Blank line seen; further input is ignored
    Complete,
}

struct RequestLine {
    method: Method,
    target: String,
    version: Version,
}

/// Parser for one request on one connection
pub struct RequestParser {
    state: State,
    buffer: Vec<u8>,
    head_len: usize,
    request_line: Option<RequestLine>,
    headers: Vec<(String, String)>,
    failed: Option<ParseError>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    /// A parser awaiting its request line
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::AwaitingRequestLine,
            buffer: Vec::new(),
            head_len: 0,
            request_line: None,
            headers: Vec::new(),
            failed: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Advance as far as the buffered bytes allow
    ///
    /// Returns the request exactly once, on the call that completes
    /// its head; `Ok(None)` means more bytes are needed (or the request
    /// was already returned).
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] met, and the same error for
    /// every later call.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<Request>, ParseError> {
        if let Some(e) = self.failed {
            return Err(e);
        }
        if self.state == State::Complete {
            return Ok(None);
        }
        self.buffer.extend_from_slice(data);
        let result = self.advance();
        if let Err(e) = result {
            self.failed = Some(e);
            self.buffer = Vec::new();
        }
        result
    }

    fn advance(&mut self) -> Result<Option<Request>, ParseError> {
        let mut start = 0;
        while let Some(n) = self.buffer[start..].iter().position(|b| *b == b'\n')
        {
            let end = start + n;
            let consumed = end + 1 - start;
            let line_end = if end > start && self.buffer[end - 1] == b'\r' {
                end - 1
            } else {
                end
            };
            let line = start..line_end;
            start = end + 1;

            match self.state {
                State::AwaitingRequestLine => {
                    if line.len() > MAX_REQUEST_LINE {
                        return Err(ParseError::RequestLineTooLong);
                    }
                    self.count_head(consumed)?;
                    // Leading blank lines are tolerated (RFC 9112 s2.2)
                    if !line.is_empty() {
                        self.request_line =
                            Some(parse_request_line(&self.buffer[line])?);
                        self.state = State::AwaitingHeaders;
                    }
                }
                State::AwaitingHeaders => {
                    self.count_head(consumed)?;
                    if line.is_empty() {
                        self.state = State::Complete;
                        self.buffer = Vec::new();
                        return Ok(self.take_request());
                    }
                    self.headers.push(parse_header(&self.buffer[line])?);
                }
                State::Complete => return Ok(None),
            }
        }
        self.buffer.drain(0..start);

        // Whatever is left is an incomplete line which can only grow
        let pending = self.buffer.len();
        match self.state {
            State::AwaitingRequestLine if pending > MAX_REQUEST_LINE + 1 => {
                Err(ParseError::RequestLineTooLong)
            }
            State::AwaitingHeaders if self.head_len + pending > MAX_HEAD => {
                Err(ParseError::HeadersTooLarge)
            }
            _ => Ok(None),
        }
    }

    fn count_head(&mut self, n: usize) -> Result<(), ParseError> {
        self.head_len += n;
        if self.head_len > MAX_HEAD {
            Err(ParseError::HeadersTooLarge)
        } else {
            Ok(())
        }
    }

    fn take_request(&mut self) -> Option<Request> {
        let line = self.request_line.take()?;
        Some(Request {
            method: line.method,
            target: line.target,
            version: line.version,
            headers: std::mem::take(&mut self.headers),
        })
    }
}

fn parse_request_line(line: &[u8]) -> Result<RequestLine, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::MalformedRequestLine);
    };
    if method.is_empty()
        || target.is_empty()
        || !method.bytes().all(|b| b.is_ascii_alphabetic())
    {
        return Err(ParseError::MalformedRequestLine);
    }
    let version = match version {
        "HTTP/1.1" => Version::Http11,
        "HTTP/1.0" => Version::Http10,
        v if v.starts_with("HTTP/") => {
            return Err(ParseError::UnsupportedVersion)
        }
        _ => return Err(ParseError::MalformedRequestLine),
    };
    Ok(RequestLine {
        method: Method::from(method),
        target: target.to_string(),
        version,
    })
}

fn parse_header(line: &[u8]) -> Result<(String, String), ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    let (name, value) = line.split_once(':').ok_or(ParseError::MalformedHeader)?;
    if name.is_empty() || name.ends_with(char::is_whitespace) {
        return Err(ParseError::MalformedHeader);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
#[path = "../tests/parser.rs"]
mod tests;
