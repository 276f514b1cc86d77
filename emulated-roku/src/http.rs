//! HTTP/1.1 request and response types shared by the ECP server
use std::borrow::Cow;
use std::fmt;

/// Request method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// Anything else; always answered with 404
    Other(String),
}

impl Method {
    /// Method token as it appears on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version from the request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// `HTTP/1.0`
    Http10,
    /// `HTTP/1.1`
    Http11,
}

/// A parsed request head
///
/// Bodies are never read: no supported command needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Request target, exactly as sent
    pub target: String,
    /// Protocol version
    pub version: Version,
    /// Header fields in arrival order, values trimmed
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Look up a header, ignoring case
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200
    Ok,
    /// 404
    NotFound,
}

impl Status {
    /// Numeric status code
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NotFound => 404,
        }
    }

    /// Reason phrase
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotFound => "Not Found",
        }
    }
}

/// A complete response, sent with `Connection: close`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line
    pub status: Status,
    /// `Content-Type`, omitted when there is no body
    pub content_type: Option<&'static str>,
    /// Body bytes
    pub body: Cow<'static, [u8]>,
}

impl Response {
    /// 200 with an empty body
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            content_type: None,
            body: Cow::Borrowed(&[]),
        }
    }

    /// 404 with an empty body
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            content_type: None,
            body: Cow::Borrowed(&[]),
        }
    }

    /// 200 with a `text/xml` body
    #[must_use]
    pub fn xml(body: impl Into<Cow<'static, str>>) -> Self {
        let body = match body.into() {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        };
        Self {
            status: Status::Ok,
            content_type: Some("text/xml; charset=utf-8"),
            body,
        }
    }

    /// 200 with a fixed binary body
    #[must_use]
    pub fn binary(content_type: &'static str, body: &'static [u8]) -> Self {
        Self {
            status: Status::Ok,
            content_type: Some(content_type),
            body: Cow::Borrowed(body),
        }
    }

    /// Serialise head and body for the wire
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.code(),
            self.status.reason()
        );
        if let Some(ct) = self.content_type {
            head.push_str("Content-Type: ");
            head.push_str(ct);
            head.push_str("\r\n");
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
