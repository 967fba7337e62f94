//! HTTP response module
//!
//! A response carries only status, content type and body. The writer adds
//! `Date`, `Server` and `Content-Length` and nothing else.

use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::sync::Arc;

/// Content type used when a response does not name one
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Source of the `Date` header value
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant, for tests and reproducible output
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Outgoing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response; the status text is the standard reason phrase
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).unwrap_or(UNKNOWN_REASON).to_string(),
            content_type: content_type.to_string(),
            body: body.into(),
        }
    }

    /// 200 with a plain text body
    pub fn text(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, DEFAULT_CONTENT_TYPE, body)
    }

    /// 200 with a JSON body
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "application/json", body)
    }

    /// Plain text error page: "<status> <reason>"
    pub fn error(status: u16) -> Self {
        let reason = reason_phrase(status).unwrap_or(UNKNOWN_REASON);
        Self::new(status, DEFAULT_CONTENT_TYPE, format!("{status} {reason}\r\n"))
    }

    pub fn bad_request() -> Self {
        Self::new(400, DEFAULT_CONTENT_TYPE, "bad request\r\n")
    }

    pub fn not_found() -> Self {
        Self::error(404)
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405)
    }

    pub fn payload_too_large() -> Self {
        Self::error(413)
    }

    pub fn not_implemented() -> Self {
        Self::error(501)
    }
}

/// Reason phrase for a status code with no entry in [`reason_phrase`]
pub const UNKNOWN_REASON: &str = "Unknown Status";

/// Standard reason phrase for the status codes this server emits
pub const fn reason_phrase(status: u16) -> Option<&'static str> {
    let phrase = match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => return None,
    };
    Some(phrase)
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Serializes responses with a fixed server identifier and an injected clock
#[derive(Clone)]
pub struct ResponseWriter {
    server_name: String,
    clock: Arc<dyn Clock>,
}

impl ResponseWriter {
    pub fn new(server_name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            server_name: server_name.into(),
            clock,
        }
    }

    /// Writer stamped with the wall clock
    pub fn with_system_clock(server_name: impl Into<String>) -> Self {
        Self::new(server_name, Arc::new(SystemClock))
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Write the status line, headers and body, then flush
    pub fn write<W: Write + ?Sized>(&self, w: &mut W, response: &Response) -> io::Result<()> {
        let status_text = if response.status_text.is_empty() {
            reason_phrase(response.status).unwrap_or("OK")
        } else {
            response.status_text.as_str()
        };
        let content_type = if response.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            response.content_type.as_str()
        };

        write!(w, "HTTP/1.1 {} {status_text}\r\n", response.status)?;
        write!(w, "Date: {}\r\n", http_date(&self.clock.now()))?;
        write!(w, "Server: {}\r\n", self.server_name)?;
        write!(w, "Content-Type: {content_type}\r\n")?;
        write!(w, "Content-Length: {}\r\n", response.body.len())?;
        w.write_all(b"\r\n")?;
        if !response.body.is_empty() {
            w.write_all(&response.body)?;
        }
        w.flush()
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}
