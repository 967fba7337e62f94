//! Line framing module
//!
//! Reads one logical line at a time from a buffered byte stream.
//! Both CRLF and bare LF terminators are accepted and stripped.

use std::io::{self, BufRead};

/// How a final line without a terminator is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingLine {
    /// Deliver the buffered partial content as an ordinary line
    #[default]
    Accept,
    /// Fail with `UnexpectedEof`
    Reject,
}

/// Read the next line, with its terminator removed
///
/// Returns `Ok(None)` when the stream ends before any byte of a new line
/// was read. A stream that ends mid-line is handled according to `policy`.
///
/// # Examples
/// ```
/// use mini_http::http::line::{read_line, TrailingLine};
/// use std::io::Cursor;
///
/// let mut input = Cursor::new("GET / HTTP/1.1\r\nHost: x\n");
/// assert_eq!(read_line(&mut input, TrailingLine::Accept).unwrap().as_deref(), Some("GET / HTTP/1.1"));
/// assert_eq!(read_line(&mut input, TrailingLine::Accept).unwrap().as_deref(), Some("Host: x"));
/// assert_eq!(read_line(&mut input, TrailingLine::Accept).unwrap(), None);
/// ```
pub fn read_line<R: BufRead + ?Sized>(
    reader: &mut R,
    policy: TrailingLine,
) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }

    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if policy == TrailingLine::Reject {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended in the middle of a line",
        ));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
