// Connection handling module
// One request per connection: parse, dispatch, respond, close

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppState;
use crate::http::{ParseError, Response};
use crate::logger::{self, AccessLogEntry};

/// Accept a connection, enforce the connection limit, and hand it to the blocking pool.
///
/// # Arguments
///
/// * `stream` - The accepted TCP stream
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    // The parser reads with blocking I/O
    let stream = match stream.into_std().and_then(|s| {
        s.set_nonblocking(false)?;
        Ok(s)
    }) {
        Ok(s) => s,
        Err(e) => {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_connection_error(&peer_addr, &e);
            return;
        }
    };

    let state = Arc::clone(state);
    let conn_counter = Arc::clone(conn_counter);
    tokio::task::spawn_blocking(move || {
        handle_connection(&stream, peer_addr, &state);
        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Serve one request on a blocking TCP stream, then close it.
///
/// The whole exchange shares one deadline taken from
/// `performance.connection_timeout`.
pub fn handle_connection(stream: &TcpStream, peer_addr: SocketAddr, state: &AppState) {
    let expires = state
        .config
        .performance
        .connection_deadline()
        .map(|d| Instant::now() + d);

    let mut reader = BufReader::new(DeadlineStream { stream, expires });
    let mut writer = BufWriter::new(DeadlineStream { stream, expires });

    match serve_connection(&mut reader, &mut writer, peer_addr, state) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            logger::log_peer_closed(&peer_addr);
        }
        Err(e) => logger::log_connection_error(&peer_addr, &e),
    }

    drop(writer);
    let _ = stream.shutdown(Shutdown::Write);
}

/// Parse one request from `reader`, answer it on `writer`.
///
/// Returns the status code written. Protocol errors are answered with an
/// error response. Stream failures (peer gone, deadline hit) return `Err`
/// and nothing is written.
pub fn serve_connection<R, W>(
    reader: &mut R,
    writer: &mut W,
    peer_addr: SocketAddr,
    state: &AppState,
) -> io::Result<u16>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    let started = Instant::now();

    let req = match state.parser.parse(reader) {
        Ok(req) => req,
        Err(ParseError::Io(e)) => return Err(e),
        Err(err) => {
            logger::log_parse_error(&peer_addr, &err);
            let response = error_response(&err);
            state.writer.write(writer, &response)?;
            return Ok(response.status);
        }
    };

    logger::log_headers_count(req.headers.len(), state.config.logging.show_headers);

    let response = state.router.dispatch(&req);
    state.writer.write(writer, &response)?;

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::from_request(peer_addr.to_string(), &req);
        entry.status = response.status;
        entry.body_bytes = response.body.len();
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response.status)
}

/// Response sent for a request that failed to parse
pub fn error_response(err: &ParseError) -> Response {
    match err {
        ParseError::BodyTooLarge { .. } => Response::payload_too_large(),
        ParseError::UnsupportedTransferEncoding { .. } => Response::not_implemented(),
        _ => Response::bad_request(),
    }
}

/// Socket view that fails every read and write once the deadline has passed
struct DeadlineStream<'a> {
    stream: &'a TcpStream,
    expires: Option<Instant>,
}

impl DeadlineStream<'_> {
    fn remaining(&self) -> io::Result<Option<Duration>> {
        let Some(expires) = self.expires else {
            return Ok(None);
        };
        let now = Instant::now();
        if now >= expires {
            return Err(deadline_exceeded());
        }
        Ok(Some(expires - now))
    }
}

fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "connection deadline exceeded")
}

// Socket timeouts surface as WouldBlock on Unix and TimedOut on Windows
fn map_timeout(e: io::Error) -> io::Error {
    if e.kind() == io::ErrorKind::WouldBlock {
        deadline_exceeded()
    } else {
        e
    }
}

impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.set_read_timeout(self.remaining()?)?;
        let mut stream = self.stream;
        stream.read(buf).map_err(map_timeout)
    }
}

impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.set_write_timeout(self.remaining()?)?;
        let mut stream = self.stream;
        stream.write(buf).map_err(map_timeout)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::build_router;
    use crate::http::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    fn state() -> AppState {
        let mut cfg = Config::load_from("does-not-exist/config").unwrap();
        cfg.logging.access_log = false;
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        AppState::with_router(&cfg, build_router(&cfg.routes), Arc::new(clock))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn serve(raw: &[u8]) -> (io::Result<u16>, String) {
        let mut reader = Cursor::new(raw.to_vec());
        let mut out = Vec::new();
        let result = serve_connection(&mut reader, &mut out, peer(), &state());
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_serves_root() {
        let (result, out) = serve(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(result.unwrap(), 200);
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\n\
             Date: Tue, 02 Jan 2024 03:04:05 GMT\r\n\
             Server: mini-http/0.1\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Length: 4\r\n\
             \r\n\
             ok\r\n"
        );
    }

    #[test]
    fn test_echo_body() {
        let (result, out) =
            serve(b"POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello");
        assert_eq!(result.unwrap(), 200);
        assert!(out.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_protocol_errors_get_bad_request() {
        let cases: [&[u8]; 5] = [
            b"GARBAGE\r\n\r\n",
            b"GET / HTTP/1.1\r\nnocolon\r\n\r\n",
            b"GET / HTTP/1.1\r\n\r\n",
            b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: abc\r\n\r\n",
            b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\nshort",
        ];
        for raw in cases {
            let (result, out) = serve(raw);
            assert_eq!(result.unwrap(), 400);
            assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
            assert!(out.ends_with("bad request\r\n"));
        }
    }

    #[test]
    fn test_body_too_large_gets_413() {
        let (result, out) =
            serve(b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 2000000\r\n\r\n");
        assert_eq!(result.unwrap(), 413);
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[test]
    fn test_chunked_gets_501() {
        let (result, _) =
            serve(b"POST / HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert_eq!(result.unwrap(), 501);
    }

    #[test]
    fn test_empty_connection_writes_nothing() {
        let (result, out) = serve(b"");
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unknown_route_gets_404() {
        let (result, _) = serve(b"GET /nowhere HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(result.unwrap(), 404);
    }

    #[test]
    fn test_deadline_already_passed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let mut stream = DeadlineStream {
            stream: &client,
            expires: Some(Instant::now()),
        };
        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_deadline_hit_while_waiting() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let _server_side = listener.accept().unwrap();
        let mut stream = DeadlineStream {
            stream: &client,
            expires: Some(Instant::now() + Duration::from_millis(50)),
        };
        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
