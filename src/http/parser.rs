//! HTTP/1.1 request parser
//!
//! Consumes exactly one request from a buffered stream in three phases:
//! request line, header block, then a Content-Length delimited body.
//! Chunked transfer coding is rejected.

use std::io::{self, BufRead, Read};

use super::error::ParseError;
use super::line::{read_line, TrailingLine};
use super::request::{Headers, Request};

/// Default body ceiling (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1 << 20;

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Largest accepted Content-Length; 0 disables the check
    pub max_body_size: u64,
    /// Treatment of a final line that has no terminator
    pub trailing_line: TrailingLine,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            trailing_line: TrailingLine::Accept,
        }
    }
}

/// Stateless request parser; one instance can serve any number of streams
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParser {
    options: ParserOptions,
}

impl RequestParser {
    pub const fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse one request from `reader`
    ///
    /// The stream is left positioned right after the body (or after the
    /// blank line when there is no body).
    pub fn parse<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<Request, ParseError> {
        let (method, target, protocol_version) = self.parse_request_line(reader)?;
        let headers = self.parse_headers(reader)?;
        reject_chunked(&headers)?;
        let body = self.parse_body(reader, &headers)?;

        Ok(Request {
            method,
            target,
            protocol_version,
            headers,
            body,
        })
    }

    fn parse_request_line<R: BufRead + ?Sized>(
        &self,
        reader: &mut R,
    ) -> Result<(String, String, String), ParseError> {
        let Some(line) = read_line(reader, self.options.trailing_line)? else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before request line",
            )
            .into());
        };

        let fields = match line.splitn(3, ' ').collect::<Vec<_>>()[..] {
            [method, target, version] => Some((
                method.to_string(),
                target.to_string(),
                version.to_string(),
            )),
            _ => None,
        };
        fields.ok_or(ParseError::MalformedRequestLine { line })
    }

    fn parse_headers<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<Headers, ParseError> {
        let mut headers = Headers::new();

        while let Some(line) = read_line(reader, self.options.trailing_line)? {
            if line.is_empty() {
                break;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(ParseError::MalformedHeader { line });
            };
            headers.append(name.trim(), value.trim());
        }

        if !headers.contains("host") {
            return Err(ParseError::MissingHostHeader);
        }

        Ok(headers)
    }

    fn parse_body<R: BufRead + ?Sized>(
        &self,
        reader: &mut R,
        headers: &Headers,
    ) -> Result<Vec<u8>, ParseError> {
        // Only the first Content-Length counts; duplicates are not compared.
        let Some(raw) = headers.first("content-length") else {
            return Ok(Vec::new());
        };

        let length = parse_content_length(raw)?;
        let limit = self.options.max_body_size;
        if limit > 0 && length > limit {
            return Err(ParseError::BodyTooLarge { length, limit });
        }

        read_body(reader, length)
    }
}

/// Parse a request with default options
///
/// # Examples
/// ```
/// use mini_http::http::parse_request;
/// use std::io::Cursor;
///
/// let req = parse_request(&mut Cursor::new("GET / HTTP/1.1\r\nHost: x\r\n\r\n")).unwrap();
/// assert_eq!(req.method, "GET");
/// assert_eq!(req.headers.get_all("host"), ["x"]);
/// assert!(req.body.is_empty());
/// ```
pub fn parse_request<R: BufRead + ?Sized>(reader: &mut R) -> Result<Request, ParseError> {
    RequestParser::default().parse(reader)
}

fn reject_chunked(headers: &Headers) -> Result<(), ParseError> {
    match headers
        .get_all("transfer-encoding")
        .iter()
        .find(|value| value.trim().to_ascii_lowercase().contains("chunked"))
    {
        Some(value) => Err(ParseError::UnsupportedTransferEncoding {
            value: value.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_content_length(raw: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidContentLength {
        value: raw.to_string(),
    };
    let length: i64 = raw.trim().parse().map_err(|_| invalid())?;
    u64::try_from(length).map_err(|_| invalid())
}

fn read_body<R: BufRead + ?Sized>(reader: &mut R, length: u64) -> Result<Vec<u8>, ParseError> {
    let mut body = Vec::with_capacity(usize::try_from(length).unwrap_or(0).min(64 * 1024));
    (&mut *reader)
        .take(length)
        .read_to_end(&mut body)
        .map_err(ParseError::IncompleteBody)?;

    if (body.len() as u64) < length {
        return Err(ParseError::IncompleteBody(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {length} body bytes, got {}", body.len()),
        )));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Result<Request, ParseError> {
        parse_request(&mut Cursor::new(input.as_bytes().to_vec()))
    }

    fn parse_strict(input: &str) -> Result<Request, ParseError> {
        let parser = RequestParser::new(ParserOptions {
            trailing_line: TrailingLine::Reject,
            ..ParserOptions::default()
        });
        parser.parse(&mut Cursor::new(input.as_bytes().to_vec()))
    }

    #[test]
    fn test_minimal_request() {
        let req = parse("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        let mut headers = Headers::new();
        headers.append("host", "x");
        assert_eq!(
            req,
            Request {
                method: "GET".to_string(),
                target: "/".to_string(),
                protocol_version: "HTTP/1.1".to_string(),
                headers,
                body: Vec::new(),
            }
        );
    }

    #[test]
    fn test_request_line_fields_verbatim() {
        let req = parse("DELETE /items/7?force=1 HTTP/1.0\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.method, "DELETE");
        assert_eq!(req.target, "/items/7?force=1");
        assert_eq!(req.protocol_version, "HTTP/1.0");
    }

    #[test]
    fn test_request_line_third_field_keeps_spaces() {
        let req = parse("GET / HTTP/1.1 extra\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.protocol_version, "HTTP/1.1 extra");
    }

    #[test]
    fn test_malformed_request_line() {
        for input in ["GET /\r\nHost: x\r\n\r\n", "GET\r\n\r\n", "\r\n"] {
            assert!(
                matches!(parse(input), Err(ParseError::MalformedRequestLine { .. })),
                "input: {input:?}"
            );
        }
    }

    #[test]
    fn test_empty_stream_is_io_error() {
        let err = parse("").unwrap_err();
        assert!(err.is_connection_error());
        match err {
            ParseError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_header_multiplicity_and_order() {
        let req = parse("GET / HTTP/1.1\r\nHost: h\r\nX: 1\r\nX: 2\r\n\r\n").unwrap();
        assert_eq!(req.headers.get_all("x"), ["1", "2"]);
    }

    #[test]
    fn test_header_names_unified() {
        let req = parse("GET / HTTP/1.1\r\nHost: a\r\nHOST: a\r\n\r\n").unwrap();
        assert_eq!(req.headers.get_all("host"), ["a", "a"]);
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_header_name_and_value_trimmed() {
        let req = parse("GET / HTTP/1.1\r\n  Host :   example.com  \r\n\r\n").unwrap();
        assert_eq!(req.headers.first("host"), Some("example.com"));
    }

    #[test]
    fn test_header_value_splits_on_first_colon() {
        let req = parse("GET / HTTP/1.1\r\nHost: localhost:8080\r\n\r\n").unwrap();
        assert_eq!(req.headers.first("host"), Some("localhost:8080"));
    }

    #[test]
    fn test_malformed_header() {
        let err = parse("GET / HTTP/1.1\r\nHost: x\r\nno colon here\r\n\r\n").unwrap_err();
        match err {
            ParseError::MalformedHeader { line } => assert_eq!(line, "no colon here"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_host() {
        assert!(matches!(
            parse("GET / HTTP/1.1\r\nAccept: */*\r\n\r\n"),
            Err(ParseError::MissingHostHeader)
        ));
        // Protocol version does not matter
        assert!(matches!(
            parse("GET / HTTP/1.0\r\n\r\n"),
            Err(ParseError::MissingHostHeader)
        ));
    }

    #[test]
    fn test_headers_end_at_end_of_stream() {
        let req = parse("GET / HTTP/1.1\r\nHost: x\r\n").unwrap();
        assert_eq!(req.headers.first("host"), Some("x"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_bare_lf_framing() {
        let req = parse("POST /p HTTP/1.1\nHost: x\nContent-Length: 3\n\nabc").unwrap();
        assert_eq!(req.body, b"abc");
    }

    #[test]
    fn test_chunked_rejected_even_with_content_length() {
        let input = "POST / HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: gzip, Chunked\r\nContent-Length: 5\r\n\r\nhello";
        match parse(input).unwrap_err() {
            ParseError::UnsupportedTransferEncoding { value } => {
                assert_eq!(value, "gzip, Chunked");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_transfer_encoding_passes() {
        let req =
            parse("GET / HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: identity\r\n\r\n").unwrap();
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_body_exact_length() {
        let req = parse("POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn test_body_reads_no_further_than_declared() {
        let mut cursor = Cursor::new(
            b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhelloNEXT".to_vec(),
        );
        let req = parse_request(&mut cursor).unwrap();
        assert_eq!(req.body, b"hello");
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"NEXT");
    }

    #[test]
    fn test_short_body_is_incomplete() {
        let err = parse("POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhel").unwrap_err();
        match err {
            ParseError::IncompleteBody(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_content_length() {
        for value in ["-1", "abc", "", "1.5", "99999999999999999999"] {
            let input = format!("POST / HTTP/1.1\r\nHost: x\r\nContent-Length: {value}\r\n\r\n");
            assert!(
                matches!(parse(&input), Err(ParseError::InvalidContentLength { .. })),
                "value: {value:?}"
            );
        }
    }

    #[test]
    fn test_body_too_large_consumes_nothing() {
        let mut cursor = Cursor::new(
            b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 2000000\r\n\r\nabc".to_vec(),
        );
        let err = parse_request(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            ParseError::BodyTooLarge {
                length: 2_000_000,
                limit: DEFAULT_MAX_BODY_SIZE
            }
        ));
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"abc");
    }

    #[test]
    fn test_body_at_ceiling_accepted() {
        let parser = RequestParser::new(ParserOptions {
            max_body_size: 4,
            ..ParserOptions::default()
        });
        let mut ok =
            Cursor::new(b"PUT / HTTP/1.1\r\nHost: x\r\nContent-Length: 4\r\n\r\nabcd".to_vec());
        assert_eq!(parser.parse(&mut ok).unwrap().body, b"abcd");

        let mut over =
            Cursor::new(b"PUT / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nabcde".to_vec());
        assert!(matches!(
            parser.parse(&mut over),
            Err(ParseError::BodyTooLarge { length: 5, limit: 4 })
        ));
    }

    #[test]
    fn test_zero_ceiling_disables_limit() {
        let parser = RequestParser::new(ParserOptions {
            max_body_size: 0,
            ..ParserOptions::default()
        });
        let body = "a".repeat(2_000_000);
        let input = format!(
            "POST / HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let req = parser.parse(&mut Cursor::new(input.into_bytes())).unwrap();
        assert_eq!(req.body.len(), 2_000_000);
    }

    #[test]
    fn test_first_content_length_wins() {
        let req = parse(
            "POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\nContent-Length: 9\r\n\r\nhi",
        )
        .unwrap();
        assert_eq!(req.body, b"hi");
    }

    #[test]
    fn test_no_content_length_means_empty_body() {
        let mut cursor = Cursor::new(b"POST / HTTP/1.1\r\nHost: x\r\n\r\nleftover".to_vec());
        let req = parse_request(&mut cursor).unwrap();
        assert!(req.body.is_empty());
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"leftover");
    }

    #[test]
    fn test_unterminated_header_accepted_by_default() {
        let req = parse("GET / HTTP/1.1\r\nHost: x").unwrap();
        assert_eq!(req.headers.first("host"), Some("x"));
    }

    #[test]
    fn test_unterminated_header_rejected_when_strict() {
        let err = parse_strict("GET / HTTP/1.1\r\nHost: x").unwrap_err();
        match err {
            ParseError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_request_line() {
        // Accepted as data, then fails for lack of a Host header
        assert!(matches!(
            parse("GET / HTTP/1.1"),
            Err(ParseError::MissingHostHeader)
        ));
        assert!(parse_strict("GET / HTTP/1.1").unwrap_err().is_connection_error());
    }

    #[test]
    fn test_strict_mode_accepts_terminated_request() {
        let req =
            parse_strict("POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\n\r\nok").unwrap();
        assert_eq!(req.body, b"ok");
    }
}
