//! Request parse errors

use std::io;

/// Why a request could not be parsed
///
/// Every variant aborts the parse; no partial request is produced.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Request line does not split into three space-delimited fields
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },

    /// Header line without a `:` separator
    #[error("malformed header line: {line:?}")]
    MalformedHeader { line: String },

    #[error("missing Host header")]
    MissingHostHeader,

    /// Chunked transfer coding was requested
    #[error("unsupported transfer-encoding: {value:?}")]
    UnsupportedTransferEncoding { value: String },

    /// Content-Length is not a non-negative integer
    #[error("invalid Content-Length: {value:?}")]
    InvalidContentLength { value: String },

    #[error("body too large: {length} > {limit}")]
    BodyTooLarge { length: u64, limit: u64 },

    /// Stream ended before the declared body length was read
    #[error("reading body failed: {0}")]
    IncompleteBody(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    /// True when the failure came from the stream itself rather than the request bytes.
    ///
    /// Such failures (peer closed before sending anything, read deadline hit,
    /// connection reset) leave nobody to answer.
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
