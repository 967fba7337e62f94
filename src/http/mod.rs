//! HTTP protocol layer module
//!
//! Request ingestion (line framing, request parsing) and response
//! serialization, independent of sockets and routing.

pub mod error;
pub mod line;
pub mod parser;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use error::ParseError;
pub use line::{read_line, TrailingLine};
pub use parser::{parse_request, ParserOptions, RequestParser, DEFAULT_MAX_BODY_SIZE};
pub use request::{Headers, Request};
pub use response::{Clock, FixedClock, Response, ResponseWriter, SystemClock};
