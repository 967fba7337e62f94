//! Minimal HTTP/1.1 server
//!
//! Reads one request per connection with a blocking, line-oriented parser,
//! dispatches it by method and path, and writes a fixed-shape response.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
