//! Request handler module
//!
//! Dispatches parsed requests to handlers and provides the built-in routes.

pub mod router;
pub mod routes;

// Re-export main entry points
pub use router::{Handler, RouteMatch, Router};
pub use routes::build_router;
