// Application state module
// Everything a connection needs, built once at startup and shared read-only

use std::sync::Arc;

use super::types::Config;
use crate::handler::{build_router, Router};
use crate::http::{Clock, RequestParser, ResponseWriter, SystemClock};

/// Application state
pub struct AppState {
    pub config: Config,
    pub parser: RequestParser,
    pub writer: ResponseWriter,
    pub router: Router,
}

impl AppState {
    /// Create `AppState` with the built-in routes and the wall clock
    pub fn new(config: &Config) -> Self {
        Self::with_router(config, build_router(&config.routes), Arc::new(SystemClock))
    }

    /// Create `AppState` with a caller-supplied router and clock
    pub fn with_router(config: &Config, router: Router, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: config.clone(),
            parser: RequestParser::new(config.http.parser_options()),
            writer: ResponseWriter::new(config.http.server_name.clone(), clock),
            router,
        }
    }
}
