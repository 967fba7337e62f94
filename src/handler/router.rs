//! Request routing dispatch module
//!
//! Maps a method and path to a handler. The target's query string is not
//! part of the match.

use std::collections::HashMap;
use std::sync::Arc;

use crate::http::{Request, Response};

/// A request handler
pub type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// Outcome of looking up a method and path
pub enum RouteMatch<'a> {
    Found(&'a Handler),
    /// The path exists but not for this method
    MethodNotAllowed,
    NotFound,
}

/// Method + path dispatch table
#[derive(Default, Clone)]
pub struct Router {
    // path -> [(method, handler)]
    routes: HashMap<String, Vec<(String, Handler)>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path`, replacing any previous one
    #[must_use]
    pub fn route<F>(mut self, method: &str, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.add(method, path, handler);
        self
    }

    pub fn add<F>(&mut self, method: &str, path: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let methods = self.routes.entry(path.to_string()).or_default();
        let handler: Handler = Arc::new(handler);
        match methods.iter_mut().find(|(m, _)| m == method) {
            Some((_, existing)) => *existing = handler,
            None => methods.push((method.to_string(), handler)),
        }
    }

    /// Look up the handler for a method and path
    pub fn resolve(&self, method: &str, path: &str) -> RouteMatch<'_> {
        let Some(methods) = self.routes.get(path) else {
            return RouteMatch::NotFound;
        };
        methods
            .iter()
            .find(|(m, _)| m == method)
            .map_or(RouteMatch::MethodNotAllowed, |(_, handler)| {
                RouteMatch::Found(handler)
            })
    }

    /// Run the matching handler, or answer 404/405
    pub fn dispatch(&self, req: &Request) -> Response {
        match self.resolve(&req.method, req.path()) {
            RouteMatch::Found(handler) => handler(req),
            RouteMatch::MethodNotAllowed => Response::method_not_allowed(),
            RouteMatch::NotFound => Response::not_found(),
        }
    }

    /// Number of registered (method, path) pairs
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routes: Vec<String> = self
            .routes
            .iter()
            .flat_map(|(path, methods)| methods.iter().map(move |(m, _)| format!("{m} {path}")))
            .collect();
        routes.sort();
        f.debug_struct("Router").field("routes", &routes).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;

    fn request(method: &str, target: &str) -> Request {
        let mut headers = Headers::new();
        headers.append("host", "test");
        Request {
            method: method.to_string(),
            target: target.to_string(),
            protocol_version: "HTTP/1.1".to_string(),
            headers,
            body: Vec::new(),
        }
    }

    fn router() -> Router {
        Router::new()
            .route("GET", "/", |_| Response::text("root"))
            .route("POST", "/items", |req| Response::text(req.body.clone()))
            .route("GET", "/items", |_| Response::text("list"))
    }

    #[test]
    fn test_dispatch_by_method_and_path() {
        let router = router();
        assert_eq!(router.dispatch(&request("GET", "/")).body, b"root");
        assert_eq!(router.dispatch(&request("GET", "/items")).body, b"list");

        let mut post = request("POST", "/items");
        post.body = b"new".to_vec();
        assert_eq!(router.dispatch(&post).body, b"new");
    }

    #[test]
    fn test_query_ignored() {
        let response = router().dispatch(&request("GET", "/items?page=2"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"list");
    }

    #[test]
    fn test_not_found_and_method_not_allowed() {
        let router = router();
        assert_eq!(router.dispatch(&request("GET", "/missing")).status, 404);
        assert_eq!(router.dispatch(&request("DELETE", "/items")).status, 405);
        // Methods are case-sensitive
        assert_eq!(router.dispatch(&request("get", "/")).status, 405);
    }

    #[test]
    fn test_route_replaces_existing() {
        let router = router().route("GET", "/", |_| Response::text("replaced"));
        assert_eq!(router.len(), 3);
        assert_eq!(router.dispatch(&request("GET", "/")).body, b"replaced");
    }

    #[test]
    fn test_debug_lists_routes() {
        let debug = format!("{:?}", router());
        assert!(debug.contains("GET /items"));
        assert!(debug.contains("POST /items"));
    }
}
