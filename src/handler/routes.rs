//! Built-in routes
//!
//! Root, health probes, body echo and a JSON view of the parsed request.

use serde_json::{json, Map, Value};

use super::router::Router;
use crate::config::RoutesConfig;
use crate::http::{Request, Response};
use crate::logger;

/// Build the router with every built-in route enabled by `config`
pub fn build_router(config: &RoutesConfig) -> Router {
    let mut router = Router::new()
        .route("GET", "/", |_| Response::text("ok\r\n"))
        .route("POST", &config.echo_path, echo)
        .route("GET", &config.inspect_path, inspect);

    if config.health.enabled {
        router.add("GET", &config.health.liveness_path, |_| Response::text("ok"));
        // Readiness can include additional checks in the future
        router.add("GET", &config.health.readiness_path, |_| Response::text("ok"));
    }

    router
}

/// Send the request body back with the request's content type
fn echo(req: &Request) -> Response {
    let content_type = req
        .header("content-type")
        .unwrap_or("application/octet-stream");
    Response::new(200, content_type, req.body.clone())
}

/// Describe the parsed request as JSON
fn inspect(req: &Request) -> Response {
    let headers: Map<String, Value> = req
        .headers
        .iter()
        .map(|(name, values)| (name.to_string(), json!(values)))
        .collect();

    let body = json!({
        "method": req.method,
        "target": req.target,
        "path": req.path(),
        "query": req.query(),
        "protocol_version": req.protocol_version,
        "headers": headers,
        "body_bytes": req.body.len(),
    });

    match serde_json::to_string_pretty(&body) {
        Ok(json) => Response::json(json),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            Response::error(500)
        }
    }
}
