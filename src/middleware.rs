// src/middleware.rs

use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Wrap `router` with the api middleware stack:
/// 1. tracing
/// 2. request timeout (408 once `timeout` elapses)
pub fn with_api_middleware(router: Router, timeout: Duration) -> Router {
    // 1) HTTP request tracing
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().include_headers(true))
        .on_response(DefaultOnResponse::new());

    // 2) Bound handler time
    let timeout = TimeoutLayer::new(timeout);

    router.layer(ServiceBuilder::new().layer(trace).layer(timeout))
}
