//! Metrics middleware for API routes.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::metrics::{normalize_path, HTTP_REQUESTS_TOTAL};

/// Count every request by method, normalized path and status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}
