//! Axum middleware recording the read-path HTTP metrics `catalog_core::metrics::http`
//! declares, mirroring the teacher's own request-instrumentation middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use catalog_core::metrics::http::{HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use catalog_core::metrics::normalize_path;
use std::time::Instant;

pub async fn metrics_layer(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed().as_secs_f64();
    HTTP_REQUEST_DURATION_SECONDS.with_label_values(&[&method, &path]).observe(elapsed);
    HTTP_REQUESTS_TOTAL.with_label_values(&[&method, &path, response.status().as_str()]).inc();
    HTTP_REQUESTS_IN_FLIGHT.dec();

    response
}
