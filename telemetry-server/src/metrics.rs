use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUESTS_TOTAL: &str = "telemetry_http_requests_total";
const REQUEST_DURATION: &str = "telemetry_http_request_duration_seconds";

/// Route label for requests no route matched. Raw paths carry entity ids and would give
/// every id its own series.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Install the global prometheus recorder. Only do this once per process.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    // Lookups are served from memory, so the interesting range is well under a second
    const LOOKUP_SECONDS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_owned()), LOOKUP_SECONDS)?
        .install_recorder()?;

    metrics::describe_counter!(REQUESTS_TOTAL, "HTTP requests served, by route and status");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Time spent answering HTTP requests"
    );

    Ok(handle)
}

fn request_labels(
    method: &Method,
    route: Option<&MatchedPath>,
    status: StatusCode,
) -> [(&'static str, String); 3] {
    [
        ("method", method.as_str().to_owned()),
        (
            "route",
            route.map_or(UNMATCHED_ROUTE, MatchedPath::as_str).to_owned(),
        ),
        ("status", status.as_u16().to_string()),
    ]
}

/// Counts and times every request by matched route.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let route = req.extensions().get::<MatchedPath>().cloned();

    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed = started.elapsed().as_secs_f64();

    let labels = request_labels(&method, route.as_ref(), response.status());
    metrics::counter!(REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION, &labels).record(elapsed);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_requests_share_one_route_label() {
        let labels = request_labels(&Method::GET, None, StatusCode::NOT_FOUND);

        assert_eq!(
            labels,
            [
                ("method", "GET".to_owned()),
                ("route", "unmatched".to_owned()),
                ("status", "404".to_owned()),
            ]
        );
    }
}
