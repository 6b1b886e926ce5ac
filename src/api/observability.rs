use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::api::AppState;

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

/// Per-request span plus RED metrics. The span carries a request id and an
/// empty `user_id` slot that the bearer middleware fills in once the token
/// resolves.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        path = %path,
        route = route.as_deref(),
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;
        let status = response.status().as_u16();
        let elapsed = started.elapsed();

        // Label on the matched route rather than the raw path; mural and
        // post ids in the path would explode metric cardinality.
        let labels = [
            ("method", method.to_string()),
            ("route", route.unwrap_or(path)),
            ("status", status.to_string()),
        ];
        metrics::counter!("muralboard_http_requests_total", &labels).increment(1);
        metrics::histogram!("muralboard_http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        info!(
            status,
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Request finished"
        );

        response
    }
    .instrument(span)
    .await
}
