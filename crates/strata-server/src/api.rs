//! HTTP API handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use strata_frontend::{
    parse_query_range_request, ApiResponse, FrontendError, QueryRangeHandler, SplitByDay,
    STATUS_ERROR,
};
use strata_ingester::{IngestError, Ingester};
use strata_model::{LabelSet, SamplePair};
use tokio_util::sync::CancellationToken;

use crate::downstream::HttpQueryExecutor;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The ingester, including its WAL.
    pub ingester: Arc<Ingester>,
    /// Query-range middleware, present when a downstream URL is configured.
    pub query_frontend: Option<Arc<SplitByDay<HttpQueryExecutor>>>,
}

/// One ingested sample in a push request.
#[derive(Debug, Deserialize)]
pub struct PushSample {
    /// Series labels.
    pub labels: BTreeMap<String, String>,
    /// Timestamp in unix milliseconds.
    pub timestamp_ms: i64,
    /// Sample value.
    pub value: f64,
}

/// Body of `POST /api/v1/push`.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    /// Tenant the batch belongs to.
    pub tenant: String,
    /// Samples to ingest.
    pub samples: Vec<PushSample>,
}

/// `POST /api/v1/push`: logs the batch, then applies it to memory.
pub async fn push(
    State(state): State<AppState>,
    Json(body): Json<PushRequest>,
) -> Response {
    let batch: Vec<(LabelSet, SamplePair)> = body
        .samples
        .into_iter()
        .map(|s| {
            (
                s.labels.into_iter().collect::<LabelSet>(),
                SamplePair {
                    timestamp_ms: s.timestamp_ms,
                    value: s.value,
                },
            )
        })
        .collect();

    // The ingester is synchronous (WAL appends block on fsync); run it off
    // the async worker threads.
    let ingester = Arc::clone(&state.ingester);
    let result = tokio::task::spawn_blocking(move || ingester.push(&body.tenant, batch)).await;

    match result {
        Ok(Ok(())) => (StatusCode::OK, Json(serde_json::json!({"status": "success"}))).into_response(),
        Ok(Err(e)) => {
            let status = match &e {
                IngestError::Durability(_) => StatusCode::INTERNAL_SERVER_ERROR,
                IngestError::Sample(_) => StatusCode::BAD_REQUEST,
            };
            tracing::warn!(error = %e, "push rejected");
            (status, Json(serde_json::json!({"status": "error", "error": e.to_string()})))
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "push task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /api/v1/query_range`: split, fan out, merge.
pub async fn query_range(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let Some(frontend) = state.query_frontend else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "no downstream query executor configured",
        )
            .into_response();
    };

    let request = match parse_query_range_request(&uri) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let cancel = CancellationToken::new();
    match frontend.query_range(&cancel, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /healthz`.
pub async fn healthz() -> &'static str {
    "ok"
}

fn error_response(error: &FrontendError) -> Response {
    let envelope = ApiResponse {
        status: STATUS_ERROR.to_string(),
        data: None,
        error_type: Some(error.error_type().to_string()),
        error: Some(error.to_string()),
    };
    (error.status(), Json(envelope)).into_response()
}
