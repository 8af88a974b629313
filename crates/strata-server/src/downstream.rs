//! HTTP downstream query executor.

use async_trait::async_trait;
use strata_frontend::{ApiResponse, FrontendError, QueryRangeHandler, QueryRangeRequest};
use tokio_util::sync::CancellationToken;

/// Executes sub-queries against a downstream query engine over HTTP.
pub struct HttpQueryExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQueryExecutor {
    /// Creates an executor targeting `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl QueryRangeHandler for HttpQueryExecutor {
    async fn query_range(
        &self,
        _cancel: &CancellationToken,
        request: QueryRangeRequest,
    ) -> Result<ApiResponse, FrontendError> {
        // Cancellation is handled by the fan-out scope; dropping this
        // future aborts the in-flight HTTP request.
        let url = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            request.to_uri()
        );
        tracing::debug!(%url, "dispatching sub-query downstream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FrontendError::Downstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FrontendError::Downstream(format!(
                "downstream returned {status}: {body}"
            )));
        }

        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| FrontendError::Downstream(format!("invalid downstream body: {e}")))
    }
}
