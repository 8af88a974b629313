//! Fan-out execution of sub-queries.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FrontendError;
use crate::merge::merge_responses;
use crate::split::split_query;
use crate::types::{ApiResponse, QueryRangeRequest};

/// Executes one range query, observing the cancellation token.
#[async_trait]
pub trait QueryRangeHandler: Send + Sync + 'static {
    /// Executes `request`, returning its response envelope.
    async fn query_range(
        &self,
        cancel: &CancellationToken,
        request: QueryRangeRequest,
    ) -> Result<ApiResponse, FrontendError>;
}

/// Middleware that splits a query by day, fans the sub-queries out to the
/// downstream handler in parallel, and merges the results.
///
/// On the first sub-query error the shared scope is cancelled, aborting
/// in-flight siblings, but every dispatched sub-query is still drained to
/// completion so no task outlives the call. The first error wins.
pub struct SplitByDay<D> {
    downstream: Arc<D>,
}

impl<D> SplitByDay<D> {
    /// Wraps a downstream handler.
    pub fn new(downstream: Arc<D>) -> Self {
        Self { downstream }
    }
}

#[async_trait]
impl<D: QueryRangeHandler> QueryRangeHandler for SplitByDay<D> {
    async fn query_range(
        &self,
        cancel: &CancellationToken,
        request: QueryRangeRequest,
    ) -> Result<ApiResponse, FrontendError> {
        let requests = split_query(&request);
        tracing::debug!(
            sub_queries = requests.len(),
            start = request.start,
            end = request.end,
            "splitting range query"
        );

        // One scope for the whole fan-out; cancelling it aborts every
        // in-flight sub-query. The channel is sized to the number of
        // sub-queries so completions never block on the drain loop.
        let scope = cancel.child_token();
        let (tx, mut rx) = mpsc::channel(requests.len().max(1));

        for sub_request in requests.iter().cloned() {
            let downstream = Arc::clone(&self.downstream);
            let token = scope.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // Biased: a downstream that reacts to the token gets one
                // final poll to report its own cancellation result before
                // the fallback arm wins.
                let result = tokio::select! {
                    biased;
                    result = downstream.query_range(&token, sub_request.clone()) => result,
                    () = token.cancelled() => Err(FrontendError::Cancelled),
                };
                let _ = tx.send((sub_request, result)).await;
            });
        }
        drop(tx);

        // Drain exactly one completion per dispatched sub-query, even
        // after cancellation, so no task is leaked.
        let mut responses = Vec::with_capacity(requests.len());
        let mut first_error: Option<FrontendError> = None;
        for _ in 0..requests.len() {
            let Some((sub_request, result)) = rx.recv().await else {
                break;
            };
            match result {
                Ok(response) => responses.push((sub_request, response)),
                Err(e) => {
                    tracing::debug!(
                        start = sub_request.start,
                        error = %e,
                        "sub-query failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                        scope.cancel();
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        merge_responses(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::MILLIS_PER_DAY;
    use crate::types::{QueryRangeData, SamplePoint, SampleStream};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn two_day_request() -> QueryRangeRequest {
        QueryRangeRequest {
            path: "/api/v1/query_range".to_string(),
            start: 0,
            end: 2 * MILLIS_PER_DAY,
            step: 120_000,
            query: "up".to_string(),
        }
    }

    fn matrix_response(points: &[(i64, f64)]) -> ApiResponse {
        ApiResponse::success(QueryRangeData::Matrix(vec![SampleStream {
            metric: BTreeMap::new(),
            values: points
                .iter()
                .map(|&(ts, value)| SamplePoint {
                    timestamp_ms: ts,
                    value,
                })
                .collect(),
        }]))
    }

    /// Downstream that returns one sample at each sub-query's start, after
    /// an optional per-call delay, so arrival order can be inverted.
    struct EchoDownstream {
        delay_first: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryRangeHandler for EchoDownstream {
        #[allow(clippy::cast_precision_loss)]
        async fn query_range(
            &self,
            _cancel: &CancellationToken,
            request: QueryRangeRequest,
        ) -> Result<ApiResponse, FrontendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_first && request.start == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(matrix_response(&[(request.start, request.start as f64)]))
        }
    }

    /// Downstream where the first sub-query fails immediately and the
    /// second parks until it observes cancellation.
    struct FailingDownstream {
        second_cancelled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl QueryRangeHandler for FailingDownstream {
        async fn query_range(
            &self,
            cancel: &CancellationToken,
            request: QueryRangeRequest,
        ) -> Result<ApiResponse, FrontendError> {
            if request.start == 0 {
                return Err(FrontendError::Downstream("boom".to_string()));
            }
            cancel.cancelled().await;
            self.second_cancelled.store(true, Ordering::SeqCst);
            Err(FrontendError::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_fanout_merges_in_start_order() {
        let downstream = Arc::new(EchoDownstream {
            delay_first: true,
            calls: AtomicUsize::new(0),
        });
        let middleware = SplitByDay::new(Arc::clone(&downstream));

        let response = middleware
            .query_range(&CancellationToken::new(), two_day_request())
            .await
            .unwrap();

        assert_eq!(downstream.calls.load(Ordering::SeqCst), 2);
        let Some(QueryRangeData::Matrix(streams)) = response.data else {
            panic!("expected matrix");
        };
        // First-day delay inverted arrival order; output is still sorted
        // by sub-query start.
        let timestamps: Vec<i64> = streams[0].values.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, vec![0, MILLIS_PER_DAY]);
    }

    #[tokio::test]
    async fn test_first_error_cancels_siblings() {
        let second_cancelled = Arc::new(AtomicBool::new(false));
        let middleware = SplitByDay::new(Arc::new(FailingDownstream {
            second_cancelled: Arc::clone(&second_cancelled),
        }));

        let err = middleware
            .query_range(&CancellationToken::new(), two_day_request())
            .await
            .unwrap_err();

        assert_eq!(err, FrontendError::Downstream("boom".to_string()));
        assert!(
            second_cancelled.load(Ordering::SeqCst),
            "second sub-query did not observe cancellation"
        );
    }

    #[tokio::test]
    async fn test_caller_cancellation_propagates() {
        struct ParkedDownstream;

        #[async_trait]
        impl QueryRangeHandler for ParkedDownstream {
            async fn query_range(
                &self,
                cancel: &CancellationToken,
                _request: QueryRangeRequest,
            ) -> Result<ApiResponse, FrontendError> {
                cancel.cancelled().await;
                Err(FrontendError::Cancelled)
            }
        }

        let middleware = SplitByDay::new(Arc::new(ParkedDownstream));
        let caller = CancellationToken::new();
        let cancel_after = caller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_after.cancel();
        });

        let err = middleware
            .query_range(&caller, two_day_request())
            .await
            .unwrap_err();
        assert_eq!(err, FrontendError::Cancelled);
    }

    #[tokio::test]
    async fn test_single_day_query_passes_through() {
        let downstream = Arc::new(EchoDownstream {
            delay_first: false,
            calls: AtomicUsize::new(0),
        });
        let middleware = SplitByDay::new(Arc::clone(&downstream));

        let request = QueryRangeRequest {
            path: "/api/v1/query_range".to_string(),
            start: 0,
            end: 3_600_000,
            step: 60_000,
            query: "up".to_string(),
        };
        middleware
            .query_range(&CancellationToken::new(), request)
            .await
            .unwrap();
        assert_eq!(downstream.calls.load(Ordering::SeqCst), 1);
    }
}
