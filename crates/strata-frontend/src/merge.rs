//! Merging of partial range-query responses.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::error::FrontendError;
use crate::types::{
    ApiResponse, QueryRangeData, QueryRangeRequest, SampleStream, VectorSample,
};

/// Merges per-sub-query responses into one ordered response.
///
/// Responses are sorted by their sub-query `start` (stable, ascending), so
/// the output order is independent of arrival order. The splitter
/// guarantees disjoint step sets, so concatenation needs no cross-response
/// deduplication.
///
/// # Errors
///
/// Returns [`FrontendError::UnexpectedResultType`] when responses carry no
/// payload or mix result-type variants.
pub fn merge_responses(
    mut responses: Vec<(QueryRangeRequest, ApiResponse)>,
) -> Result<ApiResponse, FrontendError> {
    responses.sort_by_key(|(request, _)| request.start);

    let Some((_, first)) = responses.first() else {
        return Ok(ApiResponse::empty());
    };

    match first.data {
        Some(QueryRangeData::Vector(_)) => vector_merge(responses),
        Some(QueryRangeData::Matrix(_)) => matrix_merge(responses),
        None => Err(FrontendError::UnexpectedResultType),
    }
}

/// Concatenates vectors in sorted order.
fn vector_merge(
    responses: Vec<(QueryRangeRequest, ApiResponse)>,
) -> Result<ApiResponse, FrontendError> {
    let mut output: Vec<VectorSample> = Vec::new();
    for (_, response) in responses {
        match response.data {
            Some(QueryRangeData::Vector(samples)) => output.extend(samples),
            _ => return Err(FrontendError::UnexpectedResultType),
        }
    }
    Ok(ApiResponse::success(QueryRangeData::Vector(output)))
}

/// Groups matrix streams by label set and concatenates their values.
///
/// The first occurrence of a label set keeps its metric; subsequent
/// streams append their values in response order, which post-sort is
/// time-ascending and therefore already chronologically correct.
fn matrix_merge(
    responses: Vec<(QueryRangeRequest, ApiResponse)>,
) -> Result<ApiResponse, FrontendError> {
    let mut output: Vec<SampleStream> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (_, response) in responses {
        let Some(QueryRangeData::Matrix(streams)) = response.data else {
            return Err(FrontendError::UnexpectedResultType);
        };
        for stream in streams {
            let key = canonical_labels(&stream.metric);
            match index.get(&key) {
                Some(&at) => output[at].values.extend(stream.values),
                None => {
                    index.insert(key, output.len());
                    output.push(stream);
                }
            }
        }
    }

    Ok(ApiResponse::success(QueryRangeData::Matrix(output)))
}

/// Canonical grouping key for a label set: pairs in sorted order with
/// unambiguous separators.
fn canonical_labels(metric: &BTreeMap<String, String>) -> String {
    let mut key = String::new();
    for (name, value) in metric {
        key.push_str(name);
        key.push('\u{1}');
        key.push_str(value);
        key.push('\u{2}');
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SamplePoint;

    fn request(start: i64) -> QueryRangeRequest {
        QueryRangeRequest {
            path: "/api/v1/query_range".to_string(),
            start,
            end: start + 1_000,
            step: 1_000,
            query: "up".to_string(),
        }
    }

    fn points(raw: &[(i64, f64)]) -> Vec<SamplePoint> {
        raw.iter()
            .map(|&(ts, value)| SamplePoint {
                timestamp_ms: ts,
                value,
            })
            .collect()
    }

    fn matrix_response(raw: &[(i64, f64)]) -> ApiResponse {
        ApiResponse::success(QueryRangeData::Matrix(vec![SampleStream {
            metric: BTreeMap::new(),
            values: points(raw),
        }]))
    }

    #[test]
    fn test_merge_empty_is_success() {
        let merged = merge_responses(Vec::new()).unwrap();
        assert_eq!(merged, ApiResponse::empty());
    }

    #[test]
    fn test_matrix_concatenation() {
        let merged = merge_responses(vec![
            (request(0), matrix_response(&[(0, 0.0), (1, 1.0)])),
            (request(2), matrix_response(&[(2, 2.0), (3, 3.0)])),
        ])
        .unwrap();

        let expected = matrix_response(&[(0, 0.0), (1, 1.0), (2, 2.0), (3, 3.0)]);
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_merge_order_independent_of_arrival() {
        // Responses arrive out of order; output follows sub-query start.
        let merged = merge_responses(vec![
            (request(2), matrix_response(&[(2, 2.0)])),
            (request(0), matrix_response(&[(0, 0.0)])),
        ])
        .unwrap();
        assert_eq!(merged, matrix_response(&[(0, 0.0), (2, 2.0)]));
    }

    #[test]
    fn test_matrix_groups_by_label_set() {
        let stream = |job: &str, raw: &[(i64, f64)]| SampleStream {
            metric: BTreeMap::from([("job".to_string(), job.to_string())]),
            values: points(raw),
        };
        let response = |streams: Vec<SampleStream>| {
            ApiResponse::success(QueryRangeData::Matrix(streams))
        };

        let merged = merge_responses(vec![
            (
                request(0),
                response(vec![stream("api", &[(0, 1.0)]), stream("web", &[(0, 9.0)])]),
            ),
            (request(2), response(vec![stream("api", &[(2, 2.0)])])),
        ])
        .unwrap();

        let Some(QueryRangeData::Matrix(streams)) = merged.data else {
            panic!("expected matrix");
        };
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0], stream("api", &[(0, 1.0), (2, 2.0)]));
        assert_eq!(streams[1], stream("web", &[(0, 9.0)]));
    }

    #[test]
    fn test_vector_concatenation() {
        let vector = |ts: i64| {
            ApiResponse::success(QueryRangeData::Vector(vec![VectorSample {
                metric: BTreeMap::new(),
                value: SamplePoint {
                    timestamp_ms: ts,
                    value: 1.0,
                },
            }]))
        };

        let merged = merge_responses(vec![(request(5), vector(5)), (request(0), vector(0))]).unwrap();
        let Some(QueryRangeData::Vector(samples)) = merged.data else {
            panic!("expected vector");
        };
        assert_eq!(samples[0].value.timestamp_ms, 0);
        assert_eq!(samples[1].value.timestamp_ms, 5);
    }

    #[test]
    fn test_mixed_variants_are_an_error() {
        let merged = merge_responses(vec![
            (
                request(0),
                ApiResponse::success(QueryRangeData::Vector(Vec::new())),
            ),
            (request(2), matrix_response(&[(2, 2.0)])),
        ]);
        assert_eq!(merged.unwrap_err(), FrontendError::UnexpectedResultType);
    }

    #[test]
    fn test_missing_payload_is_an_error() {
        let merged = merge_responses(vec![(request(0), ApiResponse::empty())]);
        assert_eq!(merged.unwrap_err(), FrontendError::UnexpectedResultType);
    }
}
