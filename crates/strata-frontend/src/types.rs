//! Request and response types for range queries.
//!
//! The JSON envelope follows the conventional time-series HTTP API shape:
//!
//! ```json
//! {"status":"success","data":{"resultType":"matrix","result":[
//!   {"metric":{},"values":[[1536673680,"137"],[1536673780,"137"]]}
//! ]}}
//! ```
//!
//! Sample points carry millisecond timestamps internally and serialize as
//! `[unix_seconds, "value"]` pairs.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Envelope status for successful responses.
pub const STATUS_SUCCESS: &str = "success";

/// Envelope status for failed responses.
pub const STATUS_ERROR: &str = "error";

/// One range query. `start` is inclusive, `end` exclusive, all in unix
/// milliseconds; `step` is the sampling interval in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRangeRequest {
    /// Request path, carried through to sub-queries.
    pub path: String,
    /// Inclusive range start, unix ms.
    pub start: i64,
    /// Exclusive range end, unix ms.
    pub end: i64,
    /// Step width, ms.
    pub step: i64,
    /// The opaque query expression.
    pub query: String,
}

/// The JSON envelope returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// `"success"` or `"error"`.
    pub status: String,
    /// Typed payload, absent for empty or failed responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryRangeData>,
    /// Machine-readable error kind.
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Human-readable error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    /// A successful response with a payload.
    #[must_use]
    pub fn success(data: QueryRangeData) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            data: Some(data),
            error_type: None,
            error: None,
        }
    }

    /// An empty successful response.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            data: None,
            error_type: None,
            error: None,
        }
    }
}

/// Typed query payload, dispatched on the `resultType` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryRangeData {
    /// Instant-vector result: one sample per series.
    Vector(Vec<VectorSample>),
    /// Range result: one stream of samples per series.
    Matrix(Vec<SampleStream>),
}

/// One series in a matrix result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    /// The series' labels.
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    /// Samples in time order.
    #[serde(default)]
    pub values: Vec<SamplePoint>,
}

/// One series in a vector result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSample {
    /// The series' labels.
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    /// The single sample.
    pub value: SamplePoint,
}

/// A timestamped value, serialized as `[unix_seconds, "value"]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Timestamp in unix milliseconds.
    pub timestamp_ms: i64,
    /// Sample value.
    pub value: f64,
}

impl Serialize for SamplePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        if self.timestamp_ms % 1_000 == 0 {
            seq.serialize_element(&(self.timestamp_ms / 1_000))?;
        } else {
            #[allow(clippy::cast_precision_loss)]
            seq.serialize_element(&(self.timestamp_ms as f64 / 1_000.0))?;
        }
        seq.serialize_element(&self.value.to_string())?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SamplePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PointVisitor;

        impl<'de> Visitor<'de> for PointVisitor {
            type Value = SamplePoint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [timestamp, value] pair")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let seconds: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let value: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let value: f64 = value
                    .parse()
                    .map_err(|_| de::Error::custom(format!("invalid sample value {value:?}")))?;

                #[allow(clippy::cast_possible_truncation)]
                let timestamp_ms = (seconds * 1_000.0).round() as i64;
                Ok(SamplePoint {
                    timestamp_ms,
                    value,
                })
            }
        }

        deserializer.deserialize_seq(PointVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE_BODY: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{},"values":[[1536673680,"137"],[1536673780,"137"]]}]}}"#;

    fn parsed_response() -> ApiResponse {
        ApiResponse::success(QueryRangeData::Matrix(vec![SampleStream {
            metric: BTreeMap::new(),
            values: vec![
                SamplePoint {
                    timestamp_ms: 1_536_673_680_000,
                    value: 137.0,
                },
                SamplePoint {
                    timestamp_ms: 1_536_673_780_000,
                    value: 137.0,
                },
            ],
        }]))
    }

    #[test]
    fn test_response_parse() {
        let response: ApiResponse = serde_json::from_str(RESPONSE_BODY).unwrap();
        assert_eq!(response, parsed_response());
    }

    #[test]
    fn test_response_round_trip() {
        let encoded = serde_json::to_string(&parsed_response()).unwrap();
        assert_eq!(encoded, RESPONSE_BODY);
    }

    #[test]
    fn test_vector_envelope_round_trip() {
        let response = ApiResponse::success(QueryRangeData::Vector(vec![VectorSample {
            metric: BTreeMap::from([("job".to_string(), "api".to_string())]),
            value: SamplePoint {
                timestamp_ms: 1_500,
                value: 0.5,
            },
        }]));
        let encoded = serde_json::to_string(&response).unwrap();
        assert!(encoded.contains(r#""resultType":"vector""#));
        assert!(encoded.contains(r#"[1.5,"0.5"]"#));

        let decoded: ApiResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_empty_response_has_no_data_key() {
        let encoded = serde_json::to_string(&ApiResponse::empty()).unwrap();
        assert_eq!(encoded, r#"{"status":"success"}"#);
    }
}
