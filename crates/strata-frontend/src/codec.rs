//! HTTP boundary codec for range requests.
//!
//! Parses the `start`, `end`, `step`, and `query` parameters of a
//! `query_range` request URI into a [`QueryRangeRequest`] and serializes
//! one back to a URI with the same query-string semantics. Timestamps are
//! accepted as float unix seconds or RFC 3339; steps as float seconds or
//! a duration like `15s`.

use std::collections::HashMap;

use http::Uri;
use url::form_urlencoded;

use crate::error::FrontendError;
use crate::types::QueryRangeRequest;

/// Queries may not span more steps than this.
const MAX_STEPS: i64 = 11_000;

/// Parses a range request from a request URI.
///
/// # Errors
///
/// Returns a 400-class [`FrontendError`] for unparsable or semantically
/// invalid parameters, with the offending value quoted in the message.
pub fn parse_query_range_request(uri: &Uri) -> Result<QueryRangeRequest, FrontendError> {
    let params: HashMap<String, String> =
        form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
            .into_owned()
            .collect();
    let param = |name: &str| params.get(name).map(String::as_str).unwrap_or("");

    let start = parse_time(param("start"))?;
    let end = parse_time(param("end"))?;
    if end < start {
        return Err(FrontendError::EndBeforeStart);
    }

    let step = parse_duration_ms(param("step"))?;
    if step <= 0 {
        return Err(FrontendError::NegativeStep);
    }

    // A sanity limit: refuse queries that would produce so many steps the
    // response would dominate memory downstream.
    if (end - start) / step > MAX_STEPS {
        return Err(FrontendError::StepTooSmall);
    }

    Ok(QueryRangeRequest {
        path: uri.path().to_string(),
        start,
        end,
        step,
        query: param("query").to_string(),
    })
}

impl QueryRangeRequest {
    /// Serializes the request back to a URI string.
    ///
    /// Parameters are emitted in alphabetical order with times formatted
    /// as unix seconds, so a parsed request round-trips to the same
    /// query-string semantics.
    #[must_use]
    pub fn to_uri(&self) -> String {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("end", &format_seconds(self.end))
            .append_pair("query", &self.query)
            .append_pair("start", &format_seconds(self.start))
            .append_pair("step", &format_seconds(self.step))
            .finish();
        format!("{}?{}", self.path, query)
    }
}

/// Parses a timestamp parameter to unix milliseconds.
fn parse_time(value: &str) -> Result<i64, FrontendError> {
    if let Ok(seconds) = value.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        return Ok((seconds * 1_000.0) as i64);
    }
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(t.timestamp_millis());
    }
    Err(FrontendError::BadRequest(format!(
        "cannot parse {value:?} to a valid timestamp"
    )))
}

/// Parses a step parameter to milliseconds.
fn parse_duration_ms(value: &str) -> Result<i64, FrontendError> {
    if let Ok(seconds) = value.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        return Ok((seconds * 1_000.0) as i64);
    }
    if let Some(ms) = parse_duration_literal(value) {
        return Ok(ms);
    }
    Err(FrontendError::BadRequest(format!(
        "cannot parse {value:?} to a valid duration"
    )))
}

/// Parses duration literals of the form `<digits><unit>`, with units
/// `ms`, `s`, `m`, `h`, `d`, `w`, `y`.
fn parse_duration_literal(value: &str) -> Option<i64> {
    let unit_start = value.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = value.split_at(unit_start);
    let count: i64 = digits.parse().ok()?;
    let unit_ms: i64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60 * 1_000,
        "h" => 60 * 60 * 1_000,
        "d" => 24 * 60 * 60 * 1_000,
        "w" => 7 * 24 * 60 * 60 * 1_000,
        "y" => 365 * 24 * 60 * 60 * 1_000,
        _ => return None,
    };
    count.checked_mul(unit_ms)
}

/// Formats milliseconds as unix seconds, shortest representation.
fn format_seconds(ms: i64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let seconds = ms as f64 / 1_000.0;
    seconds.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = "/api/v1/query_range?end=1536716898&query=sum%28container_memory_rss%29+by+%28namespace%29&start=1536673680&step=120";

    fn parsed_request() -> QueryRangeRequest {
        QueryRangeRequest {
            path: "/api/v1/query_range".to_string(),
            start: 1_536_673_680_000,
            end: 1_536_716_898_000,
            step: 120_000,
            query: "sum(container_memory_rss) by (namespace)".to_string(),
        }
    }

    fn parse(uri: &str) -> Result<QueryRangeRequest, FrontendError> {
        parse_query_range_request(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_parse_valid_request() {
        assert_eq!(parse(QUERY).unwrap(), parsed_request());
    }

    #[test]
    fn test_parse_round_trips_to_same_uri() {
        let request = parse(QUERY).unwrap();
        assert_eq!(request.to_uri(), QUERY);
    }

    #[test]
    fn test_parse_errors() {
        let cases: Vec<(&str, FrontendError)> = vec![
            (
                "/api/v1/query_range?start=foo",
                FrontendError::BadRequest(r#"cannot parse "foo" to a valid timestamp"#.into()),
            ),
            (
                "/api/v1/query_range?start=123&end=bar",
                FrontendError::BadRequest(r#"cannot parse "bar" to a valid timestamp"#.into()),
            ),
            (
                "/api/v1/query_range?start=123&end=0",
                FrontendError::EndBeforeStart,
            ),
            (
                "/api/v1/query_range?start=123&end=456&step=baz",
                FrontendError::BadRequest(r#"cannot parse "baz" to a valid duration"#.into()),
            ),
            (
                "/api/v1/query_range?start=123&end=456&step=-1",
                FrontendError::NegativeStep,
            ),
            (
                "/api/v1/query_range?start=0&end=11001&step=1",
                FrontendError::StepTooSmall,
            ),
        ];
        for (uri, expected) in cases {
            assert_eq!(parse(uri).unwrap_err(), expected, "uri: {uri}");
        }
    }

    #[test]
    fn test_parse_rfc3339_timestamps() {
        let request = parse(
            "/api/v1/query_range?start=2018-09-11T12:28:00Z&end=2018-09-11T13:28:00Z&step=15s",
        )
        .unwrap();
        assert_eq!(request.end - request.start, 3_600_000);
        assert_eq!(request.step, 15_000);
    }

    #[test]
    fn test_parse_duration_literals() {
        assert_eq!(parse_duration_ms("250ms").unwrap(), 250);
        assert_eq!(parse_duration_ms("15s").unwrap(), 15_000);
        assert_eq!(parse_duration_ms("2m").unwrap(), 120_000);
        assert_eq!(parse_duration_ms("1h").unwrap(), 3_600_000);
        assert_eq!(parse_duration_ms("1d").unwrap(), 86_400_000);
        assert!(parse_duration_ms("5x").is_err());
        assert!(parse_duration_ms("").is_err());
    }

    #[test]
    fn test_fractional_times() {
        let request = parse("/p?start=1.5&end=3.25&step=0.25").unwrap();
        assert_eq!(request.start, 1_500);
        assert_eq!(request.end, 3_250);
        assert_eq!(request.step, 250);
        assert_eq!(request.to_uri(), "/p?end=3.25&query=&start=1.5&step=0.25");
    }

    #[test]
    fn test_step_limit_boundary() {
        // Exactly 11,000 steps is allowed.
        assert!(parse("/p?start=0&end=11000&step=1").is_ok());
    }
}
