//! Day-aligned query splitting.

use crate::types::QueryRangeRequest;

/// Milliseconds per day boundary.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1_000;

/// Splits a range query into per-day, step-aligned sub-queries.
///
/// Each sub-query ends at the last step-aligned point before the next day
/// boundary, except the final one, which ends at the original `end`. The
/// union of the sub-queries' step-sample sets equals the original query's
/// exactly: no duplicates, no gaps, and never an empty sub-query.
#[must_use]
pub fn split_query(request: &QueryRangeRequest) -> Vec<QueryRangeRequest> {
    let mut requests = Vec::new();
    let mut start = request.start;
    while start < request.end {
        let boundary = next_day_boundary(start, request.step);
        let end = if boundary + request.step >= request.end {
            request.end
        } else {
            boundary
        };

        requests.push(QueryRangeRequest {
            path: request.path.clone(),
            start,
            end,
            step: request.step,
            query: request.query.clone(),
        });
        start = boundary + request.step;
    }
    requests
}

/// Rounds up to the last step-aligned point strictly before the next day
/// boundary: the largest time less than the boundary that is congruent to
/// `t` modulo `step`.
#[must_use]
pub fn next_day_boundary(t: i64, step: i64) -> i64 {
    let offset_to_boundary = step - (t % MILLIS_PER_DAY % step);
    ((t / MILLIS_PER_DAY) + 1) * MILLIS_PER_DAY - offset_to_boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn request(start: i64, end: i64, step: i64) -> QueryRangeRequest {
        QueryRangeRequest {
            path: "/api/v1/query_range".to_string(),
            start,
            end,
            step,
            query: "up".to_string(),
        }
    }

    /// The step-sample set of a query: start, start+step, ... up to end.
    fn step_points(request: &QueryRangeRequest) -> BTreeSet<i64> {
        (request.start..=request.end)
            .step_by(usize::try_from(request.step).unwrap())
            .collect()
    }

    #[test]
    fn test_one_day_query_is_not_split() {
        let split = split_query(&request(0, 3_600_000, 60_000));
        assert_eq!(split.len(), 1);
        assert_eq!((split[0].start, split[0].end), (0, 3_600_000));
    }

    #[test]
    fn test_two_day_query_splits_at_boundary() {
        let split = split_query(&request(0, 2 * MILLIS_PER_DAY, 120_000));
        assert_eq!(split.len(), 2);

        // First sub-query ends at the last step-aligned point before the
        // day boundary, not at the boundary itself.
        assert_eq!(split[0].start, 0);
        assert_eq!(split[0].end, MILLIS_PER_DAY - 120_000);
        assert_eq!(split[0].end, 86_280_000);

        assert_eq!(split[1].start, MILLIS_PER_DAY);
        assert_eq!(split[1].end, 2 * MILLIS_PER_DAY);
    }

    #[test]
    fn test_unaligned_start() {
        // A start that is not aligned to the day or the step; sub-queries
        // stay congruent to it modulo the step.
        let split = split_query(&request(11_113_000, 3 * MILLIS_PER_DAY, 60_000));
        assert!(split.len() >= 2);
        for pair in split.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 60_000);
            assert_eq!(pair[0].end % 60_000, pair[0].start % 60_000);
        }
    }

    #[test]
    fn test_split_coverage_exact() {
        let cases = [
            request(0, 3_600_000, 60_000),
            request(0, 2 * MILLIS_PER_DAY, 120_000),
            request(11_113_000, 3 * MILLIS_PER_DAY, 60_000),
            request(MILLIS_PER_DAY - 60_000, MILLIS_PER_DAY + 60_000, 30_000),
            request(1_536_673_680_000, 1_536_716_898_000, 120_000),
        ];

        for original in cases {
            let split = split_query(&original);
            assert!(!split.is_empty());
            assert!(split.iter().all(|r| r.start <= r.end), "empty sub-query");

            let mut union = BTreeSet::new();
            let mut total = 0usize;
            for sub in &split {
                let points = step_points(sub);
                total += points.len();
                union.extend(points);
            }
            // No overlap between sub-query step sets, and exact coverage.
            assert_eq!(total, union.len(), "duplicate step points");
            assert_eq!(
                union,
                step_points(&original),
                "coverage mismatch for {original:?}"
            );
        }
    }

    #[test]
    fn test_next_day_boundary() {
        // Aligned start, step dividing the day evenly.
        assert_eq!(next_day_boundary(0, 120_000), MILLIS_PER_DAY - 120_000);
        // The boundary stays congruent to t modulo step.
        let t = 5 * 3_600_000 + 13_000;
        let step = 30_000;
        let boundary = next_day_boundary(t, step);
        assert!(boundary < MILLIS_PER_DAY);
        assert!(boundary + step >= MILLIS_PER_DAY);
        assert_eq!(boundary % step, t % step);
    }
}
