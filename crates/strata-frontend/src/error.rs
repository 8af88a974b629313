//! Error taxonomy for the query-range frontend.

use http::StatusCode;

/// Errors surfaced by range-request parsing, fan-out, and merging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontendError {
    /// A request parameter could not be parsed; the message is returned
    /// verbatim in the 400 response body.
    #[error("{0}")]
    BadRequest(String),

    /// `end` precedes `start`.
    #[error("end timestamp must not be before start time")]
    EndBeforeStart,

    /// `step` is zero or negative.
    #[error("zero or negative query resolution step widths are not accepted. Try a positive integer")]
    NegativeStep,

    /// The query would produce more than the maximum number of steps.
    #[error("exceeded maximum resolution of 11,000 points per timeseries. Try decreasing the query resolution (?step=XX)")]
    StepTooSmall,

    /// A sub-query was cancelled after a sibling failed.
    #[error("query was cancelled")]
    Cancelled,

    /// The downstream executor failed.
    #[error("downstream query failed: {0}")]
    Downstream(String),

    /// The merger met a response variant it cannot combine.
    #[error("unexpected response type")]
    UnexpectedResultType,
}

impl FrontendError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::EndBeforeStart
            | Self::NegativeStep
            | Self::StepTooSmall => StatusCode::BAD_REQUEST,
            Self::Cancelled | Self::Downstream(_) | Self::UnexpectedResultType => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error kind for the JSON envelope.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_)
            | Self::EndBeforeStart
            | Self::NegativeStep
            | Self::StepTooSmall => "bad_data",
            Self::Cancelled => "canceled",
            Self::Downstream(_) => "execution",
            Self::UnexpectedResultType => "internal",
        }
    }
}
