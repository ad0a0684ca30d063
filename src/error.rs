//! Failure kinds for a single poll cycle.
//!
//! None of these ever stop the poller. They are counted, handed to the
//! reporter, and the next tick proceeds as usual.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    /// No answer within the per-request budget.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    /// Body was not valid JSON.
    #[error("response body is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Connection refused, reset, DNS failure, ...
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout(_))
    }

    /// Short stable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Timeout(_) => "timeout",
            PollError::Status(_) => "status",
            PollError::Decode(_) => "decode",
            PollError::Transport(_) => "transport",
        }
    }
}
