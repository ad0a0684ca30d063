//! Reporting step — what happens to an answer once it arrives.
//!
//! The status payload has no consumer beyond the diagnostic log, so the
//! production reporter just writes it out. Failures go to `debug`, which
//! keeps them out of the default `info` output.

use serde_json::Value;
use tracing::{debug, info};

use crate::error::PollError;

pub trait Reporter: Send + Sync {
    /// Called once per successful cycle with the decoded body.
    fn report(&self, payload: &Value);

    /// Called once per failed cycle. Must not panic or block.
    fn absorb(&self, error: &PollError);
}

/// Writes payloads to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

/// Compact single-line rendering used for the log record.
pub fn render_payload(payload: &Value) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| payload.to_string())
}

impl Reporter for LogReporter {
    fn report(&self, payload: &Value) {
        info!(payload = %render_payload(payload), "🚦 Status received");
    }

    fn absorb(&self, error: &PollError) {
        debug!(kind = error.kind(), "Poll cycle produced no answer: {}", error);
    }
}
