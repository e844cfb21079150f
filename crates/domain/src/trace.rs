use serde::Serialize;

/// Structured trace events emitted across all httpsession crates.
///
/// Session identifiers are bearer secrets, so events only ever carry the
/// redacted prefix.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionIssued {
        session_id: String,
    },
    SessionResolved {
        session_id: String,
        is_new: bool,
    },
    SessionInvalidated {
        session_id: String,
        listeners: usize,
    },
    SessionsSwept {
        removed: usize,
        remaining: usize,
        duration_ms: u64,
    },
    TransferRejected {
        carrier: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "hs_event");
    }
}
