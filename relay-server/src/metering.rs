//! Structured, append-only close records. Not part of any correctness
//! invariant — purely an observability sink.

use crate::state::ClosedSession;

pub fn record_close(closed: ClosedSession) {
    tracing::info!(
        session_id = %closed.session_id,
        duration_secs = closed.duration_secs,
        bytes_a_to_b = closed.bytes_a_to_b,
        bytes_b_to_a = closed.bytes_b_to_a,
        "relay session closed"
    );
}
