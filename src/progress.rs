// SPDX-License-Identifier: MIT
//! Progress estimation.
//!
//! Branching and injected follow-ups make the real question count unknowable
//! up front, so the percentage works off the session's running estimate:
//!
//! `min(100, round(100 * answered / max(estimate, answered + 1)))`
//!
//! The denominator clamp keeps the ratio sane when more answers land than
//! the estimate predicted. On its own it cannot stop a backslide when
//! queued follow-ups grow the estimate by more than one per answer, so the
//! reported value is additionally floored at the session's high-water mark.
//! A completed session is always 100.

use crate::session::Session;

fn raw_percent(session: &Session) -> u8 {
    if session.is_complete {
        return 100;
    }
    let answered = u64::from(session.answered_count);
    let denominator = u64::from(session.estimated_total).max(answered + 1);
    let percent = (100.0 * answered as f64 / denominator as f64).round() as u64;
    percent.min(100) as u8
}

/// Current percentage for a session, monotone over its lifetime.
pub fn estimate(session: &Session) -> u8 {
    raw_percent(session).max(session.progress_percent)
}

/// Recompute the percentage and persist it as the new high-water mark.
/// Call after every accepted submission and state change.
pub fn advance(session: &mut Session) -> u8 {
    let percent = estimate(session);
    session.progress_percent = percent;
    percent
}
