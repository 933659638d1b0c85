// SPDX-License-Identifier: MIT
//! Engine error surface.
//!
//! Everything a caller can mishandle gets its own variant so front ends can
//! branch on kind without string matching. Store failures pass through as
//! opaque internal errors.

use std::fmt;

/// Why a session can no longer accept submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// No session under that token. Covers never-existed and already-reset.
    NotFound,
    /// The session outlived its TTL and has been removed.
    Expired,
    /// The flow already finished; answers are frozen.
    Completed,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TerminationReason::NotFound => "not found",
            TerminationReason::Expired => "expired",
            TerminationReason::Completed => "already completed",
        };
        f.write_str(label)
    }
}

/// Errors returned by the questionnaire engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The submitted answer failed the named rule. Session state is
    /// untouched; the caller should re-present the same question.
    #[error("answer to {question_id:?} rejected by {rule} rule: {reason}")]
    Validation {
        question_id: String,
        rule: String,
        reason: String,
    },
    /// The submission names a question that is not the one on screen,
    /// usually a double-send or an out-of-order retry.
    #[error("stale submission: session is at {expected:?}, got answer for {got:?}")]
    StaleSubmission { expected: String, got: String },
    #[error("session {0}")]
    SessionTerminated(TerminationReason),
    #[error("session store failure: {0}")]
    Store(#[from] anyhow::Error),
    /// An internal invariant broke. Never produced by caller input.
    #[error("engine invariant violated: {0}")]
    Internal(&'static str),
}

impl EngineError {
    /// Stable machine-readable code for IPC envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "VALIDATION_FAILED",
            EngineError::StaleSubmission { .. } => "STALE_SUBMISSION",
            EngineError::SessionTerminated(TerminationReason::NotFound) => "SESSION_NOT_FOUND",
            EngineError::SessionTerminated(TerminationReason::Expired) => "SESSION_EXPIRED",
            EngineError::SessionTerminated(TerminationReason::Completed) => "SESSION_COMPLETED",
            EngineError::Store(_) => "STORE_FAILURE",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
