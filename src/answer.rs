//! Answer values and submissions.
//!
//! Every answer is one of a closed set of shapes keyed by question id. The
//! front end submits loosely-typed JSON; the tagged representation here pins
//! each value to exactly one shape so validation can match exhaustively.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Accumulated answers for one session, keyed by question id.
///
/// Keys are unique; answering the same question again overwrites.
pub type AnswerMap = HashMap<String, AnswerValue>;

/// A single answer value.
///
/// Serialized as `{"type": "text", "value": "…"}` so persisted sessions and
/// gateway payloads round-trip without runtime type inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AnswerValue {
    /// Free text (single-input questions).
    Text(String),
    /// One selected option (single-choice questions).
    Choice(String),
    /// Selected options in selection order (multi-choice questions).
    MultiChoice(Vec<String>),
    /// Yes/no (confirmation questions).
    Bool(bool),
}

impl AnswerValue {
    /// The string content of a `Text` or `Choice` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) | AnswerValue::Choice(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean content of a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The selections of a `MultiChoice` value.
    pub fn selections(&self) -> Option<&[String]> {
        match self {
            AnswerValue::MultiChoice(s) => Some(s),
            _ => None,
        }
    }

    /// Shape name used in validation errors and logs.
    pub fn shape(&self) -> &'static str {
        match self {
            AnswerValue::Text(_) => "text",
            AnswerValue::Choice(_) => "choice",
            AnswerValue::MultiChoice(_) => "multiChoice",
            AnswerValue::Bool(_) => "bool",
        }
    }
}

/// Returns `true` if the answer recorded under `id` equals `expected`
/// (text or choice content). Convenience for skip predicates and branch
/// overrides in catalog definitions.
pub fn answered_eq(answers: &AnswerMap, id: &str, expected: &str) -> bool {
    answers.get(id).and_then(AnswerValue::as_str) == Some(expected)
}

/// One answer submission from the presentation layer. Transient, never
/// persisted; must reference the session's current question or it is
/// rejected as stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: String,
    pub value: AnswerValue,
    /// Milliseconds the user spent on the question, if the front end tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_ms: Option<u64>,
}

impl AnswerSubmission {
    pub fn new(question_id: impl Into<String>, value: AnswerValue) -> Self {
        Self {
            question_id: question_id.into(),
            value,
            time_spent_ms: None,
        }
    }

    pub fn with_time_spent(mut self, ms: u64) -> Self {
        self.time_spent_ms = Some(ms);
        self
    }
}
