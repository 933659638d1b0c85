//! Session state: one respondent's progress through a questionnaire.
//!
//! A [`Session`] is pure serializable data. Policy (validation, resolution,
//! expiry handling) lives in the engine; persistence lives behind
//! [`store::SessionStore`]. Field names serialize camelCase to match the
//! JSON the front ends exchange.

pub mod store;

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answer::{AnswerMap, AnswerValue};
use crate::gateway::FollowupQuestion;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token, also the storage key.
    pub token: String,
    /// Id of the question the respondent is looking at right now. During an
    /// AI detour this is the follow-up's id, not a catalog id.
    pub current_question_id: String,
    pub answers: AnswerMap,
    /// Accepted submissions, follow-ups included.
    pub answered_count: u32,
    /// Generated follow-ups waiting to be presented, in arrival order.
    pub ai_queue: VecDeque<FollowupQuestion>,
    /// The follow-up currently presented, if the session is in a detour.
    pub active_followup: Option<FollowupQuestion>,
    /// Catalog question to resolve from once the detour drains.
    pub base_resume_id: Option<String>,
    pub is_complete: bool,
    /// Set once the follow-up service has failed this session; never unset.
    pub fallback_mode: bool,
    pub estimated_total: u32,
    /// High-water mark of reported progress. Queued follow-ups can grow the
    /// estimate faster than answers arrive; this keeps the percentage from
    /// sliding backwards when that happens.
    pub progress_percent: u8,
    pub total_time_spent_ms: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(first_question_id: impl Into<String>, baseline_estimate: u32, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            current_question_id: first_question_id.into(),
            answers: AnswerMap::new(),
            answered_count: 0,
            ai_queue: VecDeque::new(),
            active_followup: None,
            base_resume_id: None,
            is_complete: false,
            fallback_mode: false,
            estimated_total: baseline_estimate.max(1),
            progress_percent: 0,
            total_time_spent_ms: 0,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Record an accepted answer under `question_id` and bump the counters.
    /// Re-answering the same id (via a stale-free resubmit path) overwrites
    /// the value but still counts as a new accepted submission. Reported
    /// time is caller-supplied and accumulates with saturation.
    pub fn record_answer(
        &mut self,
        question_id: &str,
        value: AnswerValue,
        time_spent_ms: Option<u64>,
    ) {
        self.answers.insert(question_id.to_string(), value);
        self.answered_count += 1;
        self.total_time_spent_ms = self
            .total_time_spent_ms
            .saturating_add(time_spent_ms.unwrap_or(0));
    }

    /// Shift the length estimate, clamped so it never drops below what has
    /// already happened plus the question currently on screen.
    pub fn adjust_estimate(&mut self, delta: i64) {
        let floor = i64::from(self.answered_count) + 1;
        let shifted = i64::from(self.estimated_total) + delta;
        self.estimated_total = shifted.max(floor).min(i64::from(u32::MAX)) as u32;
    }

    /// Present a queued follow-up: it becomes the current question.
    pub fn present_followup(&mut self, followup: FollowupQuestion) {
        self.current_question_id = followup.id.clone();
        self.active_followup = Some(followup);
    }

    /// Whether the session is inside an AI detour (presenting a follow-up
    /// or holding queued ones).
    pub fn in_ai_detour(&self) -> bool {
        self.active_followup.is_some() || !self.ai_queue.is_empty()
    }
}
