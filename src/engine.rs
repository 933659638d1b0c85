// SPDX-License-Identifier: MIT
//! The questionnaire engine: one `answer in, next prompt out` state machine
//! over a catalog, a session store, and an optional follow-up gateway.
//!
//! The engine holds no per-session state of its own and does no locking;
//! each call loads a session by token, applies one transition, and saves.
//! Serializing concurrent submissions for the same token is the store's
//! job, and a duplicate that slips through loses the race and gets a
//! `StaleSubmission` back.
//!
//! Submission handling, in order: lifecycle checks, stale check, validation
//! (no state is touched on failure), record, then pick what to present
//! next. A non-empty AI queue always wins; otherwise an AI-eligible answer
//! may fetch new follow-ups; otherwise the branch resolver walks the
//! catalog. A drained detour resolves from the question that triggered it,
//! not from the last follow-up. No next question means the flow is
//! complete, and completion is final.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::answer::{AnswerMap, AnswerSubmission, AnswerValue};
use crate::catalog::{Catalog, QuestionDefinition, QuestionKind};
use crate::config::EngineConfig;
use crate::error::{EngineError, TerminationReason};
use crate::gateway::{
    sanitize_followups, FollowupGateway, FollowupQuestion, FollowupRequest, HttpFollowupGateway,
};
use crate::progress;
use crate::resolver;
use crate::session::{store::SessionStore, Session};
use crate::validate::{self, RuleViolation, ValidationRule};

// ─── View types ──────────────────────────────────────────────────────────────

/// A question as presented to the caller: prompt and options already
/// rendered against the session's answers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    /// True when this question came from the follow-up service.
    pub ai_injected: bool,
}

impl QuestionView {
    fn from_definition(def: &QuestionDefinition, answers: &AnswerMap) -> Self {
        Self {
            id: def.id.clone(),
            kind: def.kind,
            prompt: def.prompt.resolve(answers),
            options: def.options.resolve(answers),
            ai_injected: false,
        }
    }

    fn from_followup(followup: &FollowupQuestion) -> Self {
        Self {
            id: followup.id.clone(),
            kind: followup.kind,
            prompt: followup.prompt.clone(),
            options: followup.options.clone(),
            ai_injected: true,
        }
    }
}

/// What one engine call hands back to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EngineOutput {
    #[serde(rename_all = "camelCase")]
    Next {
        question: QuestionView,
        progress_percent: u8,
        fallback_mode_active: bool,
    },
    #[serde(rename_all = "camelCase")]
    Complete { final_answers: AnswerMap },
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct QuestionnaireEngine {
    catalog: Arc<Catalog>,
    store: Arc<dyn SessionStore>,
    gateway: Option<Arc<dyn FollowupGateway>>,
    config: EngineConfig,
}

impl QuestionnaireEngine {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn SessionStore>, config: EngineConfig) -> Self {
        Self {
            catalog,
            store,
            gateway: None,
            config,
        }
    }

    /// Build an engine from config alone. A set `[ai] endpoint` attaches an
    /// HTTP follow-up gateway pointed at it; without one the flow runs
    /// catalog-only.
    pub fn from_config(
        catalog: Arc<Catalog>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> anyhow::Result<Self> {
        let gateway = match &config.ai.endpoint {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "follow-up gateway configured");
                let http = HttpFollowupGateway::new(endpoint.clone(), config.ai_timeout())?;
                Some(Arc::new(http) as Arc<dyn FollowupGateway>)
            }
            None => None,
        };
        Ok(Self {
            catalog,
            store,
            gateway,
            config,
        })
    }

    /// Attach a follow-up gateway, replacing any configured one. Without a
    /// gateway, AI-eligible questions simply never detour.
    pub fn with_gateway(mut self, gateway: Arc<dyn FollowupGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Create a session and return its token plus the first question.
    pub async fn start(&self) -> Result<(String, EngineOutput), EngineError> {
        let empty = AnswerMap::new();
        let first_id = match self.catalog.first_active(&empty) {
            Some(def) => def.id.clone(),
            // Every opener is skipped at rest; present the head anyway and
            // let the resolver sort out the rest of the walk.
            None => match self.catalog.base_order().next() {
                Some(id) => id.to_string(),
                // Unreachable: the catalog builder rejects empty catalogs.
                None => return Err(EngineError::Internal("catalog has no questions")),
            },
        };
        let baseline = self.catalog.active_len(&empty).max(1) as u32;

        let mut session = Session::new(&first_id, baseline, self.config.session_ttl());
        let progress_percent = progress::advance(&mut session);
        self.store.save(&session).await?;
        info!(
            token = %session.token,
            first = %first_id,
            estimate = baseline,
            "questionnaire session started"
        );

        let def = self
            .catalog
            .get(&first_id)
            .ok_or_else(|| EngineError::SessionTerminated(TerminationReason::NotFound))?;
        Ok((
            session.token.clone(),
            EngineOutput::Next {
                question: QuestionView::from_definition(def, &session.answers),
                progress_percent,
                fallback_mode_active: false,
            },
        ))
    }

    /// Re-present the current state of a session without mutating it.
    pub async fn resume(&self, token: &str) -> Result<EngineOutput, EngineError> {
        let session = self.load_session(token).await?;
        if session.is_complete {
            return Ok(EngineOutput::Complete {
                final_answers: session.answers.clone(),
            });
        }

        let question = if let Some(followup) = &session.active_followup {
            QuestionView::from_followup(followup)
        } else {
            match self.catalog.get(&session.current_question_id) {
                Some(def) => QuestionView::from_definition(def, &session.answers),
                None => {
                    error!(
                        token = %token,
                        question_id = %session.current_question_id,
                        "session points at a question the catalog no longer has"
                    );
                    return Err(EngineError::SessionTerminated(TerminationReason::NotFound));
                }
            }
        };

        Ok(EngineOutput::Next {
            question,
            progress_percent: progress::estimate(&session),
            fallback_mode_active: session.fallback_mode,
        })
    }

    /// Discard a session. Returns whether one existed.
    pub async fn reset(&self, token: &str) -> Result<bool, EngineError> {
        let removed = self.store.delete(token).await?;
        if removed {
            info!(token = %token, "session reset");
        }
        Ok(removed)
    }

    // ─── Submission ──────────────────────────────────────────────────────────

    pub async fn submit_answer(
        &self,
        token: &str,
        submission: AnswerSubmission,
    ) -> Result<EngineOutput, EngineError> {
        let mut session = self.load_session(token).await?;
        if session.is_complete {
            return Err(EngineError::SessionTerminated(TerminationReason::Completed));
        }

        if submission.question_id != session.current_question_id {
            return Err(EngineError::StaleSubmission {
                expected: session.current_question_id.clone(),
                got: submission.question_id,
            });
        }

        // Validate before any mutation. A rejected answer leaves the session
        // exactly where it was.
        let given = submission.value.clone();
        if let Some(active) = &session.active_followup {
            check_submission(
                &active.id,
                active.kind,
                active.validation,
                &active.options,
                &given,
            )?;
        } else {
            let Some(def) = self.catalog.get(&session.current_question_id) else {
                error!(
                    token = %token,
                    question_id = %session.current_question_id,
                    "session points at a question the catalog no longer has"
                );
                return Err(EngineError::SessionTerminated(TerminationReason::NotFound));
            };
            let options = def.options.resolve(&session.answers);
            check_submission(&def.id, def.kind, def.validation, &options, &given)?;
        }

        let answered_id = submission.question_id;
        let answered_followup = session.active_followup.take();
        session.record_answer(&answered_id, submission.value, submission.time_spent_ms);
        debug!(token = %token, question_id = %answered_id, "answer recorded");

        // An in-flight detour drains before anything else gets a say.
        if let Some(next) = session.ai_queue.pop_front() {
            let question = QuestionView::from_followup(&next);
            session.present_followup(next);
            return self.save_and_present(session, question).await;
        }

        // A fresh detour can only start from a catalog question.
        if answered_followup.is_none() {
            if let Some(first) = self.maybe_fetch_followups(&mut session, &answered_id, &given).await
            {
                let question = QuestionView::from_followup(&first);
                session.present_followup(first);
                return self.save_and_present(session, question).await;
            }
        }

        // Base-flow resolution. After a detour, resolve from the question
        // that triggered it; its recorded answer drives the override.
        let (anchor, anchor_answer) = if answered_followup.is_some() {
            match session.base_resume_id.take() {
                Some(anchor) => {
                    let answer = session.answers.get(&anchor).cloned();
                    (anchor, answer)
                }
                None => {
                    error!(
                        token = %token,
                        question_id = %answered_id,
                        "detour drained with no resume anchor"
                    );
                    (answered_id.clone(), None)
                }
            }
        } else {
            (answered_id.clone(), Some(given))
        };

        match resolver::resolve_next(&self.catalog, &anchor, &session.answers, anchor_answer.as_ref())
        {
            Some(step) => {
                if step.via_override && !session.answers.contains_key(&step.question_id) {
                    if let Some(target) = self.catalog.get(&step.question_id) {
                        if target.estimate_delta != 0 {
                            session.adjust_estimate(target.estimate_delta);
                            debug!(
                                token = %token,
                                target = %step.question_id,
                                delta = target.estimate_delta,
                                estimate = session.estimated_total,
                                "branch decision shifted the length estimate"
                            );
                        }
                    }
                }
                let Some(def) = self.catalog.get(&step.question_id) else {
                    error!(
                        token = %token,
                        question_id = %step.question_id,
                        "resolver produced an id the catalog does not have"
                    );
                    return self.finish(session).await;
                };
                let question = QuestionView::from_definition(def, &session.answers);
                session.current_question_id = step.question_id;
                self.save_and_present(session, question).await
            }
            None => self.finish(session).await,
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    /// Load a session, enforcing expiry. Completion is left to the caller
    /// since resuming a finished session is legal while submitting is not.
    async fn load_session(&self, token: &str) -> Result<Session, EngineError> {
        let Some(session) = self.store.load(token).await? else {
            return Err(EngineError::SessionTerminated(TerminationReason::NotFound));
        };
        if session.is_expired(Utc::now()) {
            let _ = self.store.delete(token).await;
            info!(token = %token, "session expired, removed");
            return Err(EngineError::SessionTerminated(TerminationReason::Expired));
        }
        Ok(session)
    }

    /// Ask the gateway for follow-ups to an AI-eligible answer. On success
    /// the sanitized batch is queued (estimate bumped, resume anchor set)
    /// and the head is returned for presentation. Any failure flips the
    /// session into fallback mode and the flow carries on without AI.
    async fn maybe_fetch_followups(
        &self,
        session: &mut Session,
        answered_id: &str,
        given: &AnswerValue,
    ) -> Option<FollowupQuestion> {
        let def = self.catalog.get(answered_id)?;
        if !def.requires_ai_followup {
            return None;
        }
        let gateway = self.gateway.as_ref()?;

        let request = FollowupRequest {
            question_id: answered_id.to_string(),
            answer_given: given.clone(),
            prior_answers: session.answers.clone(),
        };
        let batch = match tokio::time::timeout(
            self.config.ai_timeout(),
            gateway.fetch_followups(request),
        )
        .await
        {
            Ok(Ok(batch)) => batch,
            Ok(Err(err)) => {
                self.enter_fallback(session, answered_id, &format!("{err:#}"));
                return None;
            }
            Err(_) => {
                let reason = format!("timed out after {}ms", self.config.ai.timeout_ms);
                self.enter_fallback(session, answered_id, &reason);
                return None;
            }
        };

        let mut kept = sanitize_followups(batch, &self.catalog, self.config.ai.max_followups);
        kept.retain(|q| {
            let reused = session.answers.contains_key(&q.id);
            if reused {
                warn!(id = %q.id, "dropping follow-up that reuses an answered id");
            }
            !reused
        });
        if kept.is_empty() {
            return None;
        }

        info!(
            token = %session.token,
            question_id = %answered_id,
            count = kept.len(),
            "queueing AI follow-ups"
        );
        session.base_resume_id = Some(answered_id.to_string());
        session.adjust_estimate(kept.len() as i64);
        session.ai_queue.extend(kept);
        session.ai_queue.pop_front()
    }

    fn enter_fallback(&self, session: &mut Session, question_id: &str, reason: &str) {
        if session.fallback_mode {
            debug!(
                token = %session.token,
                question_id = %question_id,
                "follow-up service still degraded: {reason}"
            );
        } else {
            warn!(
                token = %session.token,
                question_id = %question_id,
                "follow-up service degraded, continuing without AI: {reason}"
            );
            session.fallback_mode = true;
        }
    }

    async fn save_and_present(
        &self,
        mut session: Session,
        question: QuestionView,
    ) -> Result<EngineOutput, EngineError> {
        let progress_percent = progress::advance(&mut session);
        let fallback_mode_active = session.fallback_mode;
        self.store.save(&session).await?;
        Ok(EngineOutput::Next {
            question,
            progress_percent,
            fallback_mode_active,
        })
    }

    async fn finish(&self, mut session: Session) -> Result<EngineOutput, EngineError> {
        session.is_complete = true;
        progress::advance(&mut session);
        self.store.save(&session).await?;
        info!(
            token = %session.token,
            answered = session.answered_count,
            total_time_ms = session.total_time_spent_ms,
            "questionnaire complete"
        );
        Ok(EngineOutput::Complete {
            final_answers: session.answers.clone(),
        })
    }
}

fn check_submission(
    question_id: &str,
    kind: QuestionKind,
    rule: Option<ValidationRule>,
    options: &[String],
    value: &AnswerValue,
) -> Result<(), EngineError> {
    let reject = |violation: RuleViolation| EngineError::Validation {
        question_id: question_id.to_string(),
        rule: violation.rule,
        reason: violation.reason,
    };
    validate::check_kind(kind, value).map_err(reject)?;
    if let Some(rule) = rule {
        validate::check_rule(rule, value).map_err(reject)?;
    }
    validate::check_options(options, value).map_err(reject)?;
    Ok(())
}
