// SPDX-License-Identifier: MIT
//! AI follow-up gateway: the seam between the questionnaire flow and an
//! external question-generation service.
//!
//! Generated questions are plain data (no catalog functions), so they
//! serialize into the session and survive a restart mid-detour. Whatever a
//! gateway returns is treated as untrusted input: [`sanitize_followups`]
//! runs on every batch before anything reaches a session.

pub mod http;

pub use http::HttpFollowupGateway;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::answer::{AnswerMap, AnswerValue};
use crate::catalog::{Catalog, QuestionKind};
use crate::validate::ValidationRule;

// ─── Wire types ──────────────────────────────────────────────────────────────

/// A generated follow-up question. Unlike catalog definitions these carry no
/// computed sources, which is what lets them round-trip through a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupQuestion {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

/// Context sent to the gateway when an answer is eligible for follow-ups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupRequest {
    pub question_id: String,
    pub answer_given: AnswerValue,
    pub prior_answers: AnswerMap,
}

// ─── Gateway trait ───────────────────────────────────────────────────────────

/// Source of generated follow-up questions.
///
/// Implementations may take as long as they like; the engine wraps calls in
/// its own timeout and degrades the flow when a gateway misbehaves.
#[async_trait]
pub trait FollowupGateway: Send + Sync {
    async fn fetch_followups(&self, request: FollowupRequest) -> Result<Vec<FollowupQuestion>>;
}

// ─── Sanitization ────────────────────────────────────────────────────────────

/// Clean a gateway batch before it is queued on a session.
///
/// Drops questions with blank prompts and choice questions with no options.
/// Ids that are blank, collide with the catalog, or repeat within the batch
/// are replaced with a fresh `ai-` id. The result is truncated to `max`.
pub fn sanitize_followups(
    batch: Vec<FollowupQuestion>,
    catalog: &Catalog,
    max: usize,
) -> Vec<FollowupQuestion> {
    let mut kept: Vec<FollowupQuestion> = Vec::with_capacity(batch.len().min(max));

    for mut question in batch {
        if kept.len() == max {
            break;
        }
        if question.prompt.trim().is_empty() {
            warn!(id = %question.id, "dropping follow-up with empty prompt");
            continue;
        }
        let needs_options = matches!(
            question.kind,
            QuestionKind::SingleChoice | QuestionKind::MultiChoice
        );
        if needs_options && question.options.is_empty() {
            warn!(
                id = %question.id,
                kind = %question.kind,
                "dropping choice follow-up with no options"
            );
            continue;
        }
        let id_taken = question.id.trim().is_empty()
            || catalog.contains(&question.id)
            || kept.iter().any(|q| q.id == question.id);
        if id_taken {
            let fresh = generated_id();
            warn!(old = %question.id, new = %fresh, "reassigning follow-up id");
            question.id = fresh;
        }
        kept.push(question);
    }

    kept
}

fn generated_id() -> String {
    format!("ai-{}", &Uuid::new_v4().to_string()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QuestionDefinition;

    fn catalog() -> Catalog {
        Catalog::builder()
            .push(QuestionDefinition::new("goals", QuestionKind::SingleInput).prompt("Q?"))
            .build()
            .unwrap()
    }

    fn followup(id: &str, prompt: &str) -> FollowupQuestion {
        FollowupQuestion {
            id: id.into(),
            kind: QuestionKind::SingleInput,
            prompt: prompt.into(),
            options: Vec::new(),
            validation: None,
        }
    }

    #[test]
    fn drops_blank_prompts_and_optionless_choices() {
        let batch = vec![
            followup("f1", "   "),
            FollowupQuestion {
                id: "f2".into(),
                kind: QuestionKind::SingleChoice,
                prompt: "Pick one".into(),
                options: Vec::new(),
                validation: None,
            },
            followup("f3", "Tell me more?"),
        ];

        let kept = sanitize_followups(batch, &catalog(), 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "f3");
    }

    #[test]
    fn reassigns_colliding_and_duplicate_ids() {
        let batch = vec![
            followup("goals", "Collides with the catalog"),
            followup("dup", "First of a pair"),
            followup("dup", "Second of a pair"),
            followup("", "Blank id"),
        ];

        let kept = sanitize_followups(batch, &catalog(), 5);
        assert_eq!(kept.len(), 4);
        assert!(kept[0].id.starts_with("ai-"));
        assert_eq!(kept[1].id, "dup");
        assert!(kept[2].id.starts_with("ai-"));
        assert!(kept[3].id.starts_with("ai-"));
        // All ids distinct after sanitization.
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn truncates_to_cap() {
        let batch = (0..6).map(|i| followup(&format!("f{i}"), "Q?")).collect();
        let kept = sanitize_followups(batch, &catalog(), 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[2].id, "f2");
    }

    #[test]
    fn followup_round_trips_through_json() {
        let q = FollowupQuestion {
            id: "ai-1a2b3c4d".into(),
            kind: QuestionKind::SingleChoice,
            prompt: "Which matters most?".into(),
            options: vec!["Speed".into(), "Cost".into()],
            validation: Some(ValidationRule::MinLength(1)),
        };
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains("\"kind\":\"single_choice\""));
        let back: FollowupQuestion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"id":"f1","kind":"single_input","prompt":"Q?"}"#;
        let q: FollowupQuestion = serde_json::from_str(json).unwrap();
        assert!(q.options.is_empty());
        assert!(q.validation.is_none());
    }
}
