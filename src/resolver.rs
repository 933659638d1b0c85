// SPDX-License-Identifier: MIT
//! Next-question resolution.
//!
//! Overrides win: if the current question declares a `next_override` and it
//! names a real, different question, the flow jumps there even when the
//! target's skip predicate would hide it from the linear walk (the catalog
//! author asked for the jump explicitly). A self-referencing or unknown
//! target is logged and ignored rather than trusted, and the walk falls back
//! to the next active question in base order. `None` means the flow is done.

use tracing::warn;

use crate::answer::{AnswerMap, AnswerValue};
use crate::catalog::Catalog;

/// A resolved step, tagged with how it was chosen so callers can apply
/// branch-specific bookkeeping only when a branch was actually taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextStep {
    pub question_id: String,
    pub via_override: bool,
}

/// Resolve the question after `current_id`, given the full answer map
/// (including the answer just recorded) and the value that was given.
/// Overrides only fire when a given answer is present.
pub fn resolve_next(
    catalog: &Catalog,
    current_id: &str,
    answers: &AnswerMap,
    given: Option<&AnswerValue>,
) -> Option<NextStep> {
    if let (Some(def), Some(given)) = (catalog.get(current_id), given) {
        if let Some(next_fn) = def.next_override {
            if let Some(target) = next_fn(answers, given) {
                if target == current_id {
                    warn!(
                        question_id = %current_id,
                        "next override points at itself, falling back to base order"
                    );
                } else if !catalog.contains(&target) {
                    warn!(
                        question_id = %current_id,
                        target = %target,
                        "next override names an unknown question, falling back to base order"
                    );
                } else {
                    return Some(NextStep {
                        question_id: target,
                        via_override: true,
                    });
                }
            }
        }
    }

    catalog
        .next_active_after(current_id, answers)
        .map(|def| NextStep {
            question_id: def.id.clone(),
            via_override: false,
        })
}
