//! Question catalog: definitions, prompt/option sources, and the ordered
//! registry the resolver walks.
//!
//! A [`Catalog`] is immutable once built. Sessions reference questions by id,
//! so the builder rejects duplicates up front; everything else about a
//! definition is data plus plain `fn` pointers, which keeps catalogs cheap to
//! share behind an `Arc` and trivially `Send + Sync`.

mod onboarding;

pub use onboarding::onboarding_catalog;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answer::{AnswerMap, AnswerValue};
use crate::validate::ValidationRule;

/// Computes a personalized prompt from prior answers.
pub type PromptFn = fn(&AnswerMap) -> String;
/// Computes the offered options from prior answers.
pub type OptionsFn = fn(&AnswerMap) -> Vec<String>;
/// Decides whether a question should be skipped given prior answers.
pub type SkipFn = fn(&AnswerMap) -> bool;
/// Maps the answer just given to an explicit next question id, if any.
pub type NextFn = fn(&AnswerMap, &AnswerValue) -> Option<String>;

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Interaction style of a question, which fixes the accepted answer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Greeting,
    SingleInput,
    SingleChoice,
    MultiChoice,
    Confirmation,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionKind::Greeting => "greeting",
            QuestionKind::SingleInput => "single_input",
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultiChoice => "multi_choice",
            QuestionKind::Confirmation => "confirmation",
        };
        f.write_str(label)
    }
}

// ─── Prompt and option sources ───────────────────────────────────────────────

/// Where a question's prompt text comes from.
#[derive(Clone)]
pub enum PromptSource {
    /// Fixed text, the common case.
    Literal(String),
    /// Derived from prior answers at presentation time.
    Computed(PromptFn),
}

impl PromptSource {
    pub fn resolve(&self, answers: &AnswerMap) -> String {
        match self {
            PromptSource::Literal(text) => text.clone(),
            PromptSource::Computed(f) => f(answers),
        }
    }
}

impl fmt::Debug for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptSource::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            PromptSource::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// Where a question's options come from. Free-text questions carry `None`.
#[derive(Clone)]
pub enum OptionsSource {
    None,
    Literal(Vec<String>),
    Computed(OptionsFn),
}

impl OptionsSource {
    /// Resolve against prior answers; `None` yields an empty list.
    pub fn resolve(&self, answers: &AnswerMap) -> Vec<String> {
        match self {
            OptionsSource::None => Vec::new(),
            OptionsSource::Literal(opts) => opts.clone(),
            OptionsSource::Computed(f) => f(answers),
        }
    }
}

impl fmt::Debug for OptionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsSource::None => f.write_str("None"),
            OptionsSource::Literal(opts) => f.debug_tuple("Literal").field(opts).finish(),
            OptionsSource::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// ─── Definitions ─────────────────────────────────────────────────────────────

/// A single question as declared in the catalog.
#[derive(Debug, Clone)]
pub struct QuestionDefinition {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: PromptSource,
    pub options: OptionsSource,
    pub validation: Option<ValidationRule>,
    /// Whether an accepted answer here may trigger AI follow-up generation.
    pub requires_ai_followup: bool,
    pub skip_if: Option<SkipFn>,
    pub next_override: Option<NextFn>,
    /// Applied to the session's estimated total when a branch decision at
    /// this question is first observed.
    pub estimate_delta: i64,
}

impl QuestionDefinition {
    pub fn new(id: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            prompt: PromptSource::Literal(String::new()),
            options: OptionsSource::None,
            validation: None,
            requires_ai_followup: false,
            skip_if: None,
            next_override: None,
            estimate_delta: 0,
        }
    }

    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = PromptSource::Literal(text.into());
        self
    }

    pub fn prompt_fn(mut self, f: PromptFn) -> Self {
        self.prompt = PromptSource::Computed(f);
        self
    }

    pub fn options<I, S>(mut self, opts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = OptionsSource::Literal(opts.into_iter().map(Into::into).collect());
        self
    }

    pub fn options_fn(mut self, f: OptionsFn) -> Self {
        self.options = OptionsSource::Computed(f);
        self
    }

    pub fn validation(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    pub fn ai_followup(mut self) -> Self {
        self.requires_ai_followup = true;
        self
    }

    pub fn skip_if(mut self, f: SkipFn) -> Self {
        self.skip_if = Some(f);
        self
    }

    pub fn next_override(mut self, f: NextFn) -> Self {
        self.next_override = Some(f);
        self
    }

    pub fn estimate_delta(mut self, delta: i64) -> Self {
        self.estimate_delta = delta;
        self
    }

    /// Whether this question is skipped for the given answer set.
    pub fn is_skipped(&self, answers: &AnswerMap) -> bool {
        self.skip_if.map(|f| f(answers)).unwrap_or(false)
    }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Error raised while building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate question id: {0:?}")]
    DuplicateId(String),
    #[error("catalog has no questions")]
    Empty,
    #[error("question {0:?} has an empty prompt")]
    EmptyPrompt(String),
}

/// Ordered, id-indexed set of question definitions.
pub struct Catalog {
    order: Vec<String>,
    index: HashMap<String, QuestionDefinition>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn get(&self, id: &str) -> Option<&QuestionDefinition> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of a question in the base order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|q| q == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Question ids in declaration order.
    pub fn base_order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// How many questions are active (not skipped) for the given answers.
    /// With an empty answer map this is the baseline length estimate.
    pub fn active_len(&self, answers: &AnswerMap) -> usize {
        self.order
            .iter()
            .filter_map(|id| self.index.get(id))
            .filter(|def| !def.is_skipped(answers))
            .count()
    }

    /// First question in base order not skipped for the given answers.
    pub fn first_active(&self, answers: &AnswerMap) -> Option<&QuestionDefinition> {
        self.order
            .iter()
            .filter_map(|id| self.index.get(id))
            .find(|def| !def.is_skipped(answers))
    }

    /// Next non-skipped question strictly after `current_id` in base order.
    /// Returns `None` when `current_id` is unknown or is the last active one.
    pub fn next_active_after(
        &self,
        current_id: &str,
        answers: &AnswerMap,
    ) -> Option<&QuestionDefinition> {
        let pos = self.position(current_id)?;
        self.order[pos + 1..]
            .iter()
            .filter_map(|id| self.index.get(id))
            .find(|def| !def.is_skipped(answers))
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog").field("order", &self.order).finish()
    }
}

/// Accumulates definitions and checks catalog-level invariants at build time.
#[derive(Default)]
pub struct CatalogBuilder {
    questions: Vec<QuestionDefinition>,
}

impl CatalogBuilder {
    pub fn push(mut self, question: QuestionDefinition) -> Self {
        self.questions.push(question);
        self
    }

    pub fn build(self) -> Result<Catalog, CatalogError> {
        if self.questions.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut order = Vec::with_capacity(self.questions.len());
        let mut index = HashMap::with_capacity(self.questions.len());
        for def in self.questions {
            if let PromptSource::Literal(text) = &def.prompt {
                if text.trim().is_empty() {
                    return Err(CatalogError::EmptyPrompt(def.id.clone()));
                }
            }
            if index.contains_key(&def.id) {
                return Err(CatalogError::DuplicateId(def.id));
            }
            order.push(def.id.clone());
            index.insert(def.id.clone(), def);
        }
        Ok(Catalog { order, index })
    }
}
