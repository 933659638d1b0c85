//! Dynamic onboarding questionnaires: a catalog-driven question flow with
//! branch overrides, skip predicates, AI-generated follow-up detours, and
//! resumable sessions behind opaque tokens.
//!
//! [`QuestionnaireEngine`] is the entry point; sessions live behind a
//! [`SessionStore`], follow-ups behind a [`FollowupGateway`], and the flow
//! stays completable when the latter is absent or failing.

pub mod answer;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod progress;
pub mod resolver;
pub mod session;
pub mod validate;

pub use answer::{AnswerMap, AnswerSubmission, AnswerValue};
pub use catalog::{onboarding_catalog, Catalog, CatalogError, QuestionDefinition, QuestionKind};
pub use config::EngineConfig;
pub use engine::{EngineOutput, QuestionView, QuestionnaireEngine};
pub use error::{EngineError, TerminationReason};
pub use gateway::{FollowupGateway, FollowupQuestion, FollowupRequest, HttpFollowupGateway};
pub use resolver::NextStep;
pub use session::store::{MemoryStore, SessionStore};
pub use session::Session;
pub use validate::ValidationRule;
