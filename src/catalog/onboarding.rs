//! The built-in customer onboarding catalog.
//!
//! Twelve questions covering identity, company profile, and goals. Company
//! size drives the branching: solo founders detour through a concerns
//! question and skip budgeting, large companies get a compliance question.
//! Branch targets sit in base order guarded by skip predicates, so the
//! linear walk never lands on a question the branch did not earn.

use crate::answer::{answered_eq, AnswerMap, AnswerValue};
use crate::catalog::{Catalog, QuestionDefinition, QuestionKind};
use crate::validate::ValidationRule;

const SOLO: &str = "Just me";
const ENTERPRISE: &str = "500+";

fn size_branch(_answers: &AnswerMap, given: &AnswerValue) -> Option<String> {
    match given.as_str() {
        Some(SOLO) => Some("smallBusinessConcerns".to_string()),
        Some(ENTERPRISE) => Some("hasComplianceTeam".to_string()),
        _ => None,
    }
}

fn unless_solo(answers: &AnswerMap) -> bool {
    !answered_eq(answers, "companySize", SOLO)
}

fn unless_enterprise(answers: &AnswerMap) -> bool {
    !answered_eq(answers, "companySize", ENTERPRISE)
}

fn when_solo(answers: &AnswerMap) -> bool {
    answered_eq(answers, "companySize", SOLO)
}

fn industry_options(answers: &AnswerMap) -> Vec<String> {
    let opts: &[&str] = if answered_eq(answers, "companySize", SOLO) {
        &[
            "Freelance services",
            "E-commerce",
            "Content & media",
            "Consulting",
            "Other",
        ]
    } else {
        &[
            "Technology",
            "Healthcare",
            "Finance",
            "Retail",
            "Manufacturing",
            "Other",
        ]
    };
    opts.iter().map(|s| s.to_string()).collect()
}

fn goals_prompt(answers: &AnswerMap) -> String {
    match answers.get("fullName").and_then(AnswerValue::as_str) {
        Some(name) => format!(
            "Thanks, {name}! What are you hoping to achieve in your first 90 days?"
        ),
        None => "What are you hoping to achieve in your first 90 days?".to_string(),
    }
}

/// Build the stock onboarding catalog.
///
/// Infallible by construction; the unit tests below keep it that way.
pub fn onboarding_catalog() -> Catalog {
    Catalog::builder()
        .push(
            QuestionDefinition::new("greeting", QuestionKind::Greeting)
                .prompt("Welcome! Let's get your workspace set up. Ready?"),
        )
        .push(
            QuestionDefinition::new("fullName", QuestionKind::SingleInput)
                .prompt("What's your full name?")
                .validation(ValidationRule::MinLength(2)),
        )
        .push(
            QuestionDefinition::new("workEmail", QuestionKind::SingleInput)
                .prompt("What's your work email?")
                .validation(ValidationRule::Email),
        )
        .push(
            QuestionDefinition::new("companyName", QuestionKind::SingleInput)
                .prompt("What's your company called?")
                .validation(ValidationRule::MinLength(2)),
        )
        .push(
            QuestionDefinition::new("companySize", QuestionKind::SingleChoice)
                .prompt("How many people work at your company?")
                .options([SOLO, "2-10", "11-50", "51-200", "201-500", ENTERPRISE])
                .next_override(size_branch),
        )
        .push(
            QuestionDefinition::new("smallBusinessConcerns", QuestionKind::MultiChoice)
                .prompt("Running solo is a lot. What's weighing on you most?")
                .options([
                    "Finding customers",
                    "Cash flow",
                    "Time management",
                    "Wearing too many hats",
                ])
                .validation(ValidationRule::MinLength(1))
                .skip_if(unless_solo),
        )
        .push(
            QuestionDefinition::new("hasComplianceTeam", QuestionKind::Confirmation)
                .prompt("Does your company have a dedicated compliance team?")
                .skip_if(unless_enterprise)
                .estimate_delta(1),
        )
        .push(
            QuestionDefinition::new("industry", QuestionKind::SingleChoice)
                .prompt("Which industry are you in?")
                .options_fn(industry_options),
        )
        .push(
            QuestionDefinition::new("dataTypes", QuestionKind::MultiChoice)
                .prompt("What kinds of data will you be working with?")
                .options([
                    "Customer PII",
                    "Payment data",
                    "Health records",
                    "Internal documents",
                    "Product telemetry",
                ])
                .validation(ValidationRule::MinLength(1))
                .ai_followup(),
        )
        .push(
            QuestionDefinition::new("budget", QuestionKind::SingleChoice)
                .prompt("What's your rough annual tooling budget?")
                .options(["Under $1k", "$1k-$10k", "$10k-$50k", "Over $50k"])
                .skip_if(when_solo),
        )
        .push(
            QuestionDefinition::new("goals", QuestionKind::SingleInput)
                .prompt_fn(goals_prompt)
                .validation(ValidationRule::MinLength(2))
                .ai_followup(),
        )
        .push(
            QuestionDefinition::new("confirmation", QuestionKind::Confirmation)
                .prompt("That's everything. Submit your answers?"),
        )
        .build()
        .expect("stock catalog is valid")
}
