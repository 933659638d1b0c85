// SPDX-License-Identifier: MIT
//! Answer validation rules.
//!
//! Each question may carry at most one [`ValidationRule`], selected in the
//! catalog by its tag form (`"email"`, `"password"`, `"min-length:2"`).
//! Shape checks (does a single-choice question get a `Choice` value?) and
//! option-membership checks live here too so the engine rejects an answer
//! with a named rule before any session state is touched.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;
use crate::catalog::QuestionKind;

/// Pragmatic email shape check, not full RFC 5322, which rejects more real
/// addresses than it catches fakes.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
});

const PASSWORD_MIN_CHARS: usize = 8;

// ─── Rules ───────────────────────────────────────────────────────────────────

/// Validation rule attached to a question definition.
///
/// Serializes as its tag string so gateway payloads and persisted sessions
/// carry `"min-length:2"` rather than a structural enum encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValidationRule {
    /// Text value must look like an email address.
    Email,
    /// Text value must be at least 8 chars with a letter and a digit.
    Password,
    /// Text: at least N chars (trimmed). Multi-choice: at least N selections.
    MinLength(usize),
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Email => write!(f, "email"),
            ValidationRule::Password => write!(f, "password"),
            ValidationRule::MinLength(n) => write!(f, "min-length:{n}"),
        }
    }
}

/// Error parsing a validation tag string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown validation rule tag: {0:?}")]
pub struct ParseRuleError(pub String);

impl FromStr for ValidationRule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ValidationRule::Email),
            "password" => Ok(ValidationRule::Password),
            other => {
                if let Some(n) = other.strip_prefix("min-length:") {
                    let n: usize = n.parse().map_err(|_| ParseRuleError(s.to_string()))?;
                    return Ok(ValidationRule::MinLength(n));
                }
                Err(ParseRuleError(s.to_string()))
            }
        }
    }
}

impl TryFrom<String> for ValidationRule {
    type Error = ParseRuleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ValidationRule> for String {
    fn from(rule: ValidationRule) -> String {
        rule.to_string()
    }
}

// ─── Violations ──────────────────────────────────────────────────────────────

/// A failed check, naming the rule so the caller can re-prompt precisely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    /// Tag of the failed rule (`"email"`, `"min-length:2"`, `"type"`, `"options"`).
    pub rule: String,
    pub reason: String,
}

impl RuleViolation {
    fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

// ─── Checks ──────────────────────────────────────────────────────────────────

/// Check a submitted value against a question's declared rule.
pub fn check_rule(rule: ValidationRule, value: &AnswerValue) -> Result<(), RuleViolation> {
    match rule {
        ValidationRule::Email => match value.as_str() {
            Some(s) if EMAIL_RE.is_match(s.trim()) => Ok(()),
            Some(_) => Err(RuleViolation::new("email", "not a valid email address")),
            None => Err(RuleViolation::new(
                "email",
                format!("email rule needs a text value, got {}", value.shape()),
            )),
        },
        ValidationRule::Password => {
            let s = value.as_str().ok_or_else(|| {
                RuleViolation::new(
                    "password",
                    format!("password rule needs a text value, got {}", value.shape()),
                )
            })?;
            if s.chars().count() < PASSWORD_MIN_CHARS {
                return Err(RuleViolation::new(
                    "password",
                    format!("must be at least {PASSWORD_MIN_CHARS} characters"),
                ));
            }
            if !s.chars().any(|c| c.is_alphabetic()) || !s.chars().any(|c| c.is_numeric()) {
                return Err(RuleViolation::new(
                    "password",
                    "must contain at least one letter and one digit",
                ));
            }
            Ok(())
        }
        ValidationRule::MinLength(n) => match value {
            AnswerValue::Text(s) | AnswerValue::Choice(s) => {
                if s.trim().chars().count() >= n {
                    Ok(())
                } else {
                    Err(RuleViolation::new(
                        rule.to_string(),
                        format!("must be at least {n} characters"),
                    ))
                }
            }
            AnswerValue::MultiChoice(sel) => {
                if sel.len() >= n {
                    Ok(())
                } else {
                    Err(RuleViolation::new(
                        rule.to_string(),
                        format!("select at least {n} options"),
                    ))
                }
            }
            AnswerValue::Bool(_) => Err(RuleViolation::new(
                rule.to_string(),
                "rule does not apply to a yes/no answer",
            )),
        },
    }
}

/// Check the answer shape against the question kind. Exhaustive on purpose:
/// a new kind or shape must be wired here before it compiles.
pub fn check_kind(kind: QuestionKind, value: &AnswerValue) -> Result<(), RuleViolation> {
    let ok = match (kind, value) {
        (QuestionKind::SingleInput, AnswerValue::Text(_)) => true,
        (QuestionKind::SingleChoice, AnswerValue::Choice(_)) => true,
        (QuestionKind::MultiChoice, AnswerValue::MultiChoice(_)) => true,
        (QuestionKind::Confirmation, AnswerValue::Bool(_)) => true,
        // A greeting takes any acknowledgement, tapped button or typed text.
        (QuestionKind::Greeting, AnswerValue::Text(_) | AnswerValue::Bool(_)) => true,
        (
            QuestionKind::Greeting
            | QuestionKind::SingleInput
            | QuestionKind::SingleChoice
            | QuestionKind::MultiChoice
            | QuestionKind::Confirmation,
            _,
        ) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(RuleViolation::new(
            "type",
            format!("{} question does not accept a {} answer", kind, value.shape()),
        ))
    }
}

/// Check that selected option(s) are members of the question's resolved
/// options list. An empty options list skips the check, since
/// context-dependent option functions may legitimately resolve to nothing.
pub fn check_options(options: &[String], value: &AnswerValue) -> Result<(), RuleViolation> {
    if options.is_empty() {
        return Ok(());
    }
    match value {
        AnswerValue::Choice(sel) => {
            if options.iter().any(|o| o == sel) {
                Ok(())
            } else {
                Err(RuleViolation::new(
                    "options",
                    format!("{sel:?} is not one of the offered options"),
                ))
            }
        }
        AnswerValue::MultiChoice(sels) => {
            match sels.iter().find(|s| !options.contains(s)) {
                None => Ok(()),
                Some(bad) => Err(RuleViolation::new(
                    "options",
                    format!("{bad:?} is not one of the offered options"),
                )),
            }
        }
        // Non-choice shapes have no options to be a member of.
        _ => Ok(()),
    }
}
