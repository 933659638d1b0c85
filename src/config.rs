//! Engine configuration.
//!
//! Parsed from TOML with the same layering hosts use elsewhere: every field
//! has a built-in default, sections may be omitted entirely, and a config
//! that parses but makes no sense (zero TTL, zero timeout) is rejected up
//! front rather than discovered mid-session.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_TTL_SECS: u64 = 30 * 60;
const DEFAULT_AI_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_MAX_FOLLOWUPS: usize = 3;

/// Session lifecycle settings (`[session]` in TOML).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a session in seconds (default: 1800).
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// Follow-up service settings (`[ai]` in TOML).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// Follow-up service base URL. None = follow-ups disabled.
    pub endpoint: Option<String>,
    /// Hard deadline for one follow-up fetch in milliseconds (default: 4000).
    /// The flow degrades to catalog-only when the deadline is missed.
    pub timeout_ms: u64,
    /// Most follow-ups accepted from a single batch (default: 3; 0 accepts none).
    pub max_followups: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_AI_TIMEOUT_MS,
            max_followups: DEFAULT_MAX_FOLLOWUPS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub ai: AiConfig,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(raw).context("failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session.ttl_secs == 0 {
            bail!("session.ttl_secs must be positive");
        }
        if self.ai.timeout_ms == 0 {
            bail!("ai.timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session.ttl_secs as i64)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai.timeout_ms)
    }
}
