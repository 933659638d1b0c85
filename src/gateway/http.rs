// SPDX-License-Identifier: MIT
//! HTTP follow-up gateway.
//!
//! Posts the answer context to `{endpoint}/followups` and expects a JSON
//! body with a `followupQuestions` array. The client carries its own
//! request timeout as a backstop under the engine's tighter deadline.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{FollowupGateway, FollowupQuestion, FollowupRequest};

pub struct HttpFollowupGateway {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowupResponse {
    #[serde(default)]
    followup_questions: Vec<FollowupQuestion>,
}

impl HttpFollowupGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build follow-up HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FollowupGateway for HttpFollowupGateway {
    async fn fetch_followups(&self, request: FollowupRequest) -> Result<Vec<FollowupQuestion>> {
        let url = format!("{}/followups", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("follow-up request failed")?;

        if !resp.status().is_success() {
            bail!("follow-up service returned {}", resp.status());
        }

        let body: FollowupResponse = resp
            .json()
            .await
            .context("follow-up response was not valid JSON")?;
        debug!(
            question_id = %request.question_id,
            count = body.followup_questions.len(),
            "follow-up service responded"
        );
        Ok(body.followup_questions)
    }
}
