//! Integration tests for the questionnaire flow: branching, skip
//! predicates, AI detours, degradation, and session lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intake::{
    onboarding_catalog, AnswerSubmission, AnswerValue, EngineConfig, EngineError, EngineOutput,
    FollowupGateway, FollowupQuestion, FollowupRequest, MemoryStore, QuestionKind,
    QuestionnaireEngine, Session, SessionStore, TerminationReason,
};

// ─── Scripted gateway ────────────────────────────────────────────────────────

enum Script {
    Respond(Vec<FollowupQuestion>),
    Fail,
    Hang,
}

struct MockGateway {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
}

impl MockGateway {
    fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn respond(mut self, question_id: &str, batch: Vec<FollowupQuestion>) -> Self {
        self.scripts
            .insert(question_id.to_string(), Script::Respond(batch));
        self
    }

    fn fail(mut self, question_id: &str) -> Self {
        self.scripts.insert(question_id.to_string(), Script::Fail);
        self
    }

    fn hang(mut self, question_id: &str) -> Self {
        self.scripts.insert(question_id.to_string(), Script::Hang);
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FollowupGateway for MockGateway {
    async fn fetch_followups(
        &self,
        request: FollowupRequest,
    ) -> anyhow::Result<Vec<FollowupQuestion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(&request.question_id) {
            Some(Script::Respond(batch)) => Ok(batch.clone()),
            Some(Script::Fail) => anyhow::bail!("synthetic gateway outage"),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn text(s: &str) -> AnswerValue {
    AnswerValue::Text(s.into())
}

fn choice(s: &str) -> AnswerValue {
    AnswerValue::Choice(s.into())
}

fn multi(items: &[&str]) -> AnswerValue {
    AnswerValue::MultiChoice(items.iter().map(|s| s.to_string()).collect())
}

fn followup_text(id: &str, prompt: &str) -> FollowupQuestion {
    FollowupQuestion {
        id: id.into(),
        kind: QuestionKind::SingleInput,
        prompt: prompt.into(),
        options: Vec::new(),
        validation: None,
    }
}

/// Log output for failing tests; `RUST_LOG=debug cargo test` to see it.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .try_init();
}

fn engine_with(gateway: Option<Arc<MockGateway>>, config: EngineConfig) -> QuestionnaireEngine {
    init_tracing();
    let engine = QuestionnaireEngine::new(
        Arc::new(onboarding_catalog()),
        Arc::new(MemoryStore::new()),
        config,
    );
    match gateway {
        Some(gw) => engine.with_gateway(gw),
        None => engine,
    }
}

async fn submit(
    engine: &QuestionnaireEngine,
    token: &str,
    id: &str,
    value: AnswerValue,
) -> EngineOutput {
    engine
        .submit_answer(token, AnswerSubmission::new(id, value))
        .await
        .unwrap_or_else(|e| panic!("submission for {id} should be accepted: {e}"))
}

fn next_id(output: &EngineOutput) -> &str {
    match output {
        EngineOutput::Next { question, .. } => &question.id,
        EngineOutput::Complete { .. } => panic!("expected a next question, flow completed"),
    }
}

fn progress_of(output: &EngineOutput) -> u8 {
    match output {
        EngineOutput::Next {
            progress_percent, ..
        } => *progress_percent,
        EngineOutput::Complete { .. } => 100,
    }
}

fn fallback_of(output: &EngineOutput) -> bool {
    match output {
        EngineOutput::Next {
            fallback_mode_active,
            ..
        } => *fallback_mode_active,
        EngineOutput::Complete { .. } => false,
    }
}

/// Drive the flow through the shared intro up to `companySize` being the
/// current question.
async fn advance_to_company_size(engine: &QuestionnaireEngine) -> String {
    let (token, output) = engine.start().await.expect("start");
    assert_eq!(next_id(&output), "greeting");

    let output = submit(engine, &token, "greeting", AnswerValue::Bool(true)).await;
    assert_eq!(next_id(&output), "fullName");
    let output = submit(engine, &token, "fullName", text("Dana Reyes")).await;
    assert_eq!(next_id(&output), "workEmail");
    let output = submit(engine, &token, "workEmail", text("dana@acme-corp.com")).await;
    assert_eq!(next_id(&output), "companyName");
    let output = submit(engine, &token, "companyName", text("Acme Corp")).await;
    assert_eq!(next_id(&output), "companySize");
    token
}

// ─── Branching: company size override ────────────────────────────────────────

#[tokio::test]
async fn test_solo_answer_routes_to_small_business_concerns() {
    let engine = engine_with(None, EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    let output = submit(&engine, &token, "companySize", choice("Just me")).await;
    assert_eq!(next_id(&output), "smallBusinessConcerns");
}

#[tokio::test]
async fn test_enterprise_answer_routes_to_compliance() {
    let engine = engine_with(None, EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    let output = submit(&engine, &token, "companySize", choice("500+")).await;
    assert_eq!(next_id(&output), "hasComplianceTeam");
}

#[tokio::test]
async fn test_mid_size_answer_falls_through_linearly() {
    let engine = engine_with(None, EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    // No override for mid-size: skips both branch questions to industry.
    let output = submit(&engine, &token, "companySize", choice("11-50")).await;
    assert_eq!(next_id(&output), "industry");
}

// ─── Skip predicates: budget never shown to solo founders ────────────────────

#[tokio::test]
async fn test_solo_run_completes_without_budget() {
    let engine = engine_with(None, EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    let mut presented = Vec::new();
    let mut last_progress = 0u8;
    let steps = [
        ("companySize", choice("Just me")),
        ("smallBusinessConcerns", multi(&["Cash flow", "Finding customers"])),
        ("industry", choice("Consulting")),
        ("dataTypes", multi(&["Customer PII"])),
        ("goals", text("Land five retainer clients")),
        ("confirmation", AnswerValue::Bool(true)),
    ];

    let mut completed = None;
    for (id, value) in steps {
        let output = submit(&engine, &token, id, value).await;
        let progress = progress_of(&output);
        assert!(
            progress >= last_progress,
            "progress dropped from {last_progress} to {progress} after {id}"
        );
        last_progress = progress;
        match output {
            EngineOutput::Next { question, .. } => presented.push(question.id),
            EngineOutput::Complete { final_answers } => completed = Some(final_answers),
        }
    }

    assert!(
        !presented.iter().any(|id| id == "budget"),
        "budget must not be presented to a solo founder, got {presented:?}"
    );
    let answers = completed.expect("flow should complete");
    assert_eq!(answers.len(), 10);
    assert!(answers.contains_key("smallBusinessConcerns"));
    assert!(!answers.contains_key("budget"));
}

// ─── AI detour: follow-ups drain in order, then base flow resumes ────────────

#[tokio::test]
async fn test_followups_present_in_order_then_resume_base_flow() {
    let gateway = Arc::new(MockGateway::new().respond(
        "dataTypes",
        vec![
            followup_text("ai-depth", "Which of those is most sensitive?"),
            FollowupQuestion {
                id: "ai-volume".into(),
                kind: QuestionKind::SingleChoice,
                prompt: "Roughly how many records?".into(),
                options: vec!["Under 10k".into(), "10k-1M".into(), "Over 1M".into()],
                validation: None,
            },
        ],
    ));
    let engine = engine_with(Some(gateway.clone()), EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    let output = submit(&engine, &token, "companySize", choice("500+")).await;
    assert_eq!(next_id(&output), "hasComplianceTeam");
    let output = submit(&engine, &token, "hasComplianceTeam", AnswerValue::Bool(true)).await;
    assert_eq!(next_id(&output), "industry");
    let output = submit(&engine, &token, "industry", choice("Technology")).await;
    assert_eq!(next_id(&output), "dataTypes");
    let before_detour = progress_of(&output);

    // Answering dataTypes starts the detour with the first follow-up.
    let output = submit(&engine, &token, "dataTypes", multi(&["Health records"])).await;
    match &output {
        EngineOutput::Next { question, .. } => {
            assert_eq!(question.id, "ai-depth");
            assert!(question.ai_injected);
        }
        EngineOutput::Complete { .. } => panic!("expected the first follow-up"),
    }
    assert!(progress_of(&output) >= before_detour);

    // Second follow-up comes next, in returned order.
    let output = submit(&engine, &token, "ai-depth", text("Health records")).await;
    match &output {
        EngineOutput::Next { question, .. } => {
            assert_eq!(question.id, "ai-volume");
            assert!(question.ai_injected);
            assert_eq!(question.options.len(), 3);
        }
        EngineOutput::Complete { .. } => panic!("expected the second follow-up"),
    }

    // Drained: base flow resumes from dataTypes' successor, which for an
    // enterprise respondent is budget.
    let output = submit(&engine, &token, "ai-volume", choice("Over 1M")).await;
    match &output {
        EngineOutput::Next { question, .. } => {
            assert_eq!(question.id, "budget");
            assert!(!question.ai_injected);
        }
        EngineOutput::Complete { .. } => panic!("expected base flow to resume"),
    }

    // Only dataTypes was eligible so far, so exactly one gateway call.
    assert_eq!(gateway.call_count(), 1);

    // Follow-up answers are recorded alongside catalog ones.
    let resumed = engine.resume(&token).await.expect("resume");
    assert_eq!(next_id(&resumed), "budget");
}

#[tokio::test]
async fn test_no_nested_fetch_while_queue_drains() {
    // goals is AI-eligible too; give both questions scripted responses and
    // check each eligible answer triggers exactly one fetch.
    let gateway = Arc::new(
        MockGateway::new()
            .respond("dataTypes", vec![followup_text("ai-one", "Tell me more?")])
            .respond("goals", vec![followup_text("ai-two", "What would success look like?")]),
    );
    let engine = engine_with(Some(gateway.clone()), EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("11-50")).await;
    submit(&engine, &token, "industry", choice("Technology")).await;

    let output = submit(&engine, &token, "dataTypes", multi(&["Payment data"])).await;
    assert_eq!(next_id(&output), "ai-one");
    assert_eq!(gateway.call_count(), 1);

    // Answering the follow-up must not fetch again.
    let output = submit(&engine, &token, "ai-one", text("Mostly card tokens")).await;
    assert_eq!(next_id(&output), "budget");
    assert_eq!(gateway.call_count(), 1);

    submit(&engine, &token, "budget", choice("$10k-$50k")).await;
    let output = submit(&engine, &token, "goals", text("Cut onboarding time in half")).await;
    assert_eq!(next_id(&output), "ai-two");
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_resume_mid_detour_re_presents_the_active_followup() {
    let gateway = Arc::new(MockGateway::new().respond(
        "dataTypes",
        vec![
            followup_text("ai-scope", "Which system holds that data?"),
            followup_text("ai-access", "Who can access it today?"),
        ],
    ));
    let engine = engine_with(Some(gateway), EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("2-10")).await;
    submit(&engine, &token, "industry", choice("Finance")).await;
    let output = submit(&engine, &token, "dataTypes", multi(&["Payment data"])).await;
    assert_eq!(next_id(&output), "ai-scope");
    let presented = progress_of(&output);

    // A reload mid-detour must come back to the follow-up on screen, not
    // the catalog question underneath it.
    let resumed = engine.resume(&token).await.expect("resume");
    match &resumed {
        EngineOutput::Next { question, .. } => {
            assert_eq!(question.id, "ai-scope");
            assert!(question.ai_injected);
            assert_eq!(question.prompt, "Which system holds that data?");
        }
        EngineOutput::Complete { .. } => panic!("expected the active follow-up"),
    }
    assert_eq!(progress_of(&resumed), presented);

    // The drain picks up where it left off.
    let output = submit(&engine, &token, "ai-scope", text("Our payments platform")).await;
    assert_eq!(next_id(&output), "ai-access");
}

// ─── Degradation: flow survives a broken gateway ─────────────────────────────

#[tokio::test]
async fn test_gateway_failure_sets_sticky_fallback_and_flow_completes() {
    let gateway = Arc::new(MockGateway::new().fail("dataTypes").fail("goals"));
    let engine = engine_with(Some(gateway.clone()), EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("11-50")).await;
    submit(&engine, &token, "industry", choice("Technology")).await;

    // Failure is silent: the flow moves on and flags fallback mode.
    let output = submit(&engine, &token, "dataTypes", multi(&["Internal documents"])).await;
    assert_eq!(next_id(&output), "budget");
    assert!(fallback_of(&output));

    let output = submit(&engine, &token, "budget", choice("Under $1k")).await;
    assert!(fallback_of(&output), "fallback mode must stick for the session");

    let output = submit(&engine, &token, "goals", text("Standardize our stack")).await;
    assert_eq!(next_id(&output), "confirmation");

    let output = submit(&engine, &token, "confirmation", AnswerValue::Bool(true)).await;
    match output {
        EngineOutput::Complete { final_answers } => {
            assert_eq!(final_answers.len(), 10);
        }
        EngineOutput::Next { question, .. } => {
            panic!("flow should complete without AI, still at {}", question.id)
        }
    }
    // One failed call per eligible question; failures are not retried.
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_gateway_timeout_degrades_like_failure() {
    let gateway = Arc::new(MockGateway::new().hang("dataTypes"));
    let mut config = EngineConfig::default();
    config.ai.timeout_ms = 50;
    let engine = engine_with(Some(gateway), config);
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("2-10")).await;
    submit(&engine, &token, "industry", choice("Retail")).await;

    let output = submit(&engine, &token, "dataTypes", multi(&["Customer PII"])).await;
    assert_eq!(next_id(&output), "budget");
    assert!(fallback_of(&output));
}

#[tokio::test]
async fn test_configured_endpoint_is_wired_and_degrades_when_unreachable() {
    init_tracing();
    // Port 9 has no listener; a wired gateway fails the fetch instead of
    // the endpoint being parsed and then ignored.
    let config = EngineConfig::from_toml_str(
        r#"
        [ai]
        endpoint = "http://127.0.0.1:9"
        timeout_ms = 250
        "#,
    )
    .expect("config parses");
    let engine = QuestionnaireEngine::from_config(
        Arc::new(onboarding_catalog()),
        Arc::new(MemoryStore::new()),
        config,
    )
    .expect("engine from config");
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("2-10")).await;
    submit(&engine, &token, "industry", choice("Retail")).await;

    let output = submit(&engine, &token, "dataTypes", multi(&["Customer PII"])).await;
    assert_eq!(next_id(&output), "budget");
    assert!(
        fallback_of(&output),
        "a configured endpoint must reach the gateway, not vanish"
    );
}

// ─── Submission discipline ───────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_submission_is_rejected_without_mutation() {
    let engine = engine_with(None, EngineConfig::default());
    let (token, _) = engine.start().await.expect("start");

    let first = engine
        .submit_answer(
            &token,
            AnswerSubmission::new("greeting", AnswerValue::Bool(true)),
        )
        .await
        .expect("first submission");
    assert_eq!(next_id(&first), "fullName");

    // Network retry re-sends the same submission.
    let err = engine
        .submit_answer(
            &token,
            AnswerSubmission::new("greeting", AnswerValue::Bool(true)),
        )
        .await
        .unwrap_err();
    match err {
        EngineError::StaleSubmission { expected, got } => {
            assert_eq!(expected, "fullName");
            assert_eq!(got, "greeting");
        }
        other => panic!("expected StaleSubmission, got {other}"),
    }

    // Exactly one mutation happened: the session still awaits fullName.
    let resumed = engine.resume(&token).await.expect("resume");
    assert_eq!(next_id(&resumed), "fullName");
}

#[tokio::test]
async fn test_base_question_submission_is_stale_during_detour() {
    let gateway = Arc::new(
        MockGateway::new().respond("dataTypes", vec![followup_text("ai-one", "More detail?")]),
    );
    let engine = engine_with(Some(gateway), EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("2-10")).await;
    submit(&engine, &token, "industry", choice("Finance")).await;
    let output = submit(&engine, &token, "dataTypes", multi(&["Payment data"])).await;
    assert_eq!(next_id(&output), "ai-one");

    let err = engine
        .submit_answer(&token, AnswerSubmission::new("budget", choice("Under $1k")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::StaleSubmission { ref expected, .. } if expected == "ai-one"
    ));
}

#[tokio::test]
async fn test_invalid_email_leaves_progress_untouched() {
    let engine = engine_with(None, EngineConfig::default());
    let (token, _) = engine.start().await.expect("start");
    submit(&engine, &token, "greeting", AnswerValue::Bool(true)).await;
    let output = submit(&engine, &token, "fullName", text("Dana Reyes")).await;
    let before = progress_of(&output);

    let err = engine
        .submit_answer(
            &token,
            AnswerSubmission::new("workEmail", text("not-an-email")),
        )
        .await
        .unwrap_err();
    match err {
        EngineError::Validation {
            question_id, rule, ..
        } => {
            assert_eq!(question_id, "workEmail");
            assert_eq!(rule, "email");
        }
        other => panic!("expected Validation, got {other}"),
    }

    let resumed = engine.resume(&token).await.expect("resume");
    assert_eq!(next_id(&resumed), "workEmail");
    assert_eq!(progress_of(&resumed), before);
}

// ─── Session lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_expired_session_is_terminated_and_removed() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let engine = QuestionnaireEngine::new(
        Arc::new(onboarding_catalog()),
        store.clone(),
        EngineConfig::default(),
    );

    // Plant a session that expired before anyone came back to it.
    let session = Session::new("greeting", 10, chrono::Duration::seconds(-5));
    let token = session.token.clone();
    store.save(&session).await.expect("seed store");

    let err = engine
        .submit_answer(&token, AnswerSubmission::new("greeting", AnswerValue::Bool(true)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionTerminated(TerminationReason::Expired)
    ));

    // Lazy removal: the next touch sees nothing at all.
    let err = engine.resume(&token).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionTerminated(TerminationReason::NotFound)
    ));
}

#[tokio::test]
async fn test_completed_session_rejects_submissions_but_resumes_read_only() {
    let engine = engine_with(None, EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    for (id, value) in [
        ("companySize", choice("Just me")),
        ("smallBusinessConcerns", multi(&["Time management"])),
        ("industry", choice("E-commerce")),
        ("dataTypes", multi(&["Customer PII"])),
        ("goals", text("Automate fulfilment")),
        ("confirmation", AnswerValue::Bool(true)),
    ] {
        submit(&engine, &token, id, value).await;
    }

    let err = engine
        .submit_answer(
            &token,
            AnswerSubmission::new("confirmation", AnswerValue::Bool(true)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionTerminated(TerminationReason::Completed)
    ));

    match engine.resume(&token).await.expect("resume completed session") {
        EngineOutput::Complete { final_answers } => {
            assert_eq!(final_answers.len(), 10)
        }
        EngineOutput::Next { question, .. } => {
            panic!("completed session re-presented {}", question.id)
        }
    }
}

#[tokio::test]
async fn test_reset_discards_the_session() {
    let engine = engine_with(None, EngineConfig::default());
    let (token, _) = engine.start().await.expect("start");

    assert!(engine.reset(&token).await.expect("reset"));
    assert!(!engine.reset(&token).await.expect("second reset"));

    let err = engine.resume(&token).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionTerminated(TerminationReason::NotFound)
    ));
}

// ─── Personalization ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_goals_prompt_uses_the_given_name() {
    let engine = engine_with(None, EngineConfig::default());
    let token = advance_to_company_size(&engine).await;

    submit(&engine, &token, "companySize", choice("2-10")).await;
    submit(&engine, &token, "industry", choice("Technology")).await;
    submit(&engine, &token, "dataTypes", multi(&["Product telemetry"])).await;
    let output = submit(&engine, &token, "budget", choice("$1k-$10k")).await;

    match output {
        EngineOutput::Next { question, .. } => {
            assert_eq!(question.id, "goals");
            assert!(
                question.prompt.contains("Dana Reyes"),
                "prompt should be personalized, got {:?}",
                question.prompt
            );
        }
        EngineOutput::Complete { .. } => panic!("expected goals"),
    }
}
