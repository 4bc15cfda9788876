//! Attempt loop tests against a scripted transport

use super::{mapping, model};
use crate::core::catalog::ProviderModelMapping;
use crate::core::keys::{CredentialEnv, KeyPool, KeyState};
use crate::core::providers::{
    ProjectContext, ProviderError, ProviderId, RequestContextResolver, UpstreamRequest,
    UpstreamResponse, UpstreamTransport,
};
use crate::core::router::execute_impl::{ExecutionPlan, RequestExecutor};
use crate::core::router::execution::RetryPolicy;
use crate::core::router::selection::ProviderSelector;
use crate::core::types::{ChatMessage, ChatRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(u16, String),
    Network,
    Delayed(u64, u16, String),
    Hang,
}

#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<HashMap<ProviderId, VecDeque<Scripted>>>,
    sent: Mutex<Vec<(ProviderId, String)>>,
}

impl ScriptedTransport {
    fn with(self, provider: ProviderId, replies: Vec<Scripted>) -> Self {
        self.script.lock().insert(provider, replies.into());
        self
    }

    fn sent(&self) -> Vec<(ProviderId, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, ProviderError> {
        let auth = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.sent.lock().push((request.provider, auth));

        let next = self
            .script
            .lock()
            .get_mut(&request.provider)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Scripted::Reply(500, "unscripted".into()));

        let reply = |status, body: String| UpstreamResponse {
            status,
            body: body.into_bytes(),
            retry_after: None,
        };
        match next {
            Scripted::Reply(status, body) => Ok(reply(status, body)),
            Scripted::Network => Err(ProviderError::network(request.provider, "connection reset")),
            Scripted::Delayed(ms, status, body) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(reply(status, body))
            }
            Scripted::Hang => futures::future::pending().await,
        }
    }
}

fn ok_openai() -> Scripted {
    Scripted::Reply(
        200,
        r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":2}}"#.into(),
    )
}

fn env() -> CredentialEnv {
    CredentialEnv::from_pairs([
        ("LLM_OPENAI_API_KEY", "sk-1,sk-2"),
        ("LLM_GROQ_API_KEY", "gq-1"),
        ("LLM_MISTRAL_API_KEY", "ms-1"),
        ("LLM_GOOGLE_AI_STUDIO_API_KEY", "g-1"),
    ])
}

struct Harness {
    executor: RequestExecutor,
    transport: Arc<ScriptedTransport>,
    pool: Arc<KeyPool>,
    candidates: Vec<ProviderModelMapping>,
}

/// Candidates in ascending price: OpenAI, Groq, Mistral
fn harness(transport: ScriptedTransport, policy: RetryPolicy) -> Harness {
    harness_with(
        transport,
        policy,
        vec![
            mapping(ProviderId::OpenAI, dec!(0.000001)),
            mapping(ProviderId::Groq, dec!(0.000002)),
            mapping(ProviderId::Mistral, dec!(0.000003)),
        ],
    )
}

fn harness_with(
    transport: ScriptedTransport,
    policy: RetryPolicy,
    candidates: Vec<ProviderModelMapping>,
) -> Harness {
    let pool = Arc::new(KeyPool::default());
    let transport = Arc::new(transport);
    let resolver = RequestContextResolver::new(Arc::clone(&pool), Arc::new(env()));
    Harness {
        executor: RequestExecutor::new(resolver, transport.clone(), policy),
        transport,
        pool,
        candidates,
    }
}

impl Harness {
    async fn run(
        &self,
        no_fallback: bool,
        cancel: &CancellationToken,
    ) -> Result<crate::core::router::ExecutionOutcome, crate::core::router::ExecutionFailure> {
        let model = model(self.candidates.clone());
        let selection = ProviderSelector::deterministic()
            .select(&model, &self.candidates, None)
            .unwrap();
        let request = ChatRequest::new("test-model", vec![ChatMessage::user("hi")]);
        self.executor
            .execute(
                ExecutionPlan {
                    candidates: &self.candidates,
                    selection: &selection,
                    requested_provider: None,
                    no_fallback,
                },
                &request,
                &ProjectContext::default(),
                cancel,
            )
            .await
    }
}

#[tokio::test]
async fn test_first_attempt_success() {
    let h = harness(
        ScriptedTransport::default().with(ProviderId::OpenAI, vec![ok_openai()]),
        RetryPolicy::default(),
    );
    let outcome = h.run(false, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.payload.content, "hello");
    assert_eq!(outcome.mapping.provider_id, ProviderId::OpenAI);
    assert_eq!(outcome.attempts.len(), 1);
    assert!(outcome.attempts[0].succeeded());
    assert!(!outcome.client_cancelled);
}

#[tokio::test]
async fn test_retryable_failure_falls_back() {
    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::OpenAI, vec![Scripted::Reply(503, "overloaded".into())])
            .with(ProviderId::Groq, vec![ok_openai()]),
        RetryPolicy::default(),
    );
    let outcome = h.run(false, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.mapping.provider_id, ProviderId::Groq);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].status, 503);
    assert_eq!(outcome.attempts[1].provider, ProviderId::Groq);
    assert_eq!(h.pool.health_snapshot()[0].consecutive_errors, 1);
}

#[tokio::test]
async fn test_network_failure_falls_back() {
    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::OpenAI, vec![Scripted::Network])
            .with(ProviderId::Groq, vec![ok_openai()]),
        RetryPolicy::default(),
    );
    let outcome = h.run(false, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.attempts[0].status, 0);
    assert_eq!(outcome.mapping.provider_id, ProviderId::Groq);
}

#[tokio::test]
async fn test_client_error_is_terminal() {
    let h = harness(
        ScriptedTransport::default().with(
            ProviderId::OpenAI,
            vec![Scripted::Reply(400, r#"{"error":{"message":"bad messages"}}"#.into())],
        ),
        RetryPolicy::default(),
    );
    let failure = h.run(false, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(failure.attempts.len(), 1);
    match failure.error {
        ProviderError::ClientError { status, message, .. } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad messages");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_client_errors_leave_keys_healthy() {
    let bad = || Scripted::Reply(400, r#"{"error":{"message":"bad messages"}}"#.into());
    let h = harness(
        ScriptedTransport::default().with(ProviderId::OpenAI, (0..6).map(|_| bad()).collect()),
        RetryPolicy::default(),
    );
    for _ in 0..6 {
        let failure = h.run(false, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(failure.attempts.len(), 1);
    }

    assert_eq!(h.transport.sent().len(), 6);
    assert_eq!(h.pool.key_state("LLM_OPENAI_API_KEY", 0), KeyState::Healthy);
    assert_eq!(h.pool.key_state("LLM_OPENAI_API_KEY", 1), KeyState::Healthy);
    assert!(h.pool.health_snapshot().iter().all(|k| k.consecutive_errors == 0));
}

#[tokio::test]
async fn test_retries_bounded_and_last_error_surfaced() {
    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::OpenAI, vec![Scripted::Reply(500, "a".into())])
            .with(ProviderId::Groq, vec![Scripted::Reply(502, "b".into())])
            .with(ProviderId::Mistral, vec![Scripted::Reply(429, "c".into())]),
        RetryPolicy::default(),
    );
    let failure = h.run(false, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(failure.attempts.len(), 3);
    assert!(matches!(
        failure.error,
        ProviderError::RateLimited { provider: ProviderId::Mistral, .. }
    ));

    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::OpenAI, vec![Scripted::Reply(500, "a".into())])
            .with(ProviderId::Groq, vec![Scripted::Reply(502, "b".into())]),
        RetryPolicy::new(1),
    );
    let failure = h.run(false, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(failure.attempts.len(), 2);
    assert_eq!(failure.error.provider(), ProviderId::Groq);
}

#[tokio::test]
async fn test_no_fallback_makes_single_attempt() {
    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::OpenAI, vec![Scripted::Reply(503, "down".into())])
            .with(ProviderId::Groq, vec![ok_openai()]),
        RetryPolicy::default(),
    );
    let failure = h.run(true, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(failure.attempts.len(), 1);
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_unauthorized_key_rotates_within_provider() {
    let h = harness(
        ScriptedTransport::default().with(
            ProviderId::OpenAI,
            vec![Scripted::Reply(401, "invalid key".into()), ok_openai()],
        ),
        RetryPolicy::default(),
    );
    let outcome = h.run(false, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.mapping.provider_id, ProviderId::OpenAI);
    let sent = h.transport.sent();
    assert_eq!(sent[0].1, "Bearer sk-1");
    assert_eq!(sent[1].1, "Bearer sk-2");
    assert_eq!(h.pool.key_state("LLM_OPENAI_API_KEY", 0), KeyState::Blacklisted);

    // Blacklisted key is never chosen again
    for _ in 0..4 {
        let v = h
            .pool
            .get_round_robin_value("LLM_OPENAI_API_KEY", "sk-1,sk-2")
            .unwrap();
        assert_eq!(v.index, 1);
    }
}

#[tokio::test]
async fn test_unauthorized_single_key_moves_to_next_provider() {
    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::Groq, vec![Scripted::Reply(401, "nope".into())])
            .with(ProviderId::Mistral, vec![ok_openai()]),
        RetryPolicy::default(),
    );
    let h = Harness {
        candidates: vec![
            mapping(ProviderId::Groq, dec!(0.000001)),
            mapping(ProviderId::Mistral, dec!(0.000002)),
        ],
        ..h
    };
    let outcome = h.run(false, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.mapping.provider_id, ProviderId::Mistral);
    assert_eq!(h.pool.key_state("LLM_GROQ_API_KEY", 0), KeyState::Blacklisted);
}

#[tokio::test]
async fn test_missing_credentials_are_terminal() {
    let h = harness_with(
        ScriptedTransport::default().with(ProviderId::Groq, vec![ok_openai()]),
        RetryPolicy::default(),
        vec![
            mapping(ProviderId::DeepSeek, dec!(0.000001)),
            mapping(ProviderId::Groq, dec!(0.000002)),
        ],
    );
    let failure = h.run(false, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(failure.error, ProviderError::Configuration { .. }));
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_unparsable_success_body_is_retried() {
    let h = harness(
        ScriptedTransport::default()
            .with(ProviderId::OpenAI, vec![Scripted::Reply(200, "<html>".into())])
            .with(ProviderId::Groq, vec![ok_openai()]),
        RetryPolicy::default(),
    );
    let outcome = h.run(false, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.attempts[0].status, 502);
    assert_eq!(outcome.mapping.provider_id, ProviderId::Groq);
}

#[tokio::test]
async fn test_cancellation_aborts_cancellable_provider() {
    let h = harness(
        ScriptedTransport::default().with(ProviderId::OpenAI, vec![Scripted::Hang]),
        RetryPolicy::default(),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let failure = tokio::time::timeout(Duration::from_secs(5), h.run(false, &cancel))
        .await
        .expect("cancellation should end the attempt")
        .unwrap_err();
    assert!(matches!(failure.error, ProviderError::Cancelled { .. }));
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_non_cancellable_provider_runs_to_completion() {
    let google_ok = r#"{"candidates":[{"content":{"parts":[{"text":"done"}]},"finishReason":"STOP"}]}"#;
    let h = harness_with(
        ScriptedTransport::default().with(
            ProviderId::GoogleAiStudio,
            vec![Scripted::Delayed(50, 200, google_ok.into())],
        ),
        RetryPolicy::default(),
        vec![mapping(ProviderId::GoogleAiStudio, dec!(0.000001))],
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        trigger.cancel();
    });

    let outcome = h.run(false, &cancel).await.unwrap();
    assert_eq!(outcome.payload.content, "done");
    assert!(outcome.client_cancelled);
}
