//! End-to-end routing tests against mock upstreams
//!
//! Each test drives `RoutingCore::route` through selection, the attempt
//! loop, cost metering and request logging, with OpenAI and Groq served by
//! `wiremock`.

#[cfg(test)]
mod tests {
    use crate::common::fixtures::{
        FREE_MODEL, GROQ_TOKEN, OPENAI_TOKEN, TEST_MODEL, TestUpstreams, openai_completion,
    };
    use crate::{assert_err, assert_ok};
    use llmgateway_core::core::catalog::AllowedProviders;
    use llmgateway_core::core::cost::{Discount, DiscountSource, RetentionLevel};
    use llmgateway_core::core::json_healing::HealingMethod;
    use llmgateway_core::core::logging::UnifiedFinishReason;
    use llmgateway_core::core::metrics::{MetricsKey, MetricsSnapshot, ProviderMetrics};
    use llmgateway_core::core::providers::ProviderId;
    use llmgateway_core::core::router::{RouterError, SelectionReason};
    use llmgateway_core::core::types::{
        ChatMessage, ChatRequest, JsonSchemaFormat, ResponseFormat,
    };
    use llmgateway_core::GatewayCall;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn chat(model: &str) -> ChatRequest {
        ChatRequest::new(model, vec![ChatMessage::user("Hello there")])
    }

    async fn mount_ok(server: &wiremock::MockServer, token: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(openai_completion(content, "stop", 10, 5)),
            )
            .mount(server)
            .await;
    }

    async fn mount_status(server: &wiremock::MockServer, status: u16, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({"error": {"message": "upstream says no"}})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_routes_to_cheapest_provider_and_logs() {
        let upstreams = TestUpstreams::start().await;
        mount_ok(&upstreams.openai, OPENAI_TOKEN, "Hi!").await;
        mount_status(&upstreams.groq, 200, 0).await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.provider, ProviderId::OpenAI);
        assert_eq!(response.upstream_model, "upstream-chat");
        assert_eq!(response.content, "Hi!");
        assert_eq!(response.finish_reason, UnifiedFinishReason::Completed);
        assert_eq!(response.selection_reason, SelectionReason::PriceOnlyNoMetrics);
        assert_eq!(response.attempts.len(), 1);
        assert_eq!(response.usage.prompt_tokens, 10);
        assert_eq!(response.usage.completion_tokens, 5);
        assert!(!response.usage.estimated);

        let cost = response.cost.expect("priced");
        assert_eq!(cost.input_cost, dec!(0.00001));
        assert_eq!(cost.output_cost, dec!(0.00001));
        assert_eq!(cost.total_cost, dec!(0.00002));
        assert_eq!(response.discount.source, DiscountSource::None);

        core.shutdown().await;
        let entry = upstreams.logs.get(response.request_id).expect("log row");
        assert_eq!(entry.pending.requested_model, TEST_MODEL);
        let update = entry.update.expect("finalized");
        assert_eq!(update.status, 200);
        assert_eq!(update.used_provider, Some(ProviderId::OpenAI));
        assert_eq!(update.used_model.as_deref(), Some("upstream-chat"));
        assert_eq!(update.unified_finish_reason, UnifiedFinishReason::Completed);
        assert_eq!(update.raw_finish_reason.as_deref(), Some("stop"));
        assert_eq!(update.routing.attempts.len(), 1);
        assert_eq!(update.routing.scores.len(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_after_server_error() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 503, 1).await;
        mount_ok(&upstreams.groq, GROQ_TOKEN, "from groq").await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.provider, ProviderId::Groq);
        assert_eq!(response.content, "from groq");
        assert_eq!(response.attempts.len(), 2);
        assert_eq!(response.attempts[0].provider, ProviderId::OpenAI);
        assert_eq!(response.attempts[0].status, 503);
        assert!(response.attempts[1].succeeded());

        // Groq pricing: 10 * 0.000002 + 5 * 0.000004
        assert_eq!(response.cost.expect("priced").total_cost, dec!(0.00004));
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 400, 1).await;
        mount_status(&upstreams.groq, 200, 0).await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(upstreams.project());
        let failure = assert_err!(core.route(call).await);

        assert_eq!(failure.status_code(), 400);
        assert_eq!(failure.finish_reason, UnifiedFinishReason::ClientError);
        assert_eq!(failure.attempts.len(), 1);

        core.shutdown().await;
        let update = upstreams
            .logs
            .get(failure.request_id)
            .and_then(|e| e.update)
            .expect("finalized");
        assert_eq!(update.status, 400);
        assert_eq!(update.unified_finish_reason, UnifiedFinishReason::ClientError);
        assert!(update.error_message.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_providers_surface_last_error() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 502, 1).await;
        mount_status(&upstreams.groq, 503, 1).await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(upstreams.project());
        let failure = assert_err!(core.route(call).await);

        assert_eq!(failure.status_code(), 503);
        assert_eq!(failure.finish_reason, UnifiedFinishReason::UpstreamError);
        assert_eq!(failure.attempts.len(), 2);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_fallback_makes_single_attempt() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 503, 1).await;
        mount_status(&upstreams.groq, 200, 0).await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL))
            .with_project(upstreams.project())
            .no_fallback();
        let failure = assert_err!(core.route(call).await);

        assert_eq!(failure.status_code(), 503);
        assert_eq!(failure.attempts.len(), 1);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_allowed_providers_restrict_selection() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 200, 0).await;
        mount_ok(&upstreams.groq, GROQ_TOKEN, "allowed").await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL))
            .with_project(upstreams.project())
            .with_allowed(AllowedProviders::new([ProviderId::Groq]));
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.provider, ProviderId::Groq);
        assert_eq!(response.attempts.len(), 1);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_provider_prefix_pins_provider() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 200, 0).await;
        mount_ok(&upstreams.groq, GROQ_TOKEN, "pinned").await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat("groq/test-chat")).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.provider, ProviderId::Groq);
        assert_eq!(response.model_id, TEST_MODEL);
        assert_eq!(response.selection_reason, SelectionReason::Pinned);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_gateway_prefix_selects_automatically() {
        let upstreams = TestUpstreams::start().await;
        mount_ok(&upstreams.openai, OPENAI_TOKEN, "auto").await;
        mount_status(&upstreams.groq, 200, 0).await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat("llmgateway/test-chat")).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.provider, ProviderId::OpenAI);
        assert_eq!(response.model_id, TEST_MODEL);
        assert_eq!(response.selection_reason, SelectionReason::PriceOnlyNoMetrics);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_model_is_client_error() {
        let upstreams = TestUpstreams::start().await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat("no-such-model")).with_project(upstreams.project());
        let failure = assert_err!(core.route(call).await);

        assert!(matches!(failure.error, RouterError::ModelNotFound(_)));
        assert_eq!(failure.status_code(), 404);
        assert_eq!(failure.finish_reason, UnifiedFinishReason::ClientError);

        core.shutdown().await;
        let entry = upstreams.logs.get(failure.request_id).expect("log row");
        assert_eq!(entry.pending.requested_model, "no-such-model");
        assert_eq!(entry.update.expect("finalized").status, 404);
    }

    #[tokio::test]
    async fn test_missing_organization_key_is_gateway_error() {
        let upstreams = TestUpstreams::start().await;
        let core = upstreams.core();

        // Bring-your-own-keys project without any key
        let project = llmgateway_core::core::providers::ProjectContext::new(
            llmgateway_core::core::providers::ProjectMode::ApiKeys,
        );
        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(project);
        let failure = assert_err!(core.route(call).await);

        assert_eq!(failure.finish_reason, UnifiedFinishReason::GatewayError);
        assert_eq!(failure.status_code(), 500);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_organization_discount_applies() {
        let upstreams = TestUpstreams::start().await;
        upstreams.discounts.insert(Discount::global(dec!(0.1)));
        upstreams
            .discounts
            .insert(Discount::for_organization("org-1", dec!(0.2)).with_provider(ProviderId::OpenAI));
        mount_ok(&upstreams.openai, OPENAI_TOKEN, "discounted").await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL))
            .with_project(upstreams.project())
            .with_organization("org-1");
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.discount.discount, dec!(0.2));
        assert_eq!(response.discount.source, DiscountSource::OrganizationProvider);
        let cost = response.cost.expect("priced");
        assert_eq!(cost.discount, dec!(0.2));
        assert_eq!(cost.total_cost, dec!(0.000016));

        core.shutdown().await;
        let update = upstreams
            .logs
            .get(response.request_id)
            .and_then(|e| e.update)
            .expect("finalized");
        assert_eq!(update.discount_source, Some(DiscountSource::OrganizationProvider));
    }

    #[tokio::test]
    async fn test_free_model_costs_nothing() {
        let upstreams = TestUpstreams::start().await;
        mount_ok(&upstreams.openai, OPENAI_TOKEN, "free").await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(FREE_MODEL))
            .with_project(upstreams.project())
            .with_retention(RetentionLevel::None);
        let response = assert_ok!(core.route(call).await);

        let cost = response.cost.expect("priced");
        assert!(cost.total_cost.is_zero());
        assert!(cost.data_storage_cost.is_zero());
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_json_response_is_healed_and_validated() {
        let upstreams = TestUpstreams::start().await;
        let broken = "Here you go:\n```json\n{\"name\": \"Ada\", \"tags\": [\"x\",],}\n```";
        mount_ok(&upstreams.openai, OPENAI_TOKEN, broken).await;
        let core = upstreams.core();

        let mut request = chat(TEST_MODEL);
        request.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: "person".to_string(),
                schema: json!({
                    "type": "object",
                    "required": ["name", "age"],
                    "properties": {
                        "name": {"type": "string"},
                        "tags": {"type": "array", "items": {"type": "string"}}
                    }
                }),
                strict: None,
            },
        });
        let call = GatewayCall::new(request).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        let parsed: serde_json::Value = serde_json::from_str(&response.content).expect("valid JSON");
        assert_eq!(parsed, json!({"name": "Ada", "tags": ["x"]}));

        let healing = response.healing.expect("healing ran");
        assert!(healing.healed);
        assert_eq!(healing.method, Some(HealingMethod::SyntaxFix));

        let validation = response.schema_validation.expect("schema checked");
        assert!(!validation.valid);
        assert_eq!(validation.errors.len(), 1);

        core.shutdown().await;
        let update = upstreams
            .logs
            .get(response.request_id)
            .and_then(|e| e.update)
            .expect("finalized");
        assert!(update.healed);
        assert_eq!(update.healing_method, Some(HealingMethod::SyntaxFix));
    }

    #[tokio::test]
    async fn test_plain_text_is_not_healed() {
        let upstreams = TestUpstreams::start().await;
        mount_ok(&upstreams.openai, OPENAI_TOKEN, "{not json").await;
        let core = upstreams.core();

        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.content, "{not json");
        assert!(response.healing.is_none());
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_metrics_outweigh_price() {
        let upstreams = TestUpstreams::start().await;
        mount_status(&upstreams.openai, 200, 0).await;
        mount_ok(&upstreams.groq, GROQ_TOKEN, "fast").await;

        let mut snapshot = MetricsSnapshot::new();
        snapshot.insert(
            MetricsKey::new(TEST_MODEL, ProviderId::OpenAI),
            ProviderMetrics {
                uptime: 40.0,
                average_latency_ms: 4000.0,
                throughput: 10.0,
                total_requests: 500,
            },
        );
        snapshot.insert(
            MetricsKey::new(TEST_MODEL, ProviderId::Groq),
            ProviderMetrics {
                uptime: 99.9,
                average_latency_ms: 200.0,
                throughput: 300.0,
                total_requests: 500,
            },
        );
        let core = upstreams.core_with_metrics(snapshot);

        let call = GatewayCall::new(chat(TEST_MODEL)).with_project(upstreams.project());
        let response = assert_ok!(core.route(call).await);

        assert_eq!(response.provider, ProviderId::Groq);
        assert_eq!(response.selection_reason, SelectionReason::WeightedScore);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_dry_run_selection() {
        let upstreams = TestUpstreams::start().await;
        let core = upstreams.core();

        let selection = assert_ok!(core.select(TEST_MODEL, None).await);
        assert_eq!(selection.selected.provider_id, ProviderId::OpenAI);
        assert_eq!(selection.scores.len(), 2);

        let allowed = AllowedProviders::new([ProviderId::Anthropic]);
        let err = assert_err!(core.select(TEST_MODEL, Some(&allowed)).await);
        assert!(matches!(err, RouterError::NoEligibleProviders(_)));
        core.shutdown().await;
    }
}
