//! Test fixtures and factories
//!
//! Everything here builds real objects; upstream providers are `wiremock`
//! servers reached through organization keys with a base URL override.

use std::sync::Arc;

use llmgateway_core::Config;
use llmgateway_core::core::catalog::{Catalog, ModelDefinition, ProviderModelMapping};
use llmgateway_core::core::cost::{DiscountStore, InMemoryDiscountStore};
use llmgateway_core::core::keys::CredentialEnv;
use llmgateway_core::core::logging::InMemoryLogSink;
use llmgateway_core::core::providers::{OrganizationKey, ProjectContext, ProjectMode, ProviderId};
use llmgateway_core::core::router::ProviderSelector;
use llmgateway_core::core::metrics::{InMemoryMetricsStore, MetricsSnapshot};
use llmgateway_core::core::{RoutingCore, RoutingCoreBuilder};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use wiremock::MockServer;

/// Catalog model served by both mock upstreams
pub const TEST_MODEL: &str = "test-chat";
/// Free catalog model served by OpenAI only
pub const FREE_MODEL: &str = "test-free";

pub const OPENAI_TOKEN: &str = "org-openai";
pub const GROQ_TOKEN: &str = "org-groq";

/// Two-provider catalog: OpenAI is the cheaper mapping of `test-chat`
pub fn test_catalog() -> Catalog {
    Catalog::new(vec![
        ModelDefinition::new(TEST_MODEL, "test")
            .with_provider(ProviderModelMapping::new(
                ProviderId::OpenAI,
                "upstream-chat",
                dec!(0.000001),
                dec!(0.000002),
            ))
            .with_provider(ProviderModelMapping::new(
                ProviderId::Groq,
                "groq-chat",
                dec!(0.000002),
                dec!(0.000004),
            )),
        ModelDefinition::new(FREE_MODEL, "test").free().with_provider(
            ProviderModelMapping::new(ProviderId::OpenAI, "upstream-free", dec!(0), dec!(0)),
        ),
    ])
}

/// Defaults with exploration disabled and a short upstream timeout
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.router.exploration_rate = 0.0;
    config.router.upstream_timeout_secs = 5;
    config
}

/// OpenAI chat completion body
pub fn openai_completion(content: &str, finish_reason: &str, prompt: u32, completion: u32) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason
        }],
        "usage": {
            "prompt_tokens": prompt,
            "completion_tokens": completion,
            "total_tokens": prompt + completion
        }
    })
}

/// Mock OpenAI and Groq upstreams plus the stores a routing core writes to
pub struct TestUpstreams {
    pub openai: MockServer,
    pub groq: MockServer,
    pub logs: Arc<InMemoryLogSink>,
    pub discounts: Arc<InMemoryDiscountStore>,
}

impl TestUpstreams {
    pub async fn start() -> Self {
        Self {
            openai: MockServer::start().await,
            groq: MockServer::start().await,
            logs: Arc::new(InMemoryLogSink::new()),
            discounts: Arc::new(InMemoryDiscountStore::default()),
        }
    }

    /// Bring-your-own-keys project pointing both providers at the mocks
    pub fn project(&self) -> ProjectContext {
        ProjectContext::new(ProjectMode::ApiKeys)
            .with_key(OrganizationKey::new(ProviderId::OpenAI, OPENAI_TOKEN).with_base_url(self.openai.uri()))
            .with_key(OrganizationKey::new(ProviderId::Groq, GROQ_TOKEN).with_base_url(self.groq.uri()))
    }

    pub fn core(&self) -> RoutingCore {
        self.core_with(test_config())
    }

    /// Routing core that reads selection metrics from `snapshot`
    pub fn core_with_metrics(&self, snapshot: MetricsSnapshot) -> RoutingCore {
        let config = test_config();
        let store = InMemoryMetricsStore::with_snapshot(config.router.metrics_window_minutes, snapshot);
        self.builder(config)
            .metrics_store(Arc::new(store))
            .build()
            .expect("routing core should build")
    }

    pub fn core_with(&self, config: Config) -> RoutingCore {
        self.builder(config)
            .build()
            .expect("routing core should build")
    }

    fn builder(&self, config: Config) -> RoutingCoreBuilder {
        RoutingCore::builder(config)
            .catalog(test_catalog())
            .credentials(CredentialEnv::new())
            .selector(ProviderSelector::deterministic())
            .log_sink(self.logs.clone())
            .discount_store(self.discounts.clone() as Arc<dyn DiscountStore>)
    }
}
