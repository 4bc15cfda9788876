//! Routing core facade
//!
//! Wires the catalog, metrics, selection, key pool, attempt loop, cost
//! metering and request logging into one `route` call per inbound request.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::catalog::{AllowedProviders, Catalog, ModelDefinition, ProviderModelMapping};
use crate::core::cost::{
    CachedDiscountStore, CostBreakdown, CostCalculator, DiscountResolver, DiscountStore,
    DiscountTarget, EffectiveDiscount, InMemoryDiscountStore, RetentionLevel, TokenUsage,
    resolve_usage,
};
use crate::core::json_healing::{
    HealingResult, SchemaValidation, heal_json_response, validate_json_schema,
};
use crate::core::keys::{CredentialEnv, KeyHealthConfig, KeyPool};
use crate::core::logging::{
    InMemoryLogSink, LogSink, LogUpdate, LogWriter, PendingLog, RoutingMetadata,
    UnifiedFinishReason, unify_finish_reason,
};
use crate::core::metrics::{InMemoryMetricsStore, MetricsKey, ProviderMetricsStore};
use crate::core::providers::{
    ProjectContext, ProviderId, ReqwestTransport, RequestContextResolver, UpstreamTransport,
};
use crate::core::router::{
    AttemptRecord, ExecutionFailure, ExecutionOutcome, ExecutionPlan, ProviderSelection,
    ProviderSelector, RequestExecutor, RetryPolicy, RouterError, SelectionConfig,
    SelectionReason,
};
use crate::core::types::ChatRequest;
use crate::utils::error::Result;
use crate::utils::truncate_string;

/// Longest error message stored on a log row
const MAX_LOGGED_ERROR_CHARS: usize = 2000;

/// One inbound request with its caller context
#[derive(Debug, Clone)]
pub struct GatewayCall {
    pub request: ChatRequest,
    pub project: ProjectContext,
    /// Providers the caller's IAM rules permit; `None` permits all
    pub allowed: Option<AllowedProviders>,
    pub organization_id: Option<String>,
    pub retention: RetentionLevel,
    pub no_fallback: bool,
    /// Fires when the client disconnects
    pub cancel: CancellationToken,
}

impl GatewayCall {
    pub fn new(request: ChatRequest) -> Self {
        Self {
            request,
            project: ProjectContext::default(),
            allowed: None,
            organization_id: None,
            retention: RetentionLevel::default(),
            no_fallback: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_project(mut self, project: ProjectContext) -> Self {
        self.project = project;
        self
    }

    pub fn with_allowed(mut self, allowed: AllowedProviders) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_retention(mut self, retention: RetentionLevel) -> Self {
        self.retention = retention;
        self
    }

    pub fn no_fallback(mut self) -> Self {
        self.no_fallback = true;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Successful outcome of [`RoutingCore::route`]
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub request_id: Uuid,
    /// Response text, healed when the request asked for JSON
    pub content: String,
    pub model_id: String,
    pub provider: ProviderId,
    pub upstream_model: String,
    pub finish_reason: UnifiedFinishReason,
    pub raw_finish_reason: Option<String>,
    pub usage: TokenUsage,
    /// `None` when the catalog data could not be priced
    pub cost: Option<CostBreakdown>,
    pub discount: EffectiveDiscount,
    pub healing: Option<HealingResult>,
    pub schema_validation: Option<SchemaValidation>,
    pub selection_reason: SelectionReason,
    pub attempts: Vec<AttemptRecord>,
    pub streamed: bool,
    pub client_cancelled: bool,
    pub duration: Duration,
}

/// Failed outcome of [`RoutingCore::route`]
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct RouteFailure {
    pub request_id: Uuid,
    pub error: RouterError,
    pub finish_reason: UnifiedFinishReason,
    pub attempts: Vec<AttemptRecord>,
}

impl RouteFailure {
    pub fn status_code(&self) -> u16 {
        self.error.status_code()
    }
}

/// Builder for [`RoutingCore`]; every component has an in-process default
pub struct RoutingCoreBuilder {
    config: Config,
    catalog: Option<Arc<Catalog>>,
    metrics: Option<Arc<dyn ProviderMetricsStore>>,
    discounts: Option<Arc<dyn DiscountStore>>,
    log_sink: Option<Arc<dyn LogSink>>,
    transport: Option<Arc<dyn UpstreamTransport>>,
    credentials: Option<CredentialEnv>,
    selector: Option<ProviderSelector>,
}

impl RoutingCoreBuilder {
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    pub fn metrics_store(mut self, store: Arc<dyn ProviderMetricsStore>) -> Self {
        self.metrics = Some(store);
        self
    }

    /// Backing discount store; wrapped in the TTL cache on build
    pub fn discount_store(mut self, store: Arc<dyn DiscountStore>) -> Self {
        self.discounts = Some(store);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn UpstreamTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credentials(mut self, env: CredentialEnv) -> Self {
        self.credentials = Some(env);
        self
    }

    pub fn selector(mut self, selector: ProviderSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Must run inside a tokio runtime: spawns the log update worker
    pub fn build(self) -> Result<RoutingCore> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn UpstreamTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(Duration::from_secs(
                config.router.upstream_timeout_secs,
            ))?),
        };
        let pool = Arc::new(KeyPool::new(KeyHealthConfig::from(&config.keys)));
        let env = Arc::new(self.credentials.unwrap_or_else(CredentialEnv::from_process_env));
        let resolver = RequestContextResolver::new(Arc::clone(&pool), env);
        let executor =
            RequestExecutor::new(resolver, transport, RetryPolicy::from(&config.router));

        let discount_store = self
            .discounts
            .unwrap_or_else(|| Arc::new(InMemoryDiscountStore::default()) as Arc<dyn DiscountStore>);
        let discounts = DiscountResolver::new(Arc::new(CachedDiscountStore::new(
            discount_store,
            &config.cost,
        )));

        let sink = self
            .log_sink
            .unwrap_or_else(|| Arc::new(InMemoryLogSink::new()) as Arc<dyn LogSink>);
        let logs = Arc::new(LogWriter::new(sink, &config.log_queue));

        let selector = self
            .selector
            .unwrap_or_else(|| ProviderSelector::new(SelectionConfig::from(&config.router)));

        info!(
            max_retries = config.router.max_retries,
            exploration_rate = config.router.exploration_rate,
            "routing core initialized"
        );

        Ok(RoutingCore {
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(Catalog::builtin().clone())),
            metrics: self.metrics.unwrap_or_else(|| {
                Arc::new(InMemoryMetricsStore::new(config.router.metrics_window_minutes))
                    as Arc<dyn ProviderMetricsStore>
            }),
            selector: Arc::new(selector),
            pool,
            executor,
            discounts,
            calculator: CostCalculator::new(&config.cost),
            logs,
            config: Arc::new(config),
        })
    }
}

/// Request routing and resilience core
#[derive(Clone)]
pub struct RoutingCore {
    config: Arc<Config>,
    catalog: Arc<Catalog>,
    metrics: Arc<dyn ProviderMetricsStore>,
    selector: Arc<ProviderSelector>,
    pool: Arc<KeyPool>,
    executor: RequestExecutor,
    discounts: DiscountResolver,
    calculator: CostCalculator,
    logs: Arc<LogWriter>,
}

impl std::fmt::Debug for RoutingCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingCore")
            .field("models", &self.catalog.models().len())
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

/// Candidates and selection for one request
struct Routing<'a> {
    model: &'a ModelDefinition,
    pinned: Option<ProviderId>,
    candidates: Vec<ProviderModelMapping>,
    selection: ProviderSelection,
}

impl RoutingCore {
    pub fn builder(config: Config) -> RoutingCoreBuilder {
        RoutingCoreBuilder {
            config,
            catalog: None,
            metrics: None,
            discounts: None,
            log_sink: None,
            transport: None,
            credentials: None,
            selector: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn key_pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub fn log_writer(&self) -> &Arc<LogWriter> {
        &self.logs
    }

    /// Dry-run provider selection for a model string
    pub async fn select(
        &self,
        model: &str,
        allowed: Option<&AllowedProviders>,
    ) -> std::result::Result<ProviderSelection, RouterError> {
        self.plan(model, allowed).await.map(|r| r.selection)
    }

    async fn plan(
        &self,
        requested: &str,
        allowed: Option<&AllowedProviders>,
    ) -> std::result::Result<Routing<'_>, RouterError> {
        let (model, pinned) = self
            .catalog
            .resolve(requested)
            .ok_or_else(|| RouterError::ModelNotFound(requested.to_string()))?;

        let candidates = self.catalog.candidates(model, allowed);
        if candidates.is_empty() {
            return Err(RouterError::NoEligibleProviders(model.id.clone()));
        }

        let selection = match pinned {
            Some(provider) => self.selector.select_pinned(model, &candidates, provider),
            None => {
                let pairs: Vec<MetricsKey> = candidates
                    .iter()
                    .map(|m| MetricsKey::new(model.id.clone(), m.provider_id))
                    .collect();
                let metrics = match self
                    .metrics
                    .get_provider_metrics_for_combinations(
                        &pairs,
                        self.config.router.metrics_window_minutes,
                    )
                    .await
                {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!(model = %model.id, error = %e, "provider metrics unavailable, selecting by price");
                        None
                    }
                };
                self.selector.select(model, &candidates, metrics.as_ref())
            }
        }
        .ok_or_else(|| RouterError::NoEligibleProviders(model.id.clone()))?;

        Ok(Routing {
            model,
            pinned,
            candidates,
            selection,
        })
    }

    /// Route one request end to end
    ///
    /// A pending log row is written before anything else; the outcome is
    /// queued for the log worker whether the request succeeds or fails.
    pub async fn route(&self, call: GatewayCall) -> std::result::Result<RoutedResponse, RouteFailure> {
        let mut pending = PendingLog::new(call.request.model.clone());
        pending.organization_id = call.organization_id.clone();
        pending.streamed = call.request.stream;
        let request_id = pending.request_id;
        if let Err(e) = self.logs.create_pending(&pending).await {
            warn!(request_id = %request_id, error = %e, "failed to write pending log");
        }

        let routing = match self.plan(&call.request.model, call.allowed.as_ref()).await {
            Ok(routing) => routing,
            Err(error) => {
                let reason = match error {
                    RouterError::ModelNotFound(_) => UnifiedFinishReason::ClientError,
                    _ => UnifiedFinishReason::GatewayError,
                };
                let mut update = LogUpdate::new(request_id, reason, error.status_code());
                update.error_message = Some(truncate_string(&error.to_string(), MAX_LOGGED_ERROR_CHARS));
                self.enqueue(update);
                return Err(RouteFailure {
                    request_id,
                    error,
                    finish_reason: reason,
                    attempts: Vec::new(),
                });
            }
        };

        let plan = ExecutionPlan {
            candidates: &routing.candidates,
            selection: &routing.selection,
            requested_provider: routing.pinned,
            no_fallback: call.no_fallback,
        };

        match self
            .executor
            .execute(plan, &call.request, &call.project, &call.cancel)
            .await
        {
            Ok(outcome) => Ok(self.complete(request_id, &call, &routing, outcome).await),
            Err(failure) => Err(self.fail(request_id, &routing, failure)),
        }
    }

    async fn complete(
        &self,
        request_id: Uuid,
        call: &GatewayCall,
        routing: &Routing<'_>,
        outcome: ExecutionOutcome,
    ) -> RoutedResponse {
        let ExecutionOutcome {
            payload,
            mapping,
            attempts,
            streamed,
            client_cancelled,
            duration,
            ..
        } = outcome;
        let provider = mapping.provider_id;

        let (content, healing, schema_validation) = if call.request.expects_json() {
            let healing = heal_json_response(&payload.content);
            let validation = call.request.response_format.as_ref().and_then(|f| {
                let schema = f.schema()?;
                let value = serde_json::from_str(&healing.content).ok()?;
                Some(validate_json_schema(&value, schema))
            });
            (healing.content.clone(), Some(healing), validation)
        } else {
            (payload.content, None, None)
        };

        let usage = resolve_usage(payload.usage, &call.request.messages, &content);

        let discount = self
            .discounts
            .get_effective_discount(DiscountTarget {
                organization_id: call.organization_id.as_deref(),
                provider,
                model_id: &routing.model.id,
                upstream_model: &mapping.model_name,
                catalog_discount: mapping.discount,
            })
            .await;

        let cost = self.price(routing.model, &mapping, &usage, discount.discount, call.retention);

        let finish_reason = if client_cancelled {
            UnifiedFinishReason::Canceled
        } else {
            unify_finish_reason(provider, payload.raw_finish_reason.as_deref(), 200)
        };

        let mut update = LogUpdate::new(request_id, finish_reason, 200);
        update.used_model = Some(mapping.model_name.clone());
        update.used_provider = Some(provider);
        update.raw_finish_reason = payload.raw_finish_reason.clone();
        update.usage = Some(usage);
        update.cost = cost.clone();
        update.discount_source = Some(discount.source);
        update.healed = healing.as_ref().is_some_and(|h| h.healed);
        update.healing_method = healing.as_ref().and_then(|h| h.method);
        update.streamed = streamed;
        update.canceled = client_cancelled;
        update.duration_ms = duration.as_millis() as u64;
        update.routing = RoutingMetadata {
            selection_reason: Some(routing.selection.reason),
            scores: routing.selection.scores.clone(),
            attempts: attempts.clone(),
        };
        self.enqueue(update);

        info!(
            request_id = %request_id,
            model = %routing.model.id,
            provider = %provider,
            attempts = attempts.len(),
            finish_reason = %finish_reason,
            "request routed"
        );

        RoutedResponse {
            request_id,
            content,
            model_id: routing.model.id.clone(),
            provider,
            upstream_model: mapping.model_name,
            finish_reason,
            raw_finish_reason: payload.raw_finish_reason,
            usage,
            cost,
            discount,
            healing,
            schema_validation,
            selection_reason: routing.selection.reason,
            attempts,
            streamed,
            client_cancelled,
            duration,
        }
    }

    /// Cost with the resolved discount; an out-of-range discount row is
    /// ignored rather than dropping the charge
    fn price(
        &self,
        model: &ModelDefinition,
        mapping: &ProviderModelMapping,
        usage: &TokenUsage,
        discount: Decimal,
        retention: RetentionLevel,
    ) -> Option<CostBreakdown> {
        match self.calculator.calculate(model, mapping, usage, discount, retention) {
            Ok(cost) => Some(cost),
            Err(e) => {
                warn!(model = %model.id, provider = %mapping.provider_id, error = %e, "cost calculation failed");
                if discount.is_zero() {
                    return None;
                }
                self.calculator
                    .calculate(model, mapping, usage, Decimal::ZERO, retention)
                    .ok()
            }
        }
    }

    fn fail(&self, request_id: Uuid, routing: &Routing<'_>, failure: ExecutionFailure) -> RouteFailure {
        let ExecutionFailure {
            error,
            attempts,
            duration,
        } = failure;
        let last = attempts.last();
        let finish_reason = UnifiedFinishReason::from_error(&error, last.and_then(|a| a.token_source));

        let mut update = LogUpdate::new(request_id, finish_reason, error.status());
        update.used_model = last.map(|a| a.model.clone());
        update.used_provider = Some(error.provider());
        update.canceled = finish_reason == UnifiedFinishReason::Canceled;
        update.error_message = Some(truncate_string(&error.to_string(), MAX_LOGGED_ERROR_CHARS));
        update.duration_ms = duration.as_millis() as u64;
        update.routing = RoutingMetadata {
            selection_reason: Some(routing.selection.reason),
            scores: routing.selection.scores.clone(),
            attempts: attempts.clone(),
        };
        self.enqueue(update);

        RouteFailure {
            request_id,
            error: RouterError::Provider(error),
            finish_reason,
            attempts,
        }
    }

    fn enqueue(&self, update: LogUpdate) {
        let request_id = update.request_id;
        if let Err(e) = self.logs.finalize(update) {
            warn!(request_id = %request_id, error = %e, "log update not queued");
        }
    }

    /// Flush queued log updates and stop the log worker
    pub async fn shutdown(&self) {
        self.logs.shutdown().await;
    }
}
