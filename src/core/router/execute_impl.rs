//! Attempt loop
//!
//! One upstream attempt in flight at a time. Each attempt resolves a fresh
//! request context, so a retry gets a new credential, URL and parameter set.

use super::execution::RetryPolicy;
use super::fallback::{RetryContext, select_next_provider};
use super::selection::ProviderSelection;
use crate::core::catalog::ProviderModelMapping;
use crate::core::providers::body::extract_from_bytes;
use crate::core::providers::{
    CompletionPayload, ErrorType, ProjectContext, ProviderError, ProviderId,
    RequestContextResolver, TokenSource, UpstreamRequest, UpstreamTransport,
};
use crate::core::types::ChatRequest;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Routing metadata of one upstream attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: ProviderId,
    pub model: String,
    /// HTTP status; 0 when no response arrived
    pub status: u16,
    pub error_type: Option<ErrorType>,
    pub duration_ms: u64,
    pub token_source: Option<TokenSource>,
    pub key_index: Option<usize>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.error_type.is_none() && (200..300).contains(&self.status)
    }
}

/// Successful execution
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub payload: CompletionPayload,
    pub mapping: ProviderModelMapping,
    pub token_source: TokenSource,
    pub attempts: Vec<AttemptRecord>,
    pub streamed: bool,
    /// The client went away while a non-cancellable provider finished
    pub client_cancelled: bool,
    pub duration: Duration,
}

/// Failed execution: the last upstream error, unchanged
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    pub error: ProviderError,
    pub attempts: Vec<AttemptRecord>,
    pub duration: Duration,
}

/// Inputs of one logical request
#[derive(Debug, Clone, Copy)]
pub struct ExecutionPlan<'a> {
    /// IAM-filtered mappings of the requested model
    pub candidates: &'a [ProviderModelMapping],
    pub selection: &'a ProviderSelection,
    pub requested_provider: Option<ProviderId>,
    pub no_fallback: bool,
}

enum Step {
    Retry(ProviderModelMapping),
    Stop,
}

/// Runs the attempt loop for one request
#[derive(Clone)]
pub struct RequestExecutor {
    resolver: RequestContextResolver,
    transport: Arc<dyn UpstreamTransport>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("resolver", &self.resolver)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(
        resolver: RequestContextResolver,
        transport: Arc<dyn UpstreamTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            transport,
            policy,
        }
    }

    pub fn resolver(&self) -> &RequestContextResolver {
        &self.resolver
    }

    pub async fn execute(
        &self,
        plan: ExecutionPlan<'_>,
        request: &ChatRequest,
        project: &ProjectContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        let started = Instant::now();
        let mut ctx = RetryContext::new(
            plan.requested_provider,
            plan.no_fallback,
            plan.selection.scores.len(),
        );
        let mut current = plan.selection.selected.clone();
        let mut attempts = Vec::new();

        loop {
            let provider = current.provider_id;
            if cancel.is_cancelled() {
                return Err(ExecutionFailure {
                    error: ProviderError::Cancelled { provider },
                    attempts,
                    duration: started.elapsed(),
                });
            }

            let attempt_started = Instant::now();
            let upstream = match self
                .resolver
                .resolve_request_context(&current, request, project)
            {
                Ok(upstream) => upstream,
                Err(error) => {
                    // Misconfiguration is terminal
                    warn!(provider = %provider, error = %error, "failed to resolve request context");
                    attempts.push(AttemptRecord {
                        provider,
                        model: current.model_name.clone(),
                        status: error.status(),
                        error_type: Some(error.error_type()),
                        duration_ms: 0,
                        token_source: None,
                        key_index: None,
                    });
                    return Err(ExecutionFailure {
                        error,
                        attempts,
                        duration: started.elapsed(),
                    });
                }
            };

            let result = self.dispatch(&upstream, cancel).await;
            let duration_ms = attempt_started.elapsed().as_millis() as u64;

            let error = match result {
                Ok(payload) => {
                    if let Some((env_var, index)) = upstream.pool_key() {
                        self.resolver.pool().report_key_success(env_var, index);
                    }
                    attempts.push(AttemptRecord {
                        provider,
                        model: upstream.model.clone(),
                        status: 200,
                        error_type: None,
                        duration_ms,
                        token_source: Some(upstream.token_source),
                        key_index: Some(upstream.key_index),
                    });
                    info!(
                        provider = %provider,
                        model = %upstream.model,
                        attempts = attempts.len(),
                        "upstream request succeeded"
                    );
                    return Ok(ExecutionOutcome {
                        payload,
                        mapping: current,
                        token_source: upstream.token_source,
                        attempts,
                        streamed: upstream.streamed,
                        client_cancelled: cancel.is_cancelled(),
                        duration: started.elapsed(),
                    });
                }
                Err(error) => error,
            };

            attempts.push(AttemptRecord {
                provider,
                model: upstream.model.clone(),
                status: error.status(),
                error_type: Some(error.error_type()),
                duration_ms,
                token_source: Some(upstream.token_source),
                key_index: Some(upstream.key_index),
            });

            if matches!(error, ProviderError::Cancelled { .. }) {
                info!(provider = %provider, "client cancelled, upstream call aborted");
                return Err(ExecutionFailure {
                    error,
                    attempts,
                    duration: started.elapsed(),
                });
            }

            if error.affects_key_health() {
                if let Some((env_var, index)) = upstream.pool_key() {
                    self.resolver
                        .pool()
                        .report_key_error(env_var, index, error.status());
                }
            }

            match self.next_step(&mut ctx, &upstream, &error, plan) {
                Step::Retry(next) => {
                    debug!(
                        from = %provider,
                        to = %next.provider_id,
                        status = error.status(),
                        retry = ctx.retry_count,
                        "retrying upstream request"
                    );
                    current = next;
                }
                Step::Stop => {
                    if attempts.len() > 1 {
                        warn!(
                            provider = %provider,
                            attempts = attempts.len(),
                            error = %error,
                            "retries exhausted"
                        );
                    }
                    return Err(ExecutionFailure {
                        error,
                        attempts,
                        duration: started.elapsed(),
                    });
                }
            }
        }
    }

    /// Send one attempt, racing client cancellation where the provider honours it
    async fn dispatch(
        &self,
        upstream: &UpstreamRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionPayload, ProviderError> {
        let provider = upstream.provider;
        let response = if provider.endpoint().supports_cancellation {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled { provider }),
                response = self.transport.send(upstream) => response?,
            }
        } else {
            self.transport.send(upstream).await?
        };

        if !response.is_success() {
            return Err(
                ProviderError::from_status(provider, response.status, response.error_message())
                    .with_retry_after(response.retry_after),
            );
        }

        extract_from_bytes(provider, upstream.responses_api, upstream.streamed, &response.body)
            .map_err(|message| ProviderError::response_parsing(provider, message))
    }

    fn next_step(
        &self,
        ctx: &mut RetryContext,
        upstream: &UpstreamRequest,
        error: &ProviderError,
        plan: ExecutionPlan<'_>,
    ) -> Step {
        let provider = upstream.provider;

        if error.is_credential_failure() {
            // Another pooled key of the same provider comes first
            if let Some((env_var, index)) = upstream.pool_key() {
                let alternative = self
                    .resolver
                    .pool_value(env_var)
                    .map(|value| self.resolver.pool().has_healthy_alternative(env_var, value, index))
                    .unwrap_or(false);
                if alternative && ctx.retry_count < self.policy.max_retries {
                    ctx.record_retry();
                    return plan
                        .candidates
                        .iter()
                        .find(|m| m.provider_id == provider)
                        .cloned()
                        .map(Step::Retry)
                        .unwrap_or(Step::Stop);
                }
            }

            ctx.record_failure(provider);
            if !self.policy.should_retry_after_credential_error(
                ctx.requested_provider,
                ctx.no_fallback,
                ctx.retry_count,
                ctx.remaining_providers(),
                provider,
            ) {
                return Step::Stop;
            }
        } else {
            ctx.record_failure(provider);
            if !error.is_retryable()
                || !self.policy.should_retry_request(
                    ctx.requested_provider,
                    ctx.no_fallback,
                    error.status(),
                    ctx.retry_count,
                    ctx.remaining_providers(),
                    provider,
                )
            {
                return Step::Stop;
            }
        }

        match select_next_provider(&plan.selection.scores, &ctx.failed_providers, plan.candidates) {
            Some(next) => {
                ctx.record_retry();
                Step::Retry(next.clone())
            }
            None => Step::Stop,
        }
    }
}
