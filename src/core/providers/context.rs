//! Request context resolution
//!
//! Turns a chosen (provider, model mapping) plus the caller's request into a
//! concrete upstream call: credential, URL, headers and body. Every attempt of
//! the retry loop resolves a fresh context.

use super::ProviderError;
use super::ProviderId;
use super::body::build_request_body;
use super::endpoints::AuthStyle;
use super::headers::build_headers;
use super::params::{SamplingParams, strip_parameters};
use crate::core::catalog::ProviderModelMapping;
use crate::core::keys::{CredentialEnv, KeyError, KeyPool, get_nth_value};
use crate::core::types::ChatRequest;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub const AZURE_DEFAULT_API_VERSION: &str = "2024-10-21";
pub const AZURE_FOUNDRY_DEPLOYMENT: &str = "ai-foundry";
pub const VERTEX_DEFAULT_REGION: &str = "global";
pub const BEDROCK_DEFAULT_REGION: &str = "us-east-1";

/// Billing mode of the calling project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectMode {
    /// Bring your own provider keys
    ApiKeys,
    /// Pooled gateway keys, metered against credits
    #[default]
    Credits,
    /// Organization key first, pool as fallback
    Hybrid,
}

/// Provider credential owned by the calling organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationKey {
    pub provider: ProviderId,
    pub token: String,
    /// Overrides the provider's default endpoint (required for `custom`)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl OrganizationKey {
    pub fn new(provider: ProviderId, token: impl Into<String>) -> Self {
        Self {
            provider,
            token: token.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Caller-side inputs to context resolution
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub mode: ProjectMode,
    pub organization_keys: Vec<OrganizationKey>,
}

impl ProjectContext {
    pub fn new(mode: ProjectMode) -> Self {
        Self {
            mode,
            organization_keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: OrganizationKey) -> Self {
        self.organization_keys.push(key);
        self
    }

    pub fn organization_key(&self, provider: ProviderId) -> Option<&OrganizationKey> {
        self.organization_keys.iter().find(|k| k.provider == provider)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Organization,
    Pool,
}

/// Credential chosen for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
    /// Pool variable and index, for health reporting
    pub env_var: Option<&'static str>,
    pub key_index: usize,
    pub base_url: Option<String>,
}

/// Fully resolved upstream call
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub provider: ProviderId,
    /// Provider-specific model name
    pub model: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
    pub token_source: TokenSource,
    pub env_var: Option<&'static str>,
    pub key_index: usize,
    pub streamed: bool,
    pub responses_api: bool,
}

impl UpstreamRequest {
    /// Pooled credential used by this attempt, if any
    pub fn pool_key(&self) -> Option<(&'static str, usize)> {
        match self.token_source {
            TokenSource::Pool => self.env_var.map(|v| (v, self.key_index)),
            TokenSource::Organization => None,
        }
    }
}

fn pool_error(provider: ProviderId, error: KeyError) -> ProviderError {
    ProviderError::configuration(provider, error.to_string())
}

/// Pick the credential for `provider` according to the project's billing mode
pub fn resolve_token(
    provider: ProviderId,
    project: &ProjectContext,
    pool: &KeyPool,
    env: &CredentialEnv,
) -> Result<ResolvedToken, ProviderError> {
    if provider == ProviderId::LlmGateway {
        return Err(ProviderError::configuration(
            provider,
            "meta-provider cannot be called directly",
        ));
    }

    let org_key = project.organization_key(provider).map(|key| ResolvedToken {
        token: key.token.clone(),
        source: TokenSource::Organization,
        env_var: None,
        key_index: 0,
        base_url: key.base_url.clone(),
    });

    // Custom endpoints only exist as organization keys
    if provider == ProviderId::Custom {
        return org_key.ok_or_else(|| {
            ProviderError::configuration(provider, "custom provider requires an organization key")
        });
    }

    match (project.mode, org_key) {
        (ProjectMode::ApiKeys | ProjectMode::Hybrid, Some(token)) => Ok(token),
        (ProjectMode::ApiKeys, None) => Err(ProviderError::configuration(
            provider,
            format!("no {} key configured for this organization", provider),
        )),
        (ProjectMode::Credits, _) | (ProjectMode::Hybrid, None) => {
            let env_var = provider.endpoint().api_key_env.ok_or_else(|| {
                ProviderError::configuration(provider, "provider has no pooled credentials")
            })?;
            let value = env.require(env_var).map_err(|e| pool_error(provider, e))?;
            let picked = pool
                .get_round_robin_value(env_var, value)
                .map_err(|e| pool_error(provider, e))?;
            Ok(ResolvedToken {
                token: picked.value,
                source: TokenSource::Pool,
                env_var: Some(env_var),
                key_index: picked.index,
                base_url: None,
            })
        }
    }
}

/// Whether the pair is served through the "responses" style endpoint
pub fn uses_responses_api(provider: ProviderId, mapping: &ProviderModelMapping) -> bool {
    mapping.capabilities.responses_api && matches!(provider, ProviderId::OpenAI | ProviderId::Azure)
}

/// Inputs that shape the upstream URL
#[derive(Debug, Clone, Default)]
pub struct UrlOptions<'a> {
    pub base_url: Option<&'a str>,
    pub stream: bool,
    pub responses_api: bool,
    /// Aligns auxiliary variables (region, resource) with the pooled key
    pub key_index: usize,
    /// Only used for key-in-query providers
    pub token: Option<&'a str>,
}

fn aux(env: &CredentialEnv, var: Option<&str>, index: usize, default: Option<&str>) -> Option<String> {
    get_nth_value(var.and_then(|v| env.get(v)), index, default).ok()
}

fn parse_url(provider: ProviderId, raw: &str) -> Result<Url, ProviderError> {
    Url::parse(raw).map_err(|e| ProviderError::configuration(provider, format!("invalid URL {}: {}", raw, e)))
}

/// Build the upstream URL for one attempt
pub fn resolve_url(
    provider: ProviderId,
    model: &str,
    options: &UrlOptions<'_>,
    env: &CredentialEnv,
) -> Result<Url, ProviderError> {
    let endpoint = provider.endpoint();
    let base = options
        .base_url
        .or(endpoint.base_url)
        .map(|b| b.trim_end_matches('/').to_string());
    let index = options.key_index;

    let raw = match provider {
        ProviderId::LlmGateway => {
            return Err(ProviderError::configuration(provider, "meta-provider has no endpoint"));
        }
        ProviderId::Anthropic => format!("{}/v1/messages", base.unwrap_or_default()),
        ProviderId::GoogleAiStudio => {
            let op = if options.stream {
                "streamGenerateContent?alt=sse"
            } else {
                "generateContent"
            };
            format!("{}/v1beta/models/{}:{}", base.unwrap_or_default(), model, op)
        }
        ProviderId::GoogleVertex => {
            let region = aux(env, endpoint.region_env, index, Some(VERTEX_DEFAULT_REGION))
                .unwrap_or_else(|| VERTEX_DEFAULT_REGION.to_string());
            let host = base.unwrap_or_else(|| {
                if region == VERTEX_DEFAULT_REGION {
                    "https://aiplatform.googleapis.com".to_string()
                } else {
                    format!("https://{}-aiplatform.googleapis.com", region)
                }
            });
            let op = if options.stream {
                "streamGenerateContent?alt=sse"
            } else {
                "generateContent"
            };
            format!("{}/v1/publishers/google/models/{}:{}", host, model, op)
        }
        ProviderId::AwsBedrock => {
            let region = aux(env, endpoint.region_env, index, Some(BEDROCK_DEFAULT_REGION))
                .unwrap_or_else(|| BEDROCK_DEFAULT_REGION.to_string());
            let host = base.unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", region));
            let op = if options.stream { "converse-stream" } else { "converse" };
            format!("{}/model/{}/{}", host, model, op)
        }
        ProviderId::Azure => {
            let host = match base {
                Some(base) => base,
                None => {
                    let resource = aux(env, endpoint.resource_env, index, None).ok_or_else(|| {
                        ProviderError::configuration(provider, "Azure resource name is not configured")
                    })?;
                    format!("https://{}.openai.azure.com", resource)
                }
            };
            let deployment_type = aux(env, endpoint.deployment_type_env, index, Some("openai"))
                .unwrap_or_default();
            let api_version = aux(env, endpoint.api_version_env, index, Some(AZURE_DEFAULT_API_VERSION))
                .unwrap_or_else(|| AZURE_DEFAULT_API_VERSION.to_string());

            if deployment_type == AZURE_FOUNDRY_DEPLOYMENT {
                let op = if options.responses_api { "responses" } else { "chat/completions" };
                format!("{}/openai/v1/{}", host, op)
            } else if options.responses_api {
                format!("{}/openai/responses?api-version={}", host, api_version)
            } else {
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    host, model, api_version
                )
            }
        }
        _ => {
            let base = base.ok_or_else(|| {
                ProviderError::configuration(provider, "no base URL configured")
            })?;
            let op = if options.responses_api { "responses" } else { "chat/completions" };
            format!("{}/{}", base, op)
        }
    };

    if raw.starts_with('/') {
        return Err(ProviderError::configuration(provider, "no base URL configured"));
    }

    let mut url = parse_url(provider, &raw)?;
    if endpoint.auth == AuthStyle::KeyInQuery {
        if let Some(token) = options.token {
            url.query_pairs_mut().append_pair("key", token);
        }
    }
    Ok(url)
}

/// Resolves upstream calls against the shared key pool
#[derive(Debug, Clone)]
pub struct RequestContextResolver {
    pool: Arc<KeyPool>,
    env: Arc<CredentialEnv>,
}

impl RequestContextResolver {
    pub fn new(pool: Arc<KeyPool>, env: Arc<CredentialEnv>) -> Self {
        Self { pool, env }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub fn env(&self) -> &CredentialEnv {
        &self.env
    }

    /// Credential pool value behind a pool variable, for health decisions
    pub fn pool_value(&self, env_var: &str) -> Option<&str> {
        self.env.get(env_var)
    }

    /// Build the complete upstream call for one attempt
    pub fn resolve_request_context(
        &self,
        mapping: &ProviderModelMapping,
        request: &ChatRequest,
        project: &ProjectContext,
    ) -> Result<UpstreamRequest, ProviderError> {
        let provider = mapping.provider_id;
        let token = resolve_token(provider, project, &self.pool, &self.env)?;
        let responses_api = uses_responses_api(provider, mapping);

        let url = resolve_url(
            provider,
            &mapping.model_name,
            &UrlOptions {
                base_url: token.base_url.as_deref(),
                stream: request.stream,
                responses_api,
                key_index: token.key_index,
                token: Some(&token.token),
            },
            &self.env,
        )?;

        let params = strip_parameters(SamplingParams::from(request), mapping, provider.endpoint());
        let body = build_request_body(provider, mapping, request, &params, responses_api);
        let headers = build_headers(provider, Some(&token.token), request, mapping)?;

        debug!(
            provider = %provider,
            model = %mapping.model_name,
            source = ?token.source,
            key_index = token.key_index,
            "resolved upstream request context"
        );

        Ok(UpstreamRequest {
            provider,
            model: mapping.model_name.clone(),
            url,
            headers,
            body,
            token_source: token.source,
            env_var: token.env_var,
            key_index: token.key_index,
            streamed: request.stream,
            responses_api,
        })
    }
}
