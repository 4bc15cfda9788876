//! Provider catalog
//!
//! Static in-memory table of models, their provider mappings, pricing and
//! capability flags.

mod models;
pub mod types;

pub use types::{
    AllowedProviders, ModelCapabilities, ModelDefinition, ProviderModelMapping,
    SamplingParameter, StabilityLevel,
};

use crate::core::providers::ProviderId;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static BUILTIN: Lazy<Catalog> = Lazy::new(|| Catalog::new(models::builtin_models()));

/// Read-only model table
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    models: Vec<ModelDefinition>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(models: Vec<ModelDefinition>) -> Self {
        let by_id = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        Self { models, by_id }
    }

    /// The catalog shipped with the crate
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn models(&self) -> &[ModelDefinition] {
        &self.models
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelDefinition> {
        self.by_id.get(model_id).map(|&i| &self.models[i])
    }

    pub fn mapping(&self, model_id: &str, provider: ProviderId) -> Option<&ProviderModelMapping> {
        self.get(model_id).and_then(|m| m.mapping(provider))
    }

    /// Resolve a request's model string: a catalog id, `provider/model`, or an upstream name
    ///
    /// The `llmgateway/` prefix names the gateway itself and leaves the choice
    /// of provider to selection.
    pub fn resolve(&self, requested: &str) -> Option<(&ModelDefinition, Option<ProviderId>)> {
        if let Some(model) = self.get(requested) {
            return Some((model, None));
        }

        if let Some((prefix, rest)) = requested.split_once('/') {
            if let Ok(provider) = prefix.parse::<ProviderId>() {
                let model = self.get(rest).or_else(|| self.find_by_upstream_name(rest))?;
                let pinned = (provider != ProviderId::LlmGateway).then_some(provider);
                return Some((model, pinned));
            }
        }

        self.find_by_upstream_name(requested).map(|m| (m, None))
    }

    /// Find the model whose mapping uses this provider-specific name
    pub fn find_by_upstream_name(&self, name: &str) -> Option<&ModelDefinition> {
        self.models
            .iter()
            .find(|m| m.providers.iter().any(|p| p.model_name == name))
    }

    /// Mappings of `model` that the caller's IAM rules permit, in catalog order
    pub fn candidates(
        &self,
        model: &ModelDefinition,
        allowed: Option<&AllowedProviders>,
    ) -> Vec<ProviderModelMapping> {
        model
            .providers
            .iter()
            .filter(|m| allowed.map(|a| a.permits(m.provider_id)).unwrap_or(true))
            .cloned()
            .collect()
    }
}
