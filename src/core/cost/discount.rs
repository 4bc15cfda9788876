//! Discount rows, their cached store and precedence resolution

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{CostError, CostResult};
use crate::config::CostSettings;
use crate::core::providers::ProviderId;

/// One persisted discount row
///
/// `None` in a scope column means "any": a row without an organization is
/// global, a row without a provider applies across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub organization_id: Option<String>,
    pub provider: Option<ProviderId>,
    /// Canonical catalog id or upstream model name
    pub model: Option<String>,
    /// Fraction in [0, 1)
    pub discount_percent: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Discount {
    pub fn global(discount_percent: Decimal) -> Self {
        Self {
            organization_id: None,
            provider: None,
            model: None,
            discount_percent,
            expires_at: None,
        }
    }

    pub fn for_organization(organization_id: impl Into<String>, discount_percent: Decimal) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            ..Self::global(discount_percent)
        }
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Read access to persisted discounts
#[async_trait]
pub trait DiscountStore: Send + Sync {
    /// Unexpired rows visible to `organization_id`: its own rows plus global ones
    async fn discounts_for(&self, organization_id: Option<&str>) -> CostResult<Vec<Discount>>;
}

/// In-process discount table
#[derive(Debug, Default)]
pub struct InMemoryDiscountStore {
    rows: RwLock<Vec<Discount>>,
}

impl InMemoryDiscountStore {
    pub fn new(rows: Vec<Discount>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    pub fn insert(&self, discount: Discount) {
        self.rows.write().push(discount);
    }

    pub fn clear(&self) {
        self.rows.write().clear();
    }
}

#[async_trait]
impl DiscountStore for InMemoryDiscountStore {
    async fn discounts_for(&self, organization_id: Option<&str>) -> CostResult<Vec<Discount>> {
        let now = Utc::now();
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|row| !row.is_expired(now))
            .filter(|row| {
                row.organization_id.is_none() || row.organization_id.as_deref() == organization_id
            })
            .cloned()
            .collect())
    }
}

/// TTL cache in front of another store, keyed by organization
pub struct CachedDiscountStore {
    inner: Arc<dyn DiscountStore>,
    cache: Cache<String, Arc<Vec<Discount>>>,
}

impl std::fmt::Debug for CachedDiscountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDiscountStore")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl CachedDiscountStore {
    pub fn new(inner: Arc<dyn DiscountStore>, settings: &CostSettings) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(settings.discount_cache_capacity)
                .time_to_live(Duration::from_secs(settings.discount_cache_ttl_secs))
                .build(),
        }
    }

    /// Drop the cached rows of one organization (`None` for the global scope)
    pub async fn invalidate(&self, organization_id: Option<&str>) {
        self.cache
            .invalidate(organization_id.unwrap_or_default())
            .await;
    }
}

#[async_trait]
impl DiscountStore for CachedDiscountStore {
    async fn discounts_for(&self, organization_id: Option<&str>) -> CostResult<Vec<Discount>> {
        let key = organization_id.unwrap_or_default().to_string();
        let rows = match self.cache.get(&key).await {
            Some(rows) => rows,
            None => {
                // Errors are not cached
                let rows = Arc::new(self.inner.discounts_for(organization_id).await?);
                self.cache.insert(key, Arc::clone(&rows)).await;
                rows
            }
        };
        // Rows may expire while cached
        let now = Utc::now();
        Ok(rows.iter().filter(|r| !r.is_expired(now)).cloned().collect())
    }
}

/// Which rule produced the effective discount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSource {
    OrganizationProviderModel,
    OrganizationProvider,
    OrganizationModel,
    GlobalProviderModel,
    GlobalProvider,
    GlobalModel,
    Catalog,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveDiscount {
    pub discount: Decimal,
    pub source: DiscountSource,
}

/// Identifies the provider-model pair a discount is looked up for
#[derive(Debug, Clone, Copy)]
pub struct DiscountTarget<'a> {
    pub organization_id: Option<&'a str>,
    pub provider: ProviderId,
    /// Canonical catalog id
    pub model_id: &'a str,
    /// Provider-specific model name
    pub upstream_model: &'a str,
    /// Hardcoded discount of the catalog mapping
    pub catalog_discount: Decimal,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Organization,
    Global,
}

/// Precedence order, most specific first
const TIERS: [(Scope, bool, bool, DiscountSource); 6] = [
    (Scope::Organization, true, true, DiscountSource::OrganizationProviderModel),
    (Scope::Organization, true, false, DiscountSource::OrganizationProvider),
    (Scope::Organization, false, true, DiscountSource::OrganizationModel),
    (Scope::Global, true, true, DiscountSource::GlobalProviderModel),
    (Scope::Global, true, false, DiscountSource::GlobalProvider),
    (Scope::Global, false, true, DiscountSource::GlobalModel),
];

fn row_matches(
    row: &Discount,
    target: &DiscountTarget<'_>,
    scope: Scope,
    by_provider: bool,
    by_model: bool,
) -> bool {
    let scope_ok = match scope {
        Scope::Organization => {
            target.organization_id.is_some() && row.organization_id.as_deref() == target.organization_id
        }
        Scope::Global => row.organization_id.is_none(),
    };
    let provider_ok = if by_provider {
        row.provider == Some(target.provider)
    } else {
        row.provider.is_none()
    };
    let model_ok = match (&row.model, by_model) {
        (Some(model), true) => model == target.model_id || model == target.upstream_model,
        (None, false) => true,
        _ => false,
    };
    scope_ok && provider_ok && model_ok
}

/// First matching tier wins, then the catalog discount, then none
pub fn resolve_discount(rows: &[Discount], target: &DiscountTarget<'_>) -> EffectiveDiscount {
    for (scope, by_provider, by_model, source) in TIERS {
        if let Some(row) = rows
            .iter()
            .find(|row| row_matches(row, target, scope, by_provider, by_model))
        {
            return EffectiveDiscount {
                discount: row.discount_percent,
                source,
            };
        }
    }
    catalog_fallback(target)
}

fn catalog_fallback(target: &DiscountTarget<'_>) -> EffectiveDiscount {
    if target.catalog_discount > Decimal::ZERO {
        EffectiveDiscount {
            discount: target.catalog_discount,
            source: DiscountSource::Catalog,
        }
    } else {
        EffectiveDiscount {
            discount: Decimal::ZERO,
            source: DiscountSource::None,
        }
    }
}

/// Resolves the discount applied to a request
#[derive(Clone)]
pub struct DiscountResolver {
    store: Arc<dyn DiscountStore>,
}

impl std::fmt::Debug for DiscountResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscountResolver").finish_non_exhaustive()
    }
}

impl DiscountResolver {
    pub fn new(store: Arc<dyn DiscountStore>) -> Self {
        Self { store }
    }

    /// Store failures fall back to the catalog discount and never fail the request
    pub async fn get_effective_discount(&self, target: DiscountTarget<'_>) -> EffectiveDiscount {
        let effective = match self.store.discounts_for(target.organization_id).await {
            Ok(rows) => resolve_discount(&rows, &target),
            Err(error) => {
                warn!(error = %error, provider = %target.provider, "discount lookup failed, using catalog discount");
                catalog_fallback(&target)
            }
        };
        debug!(
            provider = %target.provider,
            model = target.model_id,
            discount = %effective.discount,
            source = ?effective.source,
            "resolved discount"
        );
        effective
    }
}

/// Wrap a store error
pub fn store_error(message: impl Into<String>) -> CostError {
    CostError::Store(message.into())
}
