//! Per-tenant entity labels and attribute rules.
//!
//! Lookups never fail: the store fills every [`EntityKey`] the tenant does
//! not define from the built-in English defaults, so callers can ask for any
//! entity or attribute without handling a missing case.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use models::tenant::{EntityEntry, EntityKey, TenantDefinition, TenantEntity};
use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::{
    auth::Principal,
    backend::{BackendError, ReportBackend},
};

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant {tenant} defines entity {key} more than once")]
    DuplicateEntity { tenant: String, key: EntityKey },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Resolved configuration for one tenant. Holds exactly one entity per key.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub name: String,
    pub display_name: Option<String>,
    #[ts(type = "Record<string, TenantEntity>")]
    entities: BTreeMap<EntityKey, TenantEntity>,
}

impl TenantConfig {
    /// Built-in English labels for every entity.
    pub fn defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            entities: EntityKey::iter()
                .map(|key| (key, key.default_entity().clone()))
                .collect(),
        }
    }

    pub fn from_definition(definition: TenantDefinition) -> Result<Self, TenantError> {
        let mut entities = BTreeMap::new();
        for entry in definition.entities {
            let entity = match entry {
                EntityEntry::Known(entity) => entity,
                unrecognized => {
                    warn!(
                        tenant = %definition.name,
                        key = unrecognized.raw_key().unwrap_or("<missing>"),
                        "Dropping unrecognized tenant entity"
                    );
                    continue;
                }
            };
            let key = entity.key;
            if entities.insert(key, entity).is_some() {
                return Err(TenantError::DuplicateEntity {
                    tenant: definition.name,
                    key,
                });
            }
        }

        for key in EntityKey::iter() {
            entities.entry(key).or_insert_with(|| {
                debug!(tenant = %definition.name, entity = %key, "Filling entity from defaults");
                key.default_entity().clone()
            });
        }

        Ok(Self {
            name: definition.name,
            display_name: definition.display_name,
            entities,
        })
    }

    pub fn get_all_entities(&self) -> &BTreeMap<EntityKey, TenantEntity> {
        &self.entities
    }

    pub fn entity(&self, key: EntityKey) -> &TenantEntity {
        self.entities
            .get(&key)
            .unwrap_or_else(|| key.default_entity())
    }

    /// Singular label of an entity, e.g. "Project" for `workPackage`.
    pub fn entity_label(&self, key: EntityKey) -> &str {
        self.entity(key)
            .resolved_label()
            .or_else(|| key.default_entity().resolved_label())
            .unwrap_or_default()
    }

    pub fn entity_label_plural(&self, key: EntityKey) -> &str {
        self.entity(key)
            .resolved_label_plural()
            .or_else(|| key.default_entity().resolved_label_plural())
            .unwrap_or_default()
    }

    /// Tenant label for an attribute. An attribute unknown to both the
    /// tenant and the defaults is labelled with its own key.
    pub fn attribute_label<'a>(&'a self, entity: EntityKey, attribute: &'a str) -> &'a str {
        self.entity(entity)
            .attribute(attribute)
            .and_then(|a| a.resolved_label())
            .or_else(|| {
                entity
                    .default_entity()
                    .attribute(attribute)
                    .and_then(|a| a.resolved_label())
            })
            .unwrap_or(attribute)
    }

    /// Display label for a raw enum value. A value nobody maps is its own
    /// label.
    pub fn get_mapping_value<'a>(
        &'a self,
        entity: EntityKey,
        attribute: &str,
        raw: &'a str,
    ) -> &'a str {
        self.entity(entity)
            .attribute(attribute)
            .and_then(|a| a.mapping(raw))
            .or_else(|| {
                entity
                    .default_entity()
                    .attribute(attribute)
                    .and_then(|a| a.mapping(raw))
            })
            .unwrap_or(raw)
    }

    /// Hidden attributes are dropped from rendered output. Mandatory ones
    /// are always shown.
    pub fn is_attribute_visible(&self, entity: EntityKey, attribute: &str) -> bool {
        match self.entity(entity).attribute(attribute) {
            Some(a) => a.visible || a.mandatory,
            None => true,
        }
    }
}

/// Tenant configurations shared across request handlers. Each tenant entry
/// is swapped wholesale; readers hold an `Arc` and never see partial state.
#[derive(Debug, Clone, Default)]
pub struct TenantStore {
    tenants: Arc<RwLock<HashMap<String, Arc<TenantConfig>>>>,
}

impl TenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tenant(&self, definition: TenantDefinition) -> Result<Arc<TenantConfig>, TenantError> {
        let config = Arc::new(TenantConfig::from_definition(definition)?);
        let mut tenants = self.tenants.write().unwrap_or_else(|e| e.into_inner());
        tenants.insert(config.name.clone(), config.clone());
        info!(tenant = %config.name, "Tenant configuration replaced");
        Ok(config)
    }

    /// Current configuration for `tenant`, or the built-in defaults when
    /// none has been loaded.
    pub fn snapshot(&self, tenant: &str) -> Arc<TenantConfig> {
        self.cached(tenant)
            .unwrap_or_else(|| Arc::new(TenantConfig::defaults(tenant)))
    }

    pub fn get_all_entities(&self, tenant: &str) -> BTreeMap<EntityKey, TenantEntity> {
        self.snapshot(tenant).get_all_entities().clone()
    }

    fn cached(&self, tenant: &str) -> Option<Arc<TenantConfig>> {
        self.tenants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tenant)
            .cloned()
    }

    /// Cached configuration for the caller's tenant, fetching it on first
    /// use. A failed fetch serves the defaults and is retried next time.
    pub async fn resolve(
        &self,
        backend: &dyn ReportBackend,
        principal: &Principal,
    ) -> Arc<TenantConfig> {
        if let Some(config) = self.cached(&principal.tenant) {
            return config;
        }

        match self.refresh(backend, principal).await {
            Ok(config) => config,
            Err(e) => {
                warn!(tenant = %principal.tenant, "Using default tenant labels: {}", e);
                Arc::new(TenantConfig::defaults(&principal.tenant))
            }
        }
    }

    /// Re-fetch the caller's tenant from the backend and swap it in.
    pub async fn refresh(
        &self,
        backend: &dyn ReportBackend,
        principal: &Principal,
    ) -> Result<Arc<TenantConfig>, TenantError> {
        let mut definition = backend.fetch_tenant(&principal.token).await?;
        if definition.name != principal.tenant {
            warn!(
                token_tenant = %principal.tenant,
                backend_tenant = %definition.name,
                "Backend tenant name differs from token; keying by token"
            );
            definition.name = principal.tenant.clone();
        }
        self.set_tenant(definition)
    }
}
