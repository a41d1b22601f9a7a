//! Set of known providers and their enabled state.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Provider, ProviderClass, ProviderClassTable, ProviderId};

#[derive(Debug, Clone)]
struct ProviderState {
    enabled: bool,
}

/// Status of a single provider, as exposed by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: ProviderId,
    pub name: String,
    pub class: ProviderClass,
    pub enabled: bool,
}

/// Error returned when a provider id does not exist.
#[derive(Debug, thiserror::Error)]
#[error("Provider not found: {0}")]
pub struct ProviderNotFound(pub ProviderId);

/// Registered providers in registration order, with a toggleable enabled flag.
pub struct ProviderRegistry {
    providers: Vec<(ProviderId, Arc<dyn Provider>)>,
    state: RwLock<HashMap<ProviderId, ProviderState>>,
    classes: ProviderClassTable,
}

impl ProviderRegistry {
    pub fn new(classes: ProviderClassTable) -> Self {
        Self {
            providers: Vec::new(),
            state: RwLock::new(HashMap::new()),
            classes,
        }
    }

    /// Register a provider. A later registration with the same id replaces the earlier one.
    pub fn register(mut self, provider: Arc<dyn Provider>, enabled: bool) -> Self {
        let id = provider.id();
        self.providers.retain(|(existing, _)| existing != &id);
        self.state
            .get_mut()
            .insert(id.clone(), ProviderState { enabled });
        self.providers.push((id, provider));
        self
    }

    pub fn classes(&self) -> &ProviderClassTable {
        &self.classes
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, provider)| Arc::clone(provider))
    }

    /// All registered ids, in registration order.
    pub fn ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Enabled ids, in registration order.
    pub async fn enabled_ids(&self) -> Vec<ProviderId> {
        let state = self.state.read().await;
        self.providers
            .iter()
            .filter(|(id, _)| state.get(id).map(|s| s.enabled).unwrap_or(false))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub async fn set_enabled(&self, id: &ProviderId, enabled: bool) -> Result<(), ProviderNotFound> {
        let mut state = self.state.write().await;
        match state.get_mut(id) {
            Some(s) => {
                s.enabled = enabled;
                Ok(())
            }
            None => Err(ProviderNotFound(id.clone())),
        }
    }

    pub async fn status(&self) -> Vec<ProviderStatus> {
        let state = self.state.read().await;
        self.providers
            .iter()
            .map(|(id, provider)| ProviderStatus {
                id: id.clone(),
                name: provider.name().to_string(),
                class: self.classes.class_of(id),
                enabled: state.get(id).map(|s| s.enabled).unwrap_or(false),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
