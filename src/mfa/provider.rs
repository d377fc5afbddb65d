use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::Error;
use crate::mfa::{BypassConfig, BypassRules, FailureMode};

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub rank: i32,
    #[serde(default)]
    pub failure_mode: FailureMode,
    #[serde(default)]
    pub bypass: BypassConfig,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            rank: 0,
            failure_mode: FailureMode::Undefined,
            bypass: BypassConfig::default(),
        }
    }
}

/// A step-up authentication method, identified by the id used as the
/// transition of its flow.
#[derive(Debug)]
pub struct MultifactorAuthenticationProvider {
    pub id: String,
    pub name: String,
    pub rank: i32,
    pub failure_mode: FailureMode,
    pub bypass: BypassRules,
}

impl MultifactorAuthenticationProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Error> {
        if config.id.trim().is_empty() {
            return Err(Error::Initialization(
                "Multifactor provider id cannot be blank".to_string(),
            ));
        }

        let bypass = BypassRules::new(&config.bypass).map_err(|e| {
            Error::Initialization(format!("Invalid bypass of provider '{}': {e}", config.id))
        })?;

        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            rank: config.rank,
            failure_mode: config.failure_mode,
            bypass,
        })
    }

    /// Whether `identifier` designates this provider, either by id or as a
    /// pattern fully matching the id.
    pub fn matches(&self, identifier: &str) -> bool {
        if identifier == self.id {
            return true;
        }

        Regex::new(&format!("^(?:{identifier})$")).is_ok_and(|pattern| pattern.is_match(&self.id))
    }
}

/// Providers known to the server, ordered by id.
#[derive(Debug, Default)]
pub struct MultifactorAuthenticationProviders {
    providers: BTreeMap<String, Arc<MultifactorAuthenticationProvider>>,
}

impl MultifactorAuthenticationProviders {
    pub fn new(configs: &[ProviderConfig]) -> Result<Self, Error> {
        let mut providers = BTreeMap::new();
        for config in configs {
            let provider = MultifactorAuthenticationProvider::new(config)?;
            if providers.contains_key(&provider.id) {
                return Err(Error::Initialization(format!(
                    "Duplicate multifactor provider id '{}'",
                    provider.id
                )));
            }
            debug!("Registering multifactor provider '{}'", provider.id);
            providers.insert(provider.id.clone(), Arc::new(provider));
        }

        Ok(Self { providers })
    }

    pub fn get(&self, id: &str) -> Option<Arc<MultifactorAuthenticationProvider>> {
        self.providers.get(id).cloned()
    }

    /// Like [`Self::get`], a missing provider is a configuration error.
    pub fn require(&self, id: &str) -> Result<Arc<MultifactorAuthenticationProvider>, Error> {
        self.get(id)
            .ok_or_else(|| Error::ProviderAbsent(format!("no provider registered with id '{id}'")))
    }

    /// First provider, by id, designated by `value`.
    pub fn find_matching(&self, value: &str) -> Option<Arc<MultifactorAuthenticationProvider>> {
        if let Some(provider) = self.get(value) {
            return Some(provider);
        }
        self.providers
            .values()
            .find(|provider| provider.matches(value))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MultifactorAuthenticationProvider>> {
        self.providers.values()
    }
}
