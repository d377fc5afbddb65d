use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Error;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{MultifactorAuthenticationProvider, MultifactorAuthenticationProviders};
use crate::request::GeoLocation;

/// Addresses describing where a request comes from, e.g. city and country.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct GeoLocationResponse {
    pub addresses: Vec<String>,
}

#[async_trait]
pub trait GeoLocationService: Send + Sync {
    async fn locate(
        &self,
        client_ip: Option<&str>,
        location: Option<&GeoLocation>,
    ) -> Result<Option<GeoLocationResponse>, Error>;
}

/// Resolves client addresses from a fixed table keyed by IP address.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StaticGeoLocationService {
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<String>>,
}

#[async_trait]
impl GeoLocationService for StaticGeoLocationService {
    async fn locate(
        &self,
        client_ip: Option<&str>,
        _location: Option<&GeoLocation>,
    ) -> Result<Option<GeoLocationResponse>, Error> {
        Ok(client_ip
            .and_then(|ip| self.addresses.get(ip))
            .map(|addresses| GeoLocationResponse {
                addresses: addresses.clone(),
            }))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdaptiveTriggerConfig {
    /// Provider id to the pattern that requires it.
    #[serde(default)]
    pub require_multifactor: BTreeMap<String, String>,
    #[serde(default)]
    pub geo_locations: StaticGeoLocationService,
    #[serde(default)]
    pub order: i32,
}

/// Requires a provider when the client IP address, the user agent or the
/// resolved geographical address matches its pattern.
pub struct AdaptiveTrigger {
    rules: Vec<(Arc<MultifactorAuthenticationProvider>, Regex)>,
    geo_location: Option<Arc<dyn GeoLocationService>>,
    order: i32,
}

impl AdaptiveTrigger {
    pub fn new(
        config: &AdaptiveTriggerConfig,
        providers: &MultifactorAuthenticationProviders,
        geo_location: Option<Arc<dyn GeoLocationService>>,
    ) -> Result<Self, Error> {
        let mut rules = Vec::with_capacity(config.require_multifactor.len());
        for (provider_id, pattern) in &config.require_multifactor {
            let provider = providers.require(provider_id)?;
            let pattern = Regex::new(pattern).map_err(|e| {
                Error::Initialization(format!("Invalid adaptive pattern for '{provider_id}': {e}"))
            })?;
            rules.push((provider, pattern));
        }

        Ok(Self {
            rules,
            geo_location,
            order: config.order,
        })
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for AdaptiveTrigger {
    fn name(&self) -> &str {
        "Adaptive"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        if self.rules.is_empty() {
            return Ok(None);
        }

        let request = input.request;
        let client_ip = request.client_ip.as_deref();
        let user_agent = request.user_agent();

        for (provider, pattern) in &self.rules {
            if client_ip.is_some_and(|ip| pattern.is_match(ip)) {
                debug!("Client address matches '{pattern}', requiring '{}'", provider.id);
                return Ok(Some(provider.clone()));
            }
            if user_agent.is_some_and(|agent| pattern.is_match(agent)) {
                debug!("User agent matches '{pattern}', requiring '{}'", provider.id);
                return Ok(Some(provider.clone()));
            }
        }

        let Some(service) = &self.geo_location else {
            return Ok(None);
        };
        if client_ip.is_none() && request.geo_location.is_none() {
            return Ok(None);
        }

        let located = match service.locate(client_ip, request.geo_location.as_ref()).await {
            Ok(located) => located,
            Err(e) => {
                warn!("Unable to locate the client: {e}");
                return Ok(None);
            }
        };
        let Some(located) = located else {
            return Ok(None);
        };

        for (provider, pattern) in &self.rules {
            if located.addresses.iter().any(|address| pattern.is_match(address)) {
                debug!("Client location matches '{pattern}', requiring '{}'", provider.id);
                return Ok(Some(provider.clone()));
            }
        }

        Ok(None)
    }
}
