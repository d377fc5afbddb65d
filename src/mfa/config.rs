use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::cache::Cache;
use crate::error::Error;
use crate::mfa::trigger::{
    AdaptiveTrigger, AdaptiveTriggerConfig, AttributeTrigger, AttributeTriggerConfig,
    GeoLocationService, GlobalProviderTrigger, HttpRequestTrigger, HttpRequestTriggerConfig,
    MultifactorAuthenticationTrigger, RegisteredServicePolicyTrigger,
    RegisteredServicePrincipalAttributeTrigger, RestEndpointTrigger, RestTriggerConfig,
    TimedTrigger, TimedTriggerConfig, TriggerChain,
};
use crate::mfa::{
    FailureMode, MultifactorAuthenticationProviderSelector, MultifactorAuthenticationProviders,
    ProviderConfig, RankOrder,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub failure_mode: FailureMode,
    #[serde(default)]
    pub provider_selection: RankOrder,
    /// Provider required for every authenticated request.
    pub global_provider_id: Option<String>,
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub triggers: TriggersConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TriggersConfig {
    pub http_request: Option<HttpRequestTriggerConfig>,
    pub rest: Option<RestTriggerConfig>,
    pub principal_attribute: Option<AttributeTriggerConfig>,
    pub authentication_attribute: Option<AttributeTriggerConfig>,
    pub adaptive: Option<AdaptiveTriggerConfig>,
    pub timed: Option<TimedTriggerConfig>,
    #[serde(default)]
    pub registered_service_order: i32,
    #[serde(default)]
    pub global_provider_order: i32,
}

impl Config {
    pub fn build_providers(&self) -> Result<Arc<MultifactorAuthenticationProviders>, Error> {
        let providers = MultifactorAuthenticationProviders::new(&self.providers)?;
        if let Some(id) = &self.global_provider_id {
            providers.require(id)?;
        }
        Ok(Arc::new(providers))
    }

    /// Builds every configured trigger. With equal orders, triggers run in
    /// the order they are listed here.
    pub fn build_triggers(
        &self,
        providers: &Arc<MultifactorAuthenticationProviders>,
        selector: &Arc<dyn MultifactorAuthenticationProviderSelector>,
        cache: &Arc<dyn Cache>,
        geo_location: Option<Arc<dyn GeoLocationService>>,
    ) -> Result<TriggerChain, Error> {
        let triggers = &self.triggers;
        let mut chain: Vec<Arc<dyn MultifactorAuthenticationTrigger>> = Vec::new();

        if let Some(id) = &self.global_provider_id {
            chain.push(Arc::new(GlobalProviderTrigger::new(
                id,
                providers.clone(),
                triggers.global_provider_order,
            )));
        }

        if let Some(config) = &triggers.http_request {
            chain.push(Arc::new(HttpRequestTrigger::new(config.clone(), providers.clone())));
        }

        if let Some(config) = &triggers.rest {
            chain.push(Arc::new(RestEndpointTrigger::new(
                config.clone(),
                providers.clone(),
                cache.clone(),
            )?));
        }

        chain.push(Arc::new(RegisteredServicePrincipalAttributeTrigger::new(
            providers.clone(),
            selector.clone(),
            triggers.registered_service_order,
        )));
        chain.push(Arc::new(RegisteredServicePolicyTrigger::new(
            providers.clone(),
            selector.clone(),
            triggers.registered_service_order,
        )));

        if let Some(config) = &triggers.principal_attribute {
            chain.push(Arc::new(AttributeTrigger::principal(config, providers.clone())?));
        }

        if let Some(config) = &triggers.authentication_attribute {
            chain.push(Arc::new(AttributeTrigger::authentication(
                config,
                providers.clone(),
            )?));
        }

        if let Some(config) = &triggers.adaptive {
            let geo_location = geo_location.or_else(|| {
                (!config.geo_locations.addresses.is_empty()).then(|| {
                    Arc::new(config.geo_locations.clone()) as Arc<dyn GeoLocationService>
                })
            });
            chain.push(Arc::new(AdaptiveTrigger::new(config, providers, geo_location)?));
        }

        if let Some(config) = &triggers.timed {
            chain.push(Arc::new(TimedTrigger::new(&config.rules, providers, config.order)?));
        }

        let chain = TriggerChain::new(chain);
        debug!(
            "Trigger chain: {}",
            chain.names().collect::<Vec<_>>().join(", ")
        );
        Ok(chain)
    }
}
