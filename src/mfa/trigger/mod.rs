mod adaptive;
mod attribute;
mod chain;
mod global;
mod registered_service;
mod request;
mod rest;
mod timed;

use std::sync::Arc;

use async_trait::async_trait;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::mfa::MultifactorAuthenticationProvider;
use crate::request::RequestContext;
use crate::service::{RegisteredService, Service};
pub use adaptive::{
    AdaptiveTrigger, AdaptiveTriggerConfig, GeoLocationResponse, GeoLocationService,
    StaticGeoLocationService,
};
pub use attribute::{AttributeTrigger, AttributeTriggerConfig};
pub use chain::{Activation, TriggerChain};
pub use global::GlobalProviderTrigger;
pub use registered_service::{
    RegisteredServicePolicyTrigger, RegisteredServicePrincipalAttributeTrigger,
};
pub use request::{HttpRequestTrigger, HttpRequestTriggerConfig};
pub use rest::{RestEndpointTrigger, RestTriggerConfig};
pub use timed::{TimedRule, TimedTrigger, TimedTriggerConfig};

/// Everything a trigger may look at.
#[derive(Clone, Copy)]
pub struct TriggerInput<'a> {
    pub authentication: &'a Authentication,
    pub registered_service: Option<&'a RegisteredService>,
    pub service: Option<&'a Service>,
    pub request: &'a RequestContext,
}

/// Decides whether a provider must be activated.
///
/// `Ok(None)` means the trigger does not apply. Errors are kept for
/// configuration and backend problems.
#[async_trait]
pub trait MultifactorAuthenticationTrigger: Send + Sync {
    fn name(&self) -> &str;

    fn order(&self) -> i32 {
        0
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::authentication::{AuthenticationBuilder, Principal};
    use crate::mfa::{MultifactorAuthenticationProviders, ProviderConfig};

    pub fn providers(ids: &[(&str, i32)]) -> Arc<MultifactorAuthenticationProviders> {
        let configs: Vec<ProviderConfig> = ids
            .iter()
            .map(|(id, rank)| ProviderConfig {
                rank: *rank,
                ..ProviderConfig::new(*id)
            })
            .collect();
        Arc::new(MultifactorAuthenticationProviders::new(&configs).unwrap())
    }

    pub fn authentication(principal: Principal) -> Authentication {
        AuthenticationBuilder::new(principal).build()
    }

    pub fn input<'a>(
        authentication: &'a Authentication,
        registered_service: Option<&'a RegisteredService>,
        request: &'a RequestContext,
    ) -> TriggerInput<'a> {
        TriggerInput {
            authentication,
            registered_service,
            service: None,
            request,
        }
    }
}
