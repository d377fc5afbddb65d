use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Error;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{
    MultifactorAuthenticationProvider, MultifactorAuthenticationProviderSelector,
    MultifactorAuthenticationProviders,
};
use crate::service::{MultifactorPolicy, RegisteredService};

/// Providers declared by the service policy, a missing one is an error.
fn declared_providers(
    providers: &MultifactorAuthenticationProviders,
    policy: &MultifactorPolicy,
) -> Result<Vec<Arc<MultifactorAuthenticationProvider>>, Error> {
    policy
        .providers
        .iter()
        .map(|id| providers.require(id))
        .collect()
}

fn select(
    selector: &dyn MultifactorAuthenticationProviderSelector,
    candidates: Vec<Arc<MultifactorAuthenticationProvider>>,
    service: &RegisteredService,
    input: &TriggerInput<'_>,
) -> Option<Arc<MultifactorAuthenticationProvider>> {
    if candidates.len() == 1 {
        return candidates.into_iter().next();
    }
    selector.resolve(&candidates, Some(service), &input.authentication.principal)
}

/// Activates the providers a registered service always requires.
///
/// Services that condition their providers on a principal attribute are
/// left to [`RegisteredServicePrincipalAttributeTrigger`].
pub struct RegisteredServicePolicyTrigger {
    providers: Arc<MultifactorAuthenticationProviders>,
    selector: Arc<dyn MultifactorAuthenticationProviderSelector>,
    order: i32,
}

impl RegisteredServicePolicyTrigger {
    pub fn new(
        providers: Arc<MultifactorAuthenticationProviders>,
        selector: Arc<dyn MultifactorAuthenticationProviderSelector>,
        order: i32,
    ) -> Self {
        Self {
            providers,
            selector,
            order,
        }
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for RegisteredServicePolicyTrigger {
    fn name(&self) -> &str {
        "RegisteredServicePolicy"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        let Some(service) = input.registered_service else {
            return Ok(None);
        };
        let Some(policy) = &service.multifactor_policy else {
            return Ok(None);
        };

        if policy.principal_attribute_name_trigger.is_some() {
            debug!(
                "Service '{}' conditions its providers on principal attributes",
                service.name
            );
            return Ok(None);
        }
        if policy.providers.is_empty() {
            return Ok(None);
        }

        let candidates = declared_providers(&self.providers, policy)?;
        Ok(select(self.selector.as_ref(), candidates, service, input))
    }
}

/// Activates the service providers when one of the declared principal
/// attributes has a value matching the declared pattern. Both must be set.
pub struct RegisteredServicePrincipalAttributeTrigger {
    providers: Arc<MultifactorAuthenticationProviders>,
    selector: Arc<dyn MultifactorAuthenticationProviderSelector>,
    order: i32,
}

impl RegisteredServicePrincipalAttributeTrigger {
    pub fn new(
        providers: Arc<MultifactorAuthenticationProviders>,
        selector: Arc<dyn MultifactorAuthenticationProviderSelector>,
        order: i32,
    ) -> Self {
        Self {
            providers,
            selector,
            order,
        }
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for RegisteredServicePrincipalAttributeTrigger {
    fn name(&self) -> &str {
        "RegisteredServicePrincipalAttribute"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        let Some(service) = input.registered_service else {
            return Ok(None);
        };
        let Some(policy) = &service.multifactor_policy else {
            return Ok(None);
        };
        let Some(pattern) = &policy.principal_attribute_value_to_match else {
            return Ok(None);
        };
        let names = policy.trigger_attribute_names();
        if names.is_empty() || policy.providers.is_empty() {
            return Ok(None);
        }

        let principal = &input.authentication.principal;
        let matched = names.iter().find(|name| {
            principal
                .attribute_values(name)
                .iter()
                .any(|value| pattern.is_match(value))
        });
        let Some(name) = matched else {
            return Ok(None);
        };
        debug!("Principal attribute '{name}' of '{}' matches '{pattern}'", principal.id);

        let candidates = declared_providers(&self.providers, policy)?;
        Ok(select(self.selector.as_ref(), candidates, service, input))
    }
}
