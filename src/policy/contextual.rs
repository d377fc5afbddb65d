use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};
use crate::service::RegisteredService;

/// A policy bound to the context it was created for.
pub struct ContextualAuthenticationPolicy<C> {
    context: C,
    policy: Arc<dyn AuthenticationPolicy>,
}

impl<C> ContextualAuthenticationPolicy<C> {
    pub fn new(context: C, policy: Arc<dyn AuthenticationPolicy>) -> Self {
        Self { context, policy }
    }

    pub fn context(&self) -> &C {
        &self.context
    }
}

impl ContextualAuthenticationPolicy<Arc<RegisteredService>> {
    pub async fn is_satisfied_by(
        &self,
        authentication: &Authentication,
        handlers: &BTreeSet<String>,
    ) -> Result<bool, Error> {
        let context = PolicyContext {
            service: None,
            registered_service: Some(self.context.as_ref()),
        };
        let result = self.policy.evaluate(authentication, handlers, &context).await?;
        Ok(result.satisfied)
    }
}

#[async_trait]
impl AuthenticationPolicy for ContextualAuthenticationPolicy<Arc<RegisteredService>> {
    fn name(&self) -> &str {
        self.policy.name()
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        handlers: &BTreeSet<String>,
        context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        let context = PolicyContext {
            service: context.service,
            registered_service: Some(self.context.as_ref()),
        };
        self.policy.evaluate(authentication, handlers, &context).await
    }
}

pub trait ContextualAuthenticationPolicyFactory<C>: Send + Sync {
    /// Builds the policy declared by `context`, if it declares one.
    fn create_policy(&self, context: C) -> Result<Option<ContextualAuthenticationPolicy<C>>, Error>;
}

/// Binds the authentication policy a registered service declares, built when
/// the service was loaded, to that service.
#[derive(Debug, Default)]
pub struct RegisteredServiceAuthenticationPolicyFactory;

impl ContextualAuthenticationPolicyFactory<Arc<RegisteredService>>
    for RegisteredServiceAuthenticationPolicyFactory
{
    fn create_policy(
        &self,
        service: Arc<RegisteredService>,
    ) -> Result<Option<ContextualAuthenticationPolicy<Arc<RegisteredService>>>, Error> {
        let Some(policy) = service
            .authentication_policy
            .as_ref()
            .map(|declared| declared.policy.clone())
        else {
            return Ok(None);
        };

        Ok(Some(ContextualAuthenticationPolicy::new(service, policy)))
    }
}
