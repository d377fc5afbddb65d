use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::audit::AuditTrail;
use crate::authentication::{Authentication, AuthenticationTransaction};
use crate::configuration::Configuration;
use crate::error::Error;
use crate::mfa::trigger::GeoLocationService;
use crate::mfa::{
    AuditedEventResolver, Event, EventResolver, FailureModeEvaluator, FlowContext,
    MultifactorAuthenticationProviderSelector, MultifactorEventResolver, RankedProviderSelector,
};
use crate::policy::{
    AtLeastOneCredentialValidatedPolicy, AuthenticationPolicy, AuthenticationPolicyExecutionPlan,
    AuthenticationPolicyResolver, PolicyOutcome, RegisteredServiceAuthenticationPolicyFactory,
    RegisteredServiceAuthenticationPolicyResolver,
};
use crate::request::RequestContext;
use crate::service::{
    DefaultServiceSelectionPlan, QueryParameterSelectionStrategy, RegisteredService, Service,
    ServiceSelectionPlan, ServicesManager,
};
use crate::ticket::TicketRegistry;

/// Compiles every configured registered service.
pub fn registered_services(config: &Configuration) -> Result<Vec<RegisteredService>, Error> {
    config.service.iter().map(RegisteredService::new).collect()
}

/// Authentication policies and multifactor event resolution, built once from
/// configuration and shared by every request.
pub struct Engine {
    policy_plan: AuthenticationPolicyExecutionPlan,
    event_resolver: Arc<dyn EventResolver>,
    services_manager: Arc<dyn ServicesManager>,
    selection_plan: Arc<dyn ServiceSelectionPlan>,
}

impl Engine {
    pub fn new(
        config: &Configuration,
        services_manager: Arc<dyn ServicesManager>,
        tickets: Arc<dyn TicketRegistry>,
        geo_location: Option<Arc<dyn GeoLocationService>>,
        audit_trail: Arc<dyn AuditTrail>,
    ) -> Result<Self, Error> {
        let cache = config.cache.to_backend()?;

        let selection_plan: Arc<dyn ServiceSelectionPlan> =
            Arc::new(DefaultServiceSelectionPlan::new(vec![Arc::new(
                QueryParameterSelectionStrategy::new(&config.authentication.selection),
            )]));

        let mut policies = config
            .authentication
            .policy
            .iter()
            .map(|policy| policy.build(&tickets))
            .collect::<Result<Vec<_>, _>>()?;
        if policies.is_empty() {
            let policy: Arc<dyn AuthenticationPolicy> =
                Arc::new(AtLeastOneCredentialValidatedPolicy::new(false));
            policies.push(policy);
        }

        let resolver: Arc<dyn AuthenticationPolicyResolver> =
            Arc::new(RegisteredServiceAuthenticationPolicyResolver::new(
                services_manager.clone(),
                selection_plan.clone(),
                Arc::new(RegisteredServiceAuthenticationPolicyFactory),
            ));
        let policy_plan = AuthenticationPolicyExecutionPlan::new(policies, vec![resolver]);

        let mfa = &config.mfa;
        let providers = mfa.build_providers()?;
        let selector: Arc<dyn MultifactorAuthenticationProviderSelector> =
            Arc::new(RankedProviderSelector::new(mfa.provider_selection));
        let triggers = mfa.build_triggers(&providers, &selector, &cache, geo_location)?;
        info!(
            "Built {} policies, {} multifactor providers and {} triggers",
            config.authentication.policy.len().max(1),
            providers.len(),
            triggers.len()
        );

        let event_resolver = AuditedEventResolver::new(
            Arc::new(MultifactorEventResolver::new(
                "MultifactorAuthentication",
                Arc::new(triggers),
                FailureModeEvaluator::new(mfa.failure_mode),
            )),
            audit_trail,
        );

        Ok(Self {
            policy_plan,
            event_resolver: Arc::new(event_resolver),
            services_manager,
            selection_plan,
        })
    }

    /// Finds the registered service of the requested service.
    pub fn find_registered_service(&self, service: &Service) -> Option<Arc<RegisteredService>> {
        let resolved = self.selection_plan.resolve_service(service);
        self.services_manager.find_service_by(&resolved)
    }

    pub fn flow_context(
        &self,
        service: Option<Service>,
        authentication: Option<Authentication>,
        request: RequestContext,
        transitions: Option<BTreeSet<String>>,
    ) -> FlowContext {
        FlowContext {
            registered_service: service
                .as_ref()
                .and_then(|s| self.find_registered_service(s)),
            service,
            authentication,
            request,
            transitions,
        }
    }

    #[instrument(skip_all)]
    pub async fn evaluate_policies(
        &self,
        transaction: &AuthenticationTransaction,
        authentication: &Authentication,
    ) -> Result<PolicyOutcome, Error> {
        self.policy_plan.evaluate(transaction, authentication).await
    }

    #[instrument(skip_all)]
    pub async fn resolve_event(&self, context: &FlowContext) -> Result<Option<Event>, Error> {
        self.event_resolver.resolve_single(context).await
    }
}
