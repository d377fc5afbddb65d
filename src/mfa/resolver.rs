use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditOutcome, AuditRecord, AuditTrail};
use crate::authentication::Authentication;
use crate::error::Error;
use crate::metrics_provider::METRICS_PROVIDER;
use crate::mfa::trigger::{TriggerChain, TriggerInput};
use crate::mfa::{service_requests_bypass, Event, EventAttributes, FailureModeEvaluator};
use crate::request::RequestContext;
use crate::service::{RegisteredService, Service};

pub const AUTHENTICATION_EVENT: &str = "AUTHENTICATION_EVENT";

/// State of the login flow handed to event resolvers.
#[derive(Clone, Debug, Default)]
pub struct FlowContext {
    pub registered_service: Option<Arc<RegisteredService>>,
    pub service: Option<Service>,
    pub authentication: Option<Authentication>,
    pub request: RequestContext,
    /// Transition ids available from the current state, when known.
    pub transitions: Option<BTreeSet<String>>,
}

#[async_trait]
pub trait EventResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve_internal(&self, context: &FlowContext) -> Result<Vec<Event>, Error>;

    async fn resolve_single(&self, context: &FlowContext) -> Result<Option<Event>, Error> {
        Ok(self.resolve_internal(context).await?.into_iter().next())
    }
}

/// Turns the first trigger activation into an event named after the
/// provider.
pub struct MultifactorEventResolver {
    name: String,
    triggers: Arc<TriggerChain>,
    failure_mode: FailureModeEvaluator,
}

impl MultifactorEventResolver {
    pub fn new(name: &str, triggers: Arc<TriggerChain>, failure_mode: FailureModeEvaluator) -> Self {
        Self {
            name: name.to_string(),
            triggers,
            failure_mode,
        }
    }
}

fn count(outcome: &str) {
    METRICS_PROVIDER
        .metric_events_total
        .with_label_values(&[outcome])
        .inc();
}

#[async_trait]
impl EventResolver for MultifactorEventResolver {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(resolver = %self.name))]
    async fn resolve_internal(&self, context: &FlowContext) -> Result<Vec<Event>, Error> {
        let Some(authentication) = &context.authentication else {
            debug!("No authentication in context, no event to resolve");
            return Ok(Vec::new());
        };
        let registered_service = context.registered_service.as_deref();

        if service_requests_bypass(registered_service, authentication) {
            count("bypassed");
            return Ok(Vec::new());
        }

        let input = TriggerInput {
            authentication,
            registered_service,
            service: context.service.as_ref(),
            request: &context.request,
        };
        let Some(activation) = self.triggers.first_activated(&input).await else {
            count("not_triggered");
            return Ok(Vec::new());
        };
        let provider = activation.provider;

        if provider.bypass.should_bypass(authentication, &context.request) {
            info!(
                "Provider '{}' is bypassed for '{}'",
                provider.id, authentication.principal.id
            );
            count("bypassed");
            return Ok(Vec::new());
        }

        if let Some(transitions) = &context.transitions {
            if !transitions.contains(&provider.id) {
                warn!("No transition found for event '{}'", provider.id);
                return Err(Error::NoMatchingTransition(provider.id.clone()));
            }
        }

        let event = Event {
            id: provider.id.clone(),
            attributes: EventAttributes {
                principal: authentication.principal.clone(),
                registered_service: registered_service.map(|s| s.name.clone()),
                service: context.service.as_ref().map(|s| s.id.clone()),
                provider: provider.id.clone(),
                failure_mode: self.failure_mode.evaluate(registered_service, &provider),
                trigger: activation.trigger,
            },
        };
        debug!("Resolved event '{}'", event.id);
        count("triggered");

        Ok(vec![event])
    }
}

/// Writes one audit record for every single-event resolution, whatever the
/// outcome.
pub struct AuditedEventResolver {
    inner: Arc<dyn EventResolver>,
    audit_trail: Arc<dyn AuditTrail>,
}

impl AuditedEventResolver {
    pub fn new(inner: Arc<dyn EventResolver>, audit_trail: Arc<dyn AuditTrail>) -> Self {
        Self { inner, audit_trail }
    }
}

#[async_trait]
impl EventResolver for AuditedEventResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn resolve_internal(&self, context: &FlowContext) -> Result<Vec<Event>, Error> {
        self.inner.resolve_internal(context).await
    }

    async fn resolve_single(&self, context: &FlowContext) -> Result<Option<Event>, Error> {
        let result = self.inner.resolve_single(context).await;

        let (outcome, resource) = match &result {
            Ok(Some(event)) => (AuditOutcome::Triggered, Some(event.id.clone())),
            Ok(None) => (AuditOutcome::NotTriggered, None),
            Err(e) => (AuditOutcome::Failed, Some(e.to_string())),
        };
        let mut record = AuditRecord::new(AUTHENTICATION_EVENT, outcome, self.inner.name());
        record.principal = context
            .authentication
            .as_ref()
            .map(|a| a.principal.id.clone());
        record.resource = resource;
        record.client_ip = context.request.client_ip.clone();
        record.user_agent = context.request.user_agent().map(str::to_string);
        self.audit_trail.record(record).await;

        result
    }
}
