use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::http_client::EndpointConfig;
use crate::policy::{
    exclude_any_of, require_any_of, AcceptAnyAuthenticationPolicy, AllCredentialsValidatedPolicy,
    AtLeastOneCredentialValidatedPolicy, AuthenticationPolicy, NotPreventedPolicy, PolicyContext,
    PolicyExecutionResult, RequiredAttributesPolicy, RestfulAuthenticationPolicy,
    ScriptedAuthenticationPolicy, UniquePrincipalPolicy,
};
use crate::ticket::TicketRegistry;

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyKind {
    AcceptAny,
    AllCredentials,
    AnyCredential {
        #[serde(default)]
        try_all: bool,
    },
    RequiredHandlers {
        handlers: Vec<String>,
        #[serde(default)]
        try_all: bool,
    },
    ExcludedHandlers {
        handlers: Vec<String>,
    },
    RequiredAttributes {
        attributes: BTreeMap<String, String>,
    },
    NotPrevented,
    UniquePrincipal,
    Rest {
        endpoint: EndpointConfig,
    },
    Script {
        script: String,
    },
}

/// One `[[authentication.policy]]` entry.
#[derive(Clone, Debug, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub order: i32,
    #[serde(flatten)]
    pub kind: PolicyKind,
}

impl PolicyConfig {
    /// Compiles the configured policy; patterns, scripts and URLs are
    /// validated here rather than on first use.
    pub fn build(
        &self,
        tickets: &Arc<dyn TicketRegistry>,
    ) -> Result<Arc<dyn AuthenticationPolicy>, Error> {
        let policy: Arc<dyn AuthenticationPolicy> = match &self.kind {
            PolicyKind::AcceptAny => Arc::new(AcceptAnyAuthenticationPolicy),
            PolicyKind::AllCredentials => Arc::new(AllCredentialsValidatedPolicy),
            PolicyKind::AnyCredential { try_all } => {
                Arc::new(AtLeastOneCredentialValidatedPolicy::new(*try_all))
            }
            PolicyKind::RequiredHandlers { handlers, try_all } => {
                Arc::new(require_any_of(handlers.iter().cloned(), *try_all))
            }
            PolicyKind::ExcludedHandlers { handlers } => {
                Arc::new(exclude_any_of(handlers.iter().cloned()))
            }
            PolicyKind::RequiredAttributes { attributes } => {
                Arc::new(RequiredAttributesPolicy::new(attributes)?)
            }
            PolicyKind::NotPrevented => Arc::new(NotPreventedPolicy),
            PolicyKind::UniquePrincipal => Arc::new(UniquePrincipalPolicy::new(tickets.clone())),
            PolicyKind::Rest { endpoint } => {
                Arc::new(RestfulAuthenticationPolicy::new(endpoint.clone())?)
            }
            PolicyKind::Script { script } => Arc::new(ScriptedAuthenticationPolicy::new(script)?),
        };

        Ok(Arc::new(OrderedPolicy {
            order: self.order,
            policy,
        }))
    }
}

struct OrderedPolicy {
    order: i32,
    policy: Arc<dyn AuthenticationPolicy>,
}

#[async_trait]
impl AuthenticationPolicy for OrderedPolicy {
    fn name(&self) -> &str {
        self.policy.name()
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        handlers: &BTreeSet<String>,
        context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        self.policy.evaluate(authentication, handlers, context).await
    }
}
