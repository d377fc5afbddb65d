//! Authentication policies.
//!
//! A policy is a predicate over a completed [`Authentication`]. Policies never
//! mutate their input; a failed policy is reported through
//! [`PolicyExecutionResult`], while remote and scripted policies may also
//! return a typed [`Error::Security`].

mod attributes;
mod config;
mod contextual;
mod credentials;
mod handlers;
mod plan;
mod resolver;
mod rest;
mod script;
mod unique_principal;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::service::{RegisteredService, Service};

pub use attributes::RequiredAttributesPolicy;
pub use config::{PolicyConfig, PolicyKind};
pub use contextual::{
    ContextualAuthenticationPolicy, ContextualAuthenticationPolicyFactory,
    RegisteredServiceAuthenticationPolicyFactory,
};
pub use credentials::{
    AcceptAnyAuthenticationPolicy, AllCredentialsValidatedPolicy,
    AtLeastOneCredentialValidatedPolicy, NotPreventedPolicy,
};
pub use handlers::{exclude_any_of, require_any_of, HandlerPolicy};
pub use plan::{
    AuthenticationPolicyExecutionPlan, AuthenticationPolicyResolver, PolicyFailure, PolicyOutcome,
};
pub use resolver::RegisteredServiceAuthenticationPolicyResolver;
pub use rest::RestfulAuthenticationPolicy;
pub use script::ScriptedAuthenticationPolicy;
pub use unique_principal::UniquePrincipalPolicy;

/// Target of the authentication, when known.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyContext<'a> {
    pub service: Option<&'a Service>,
    pub registered_service: Option<&'a RegisteredService>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PolicyExecutionResult {
    pub satisfied: bool,
    pub value: Option<bool>,
}

impl PolicyExecutionResult {
    pub fn success() -> Self {
        Self {
            satisfied: true,
            value: Some(true),
        }
    }

    pub fn failure() -> Self {
        Self {
            satisfied: false,
            value: Some(false),
        }
    }

    pub fn from_bool(satisfied: bool) -> Self {
        if satisfied {
            Self::success()
        } else {
            Self::failure()
        }
    }
}

#[async_trait]
pub trait AuthenticationPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluation priority, ascending.
    fn order(&self) -> i32 {
        0
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        handlers: &BTreeSet<String>,
        context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error>;

    async fn is_satisfied_by(
        &self,
        authentication: &Authentication,
        handlers: &BTreeSet<String>,
        context: &PolicyContext<'_>,
    ) -> Result<bool, Error> {
        let result = self.evaluate(authentication, handlers, context).await?;
        Ok(result.satisfied)
    }
}
