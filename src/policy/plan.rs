use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::authentication::{Authentication, AuthenticationTransaction, FailureKind};
use crate::error::Error;
use crate::metrics_provider::POLICY_EVALUATIONS;
use crate::policy::{AuthenticationPolicy, PolicyContext};

/// Supplies additional policies for the transactions it supports.
pub trait AuthenticationPolicyResolver: Send + Sync {
    fn name(&self) -> &str;

    /// May fail instead of answering, e.g. when the target service is not
    /// allowed to take part in single sign-on.
    fn supports(&self, transaction: &AuthenticationTransaction) -> Result<bool, Error>;

    fn resolve(
        &self,
        transaction: &AuthenticationTransaction,
    ) -> Result<Vec<Arc<dyn AuthenticationPolicy>>, Error>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyFailure {
    pub policy: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

/// Aggregated result of every policy of a transaction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyOutcome {
    pub satisfied: bool,
    pub failures: Vec<PolicyFailure>,
}

#[derive(Default)]
pub struct AuthenticationPolicyExecutionPlan {
    policies: Vec<Arc<dyn AuthenticationPolicy>>,
    resolvers: Vec<Arc<dyn AuthenticationPolicyResolver>>,
}

impl AuthenticationPolicyExecutionPlan {
    pub fn new(
        mut policies: Vec<Arc<dyn AuthenticationPolicy>>,
        resolvers: Vec<Arc<dyn AuthenticationPolicyResolver>>,
    ) -> Self {
        policies.sort_by_key(|policy| policy.order());
        Self {
            policies,
            resolvers,
        }
    }

    /// Static policies followed by those of every supporting resolver, in
    /// ascending order.
    pub fn policies_for(
        &self,
        transaction: &AuthenticationTransaction,
    ) -> Result<Vec<Arc<dyn AuthenticationPolicy>>, Error> {
        let mut policies = self.policies.clone();

        for resolver in &self.resolvers {
            if resolver.supports(transaction)? {
                let resolved = resolver.resolve(transaction)?;
                debug!(
                    "Resolver '{}' supplied {} policies",
                    resolver.name(),
                    resolved.len()
                );
                policies.extend(resolved);
            }
        }

        policies.sort_by_key(|policy| policy.order());
        Ok(policies)
    }

    /// Runs every policy. Errors raised by a policy count as failures of
    /// that policy; errors raised while resolving policies are returned.
    #[instrument(skip_all, fields(principal = %authentication.principal.id))]
    pub async fn evaluate(
        &self,
        transaction: &AuthenticationTransaction,
        authentication: &Authentication,
    ) -> Result<PolicyOutcome, Error> {
        let policies = self.policies_for(transaction)?;

        let handlers: BTreeSet<String> = authentication
            .successes
            .keys()
            .chain(authentication.failures.keys())
            .cloned()
            .collect();
        let context = PolicyContext {
            service: transaction.service.as_ref(),
            registered_service: None,
        };

        let mut failures = Vec::new();
        for policy in policies {
            let name = policy.name().to_string();
            match policy.evaluate(authentication, &handlers, &context).await {
                Ok(result) if result.satisfied => {
                    debug!("Policy '{name}' is satisfied");
                    POLICY_EVALUATIONS.with_label_values(&[&name, "satisfied"]).inc();
                }
                Ok(_) => {
                    debug!("Policy '{name}' is not satisfied");
                    POLICY_EVALUATIONS.with_label_values(&[&name, "unsatisfied"]).inc();
                    failures.push(PolicyFailure {
                        policy: name,
                        message: "policy is not satisfied".to_string(),
                        kind: None,
                    });
                }
                Err(e) => {
                    warn!("Policy '{name}' failed: {e}");
                    POLICY_EVALUATIONS.with_label_values(&[&name, "error"]).inc();
                    let kind = match &e {
                        Error::Security(error) => Some(error.kind),
                        _ => None,
                    };
                    failures.push(PolicyFailure {
                        policy: name,
                        message: e.to_string(),
                        kind,
                    });
                }
            }
        }

        Ok(PolicyOutcome {
            satisfied: failures.is_empty(),
            failures,
        })
    }
}
