use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};

#[derive(Debug, Default)]
pub struct AcceptAnyAuthenticationPolicy;

#[async_trait]
impl AuthenticationPolicy for AcceptAnyAuthenticationPolicy {
    fn name(&self) -> &str {
        "AcceptAny"
    }

    async fn evaluate(
        &self,
        _authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        Ok(PolicyExecutionResult::success())
    }
}

/// Satisfied when every submitted credential was validated.
#[derive(Debug, Default)]
pub struct AllCredentialsValidatedPolicy;

#[async_trait]
impl AuthenticationPolicy for AllCredentialsValidatedPolicy {
    fn name(&self) -> &str {
        "AllCredentialsValidated"
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        let successes = authentication.successes.len();
        let credentials = authentication.credentials.len();

        // an empty transaction proves nothing
        if credentials == 0 {
            debug!("No credentials were submitted");
            return Ok(PolicyExecutionResult::failure());
        }

        if successes != credentials {
            debug!("Only {successes} of {credentials} credentials were validated");
        }
        Ok(PolicyExecutionResult::from_bool(successes == credentials))
    }
}

/// Satisfied when at least one credential was validated.
///
/// With `try_all`, every credential must also have been attempted.
#[derive(Debug, Default)]
pub struct AtLeastOneCredentialValidatedPolicy {
    try_all: bool,
}

impl AtLeastOneCredentialValidatedPolicy {
    pub fn new(try_all: bool) -> Self {
        Self { try_all }
    }

    fn check(&self, authentication: &Authentication) -> bool {
        if self.try_all && !authentication.all_credentials_attempted() {
            debug!(
                "Number of credentials ({}) does not match the number of handler outcomes ({})",
                authentication.credentials.len(),
                authentication.successes.len() + authentication.failures.len()
            );
            return false;
        }
        !authentication.successes.is_empty()
    }
}

#[async_trait]
impl AuthenticationPolicy for AtLeastOneCredentialValidatedPolicy {
    fn name(&self) -> &str {
        "AtLeastOneCredentialValidated"
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        Ok(PolicyExecutionResult::from_bool(self.check(authentication)))
    }
}

/// Every credential attempted, at least one validated, and no failure
/// caused by the system itself.
#[derive(Debug, Default)]
pub struct NotPreventedPolicy;

#[async_trait]
impl AuthenticationPolicy for NotPreventedPolicy {
    fn name(&self) -> &str {
        "NotPrevented"
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        if let Some((handler, _)) = authentication
            .failures
            .iter()
            .find(|(_, failure)| failure.is_prevented())
        {
            debug!("Authentication was prevented by handler '{handler}'");
            return Ok(PolicyExecutionResult::failure());
        }

        let at_least_one = AtLeastOneCredentialValidatedPolicy::new(true);
        Ok(PolicyExecutionResult::from_bool(at_least_one.check(authentication)))
    }
}
