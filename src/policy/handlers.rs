use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};

#[derive(Clone, Debug, PartialEq)]
enum HandlerRule {
    RequireAnyOf(BTreeSet<String>),
    ExcludeAnyOf(BTreeSet<String>),
}

impl HandlerRule {
    fn check(&self, authentication: &Authentication) -> bool {
        match self {
            // nothing required, nothing to check
            HandlerRule::RequireAnyOf(names) if names.is_empty() => true,
            HandlerRule::RequireAnyOf(names) => {
                let found = authentication.successes.keys().any(|h| names.contains(h));
                if !found {
                    debug!("None of the required handlers {names:?} validated a credential");
                }
                found
            }
            HandlerRule::ExcludeAnyOf(names) => {
                let excluded = authentication.successes.keys().find(|h| names.contains(*h));
                if let Some(handler) = excluded {
                    debug!("Excluded handler '{handler}' validated a credential");
                }
                excluded.is_none()
            }
        }
    }
}

/// Policy over the names of the handlers that validated a credential.
///
/// Built with [`require_any_of`] and [`exclude_any_of`], combined with
/// [`HandlerPolicy::and`].
#[derive(Clone, Debug, PartialEq)]
pub struct HandlerPolicy {
    name: String,
    rules: Vec<HandlerRule>,
    try_all: bool,
}

fn names<I, S>(handlers: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    handlers.into_iter().map(Into::into).collect()
}

/// Satisfied when any of `handlers` validated a credential, or when
/// `handlers` is empty. With `try_all`, every credential must also have
/// been attempted.
pub fn require_any_of<I, S>(handlers: I, try_all: bool) -> HandlerPolicy
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HandlerPolicy {
        name: "RequiredHandler".to_string(),
        rules: vec![HandlerRule::RequireAnyOf(names(handlers))],
        try_all,
    }
}

/// Satisfied when none of `handlers` validated a credential.
pub fn exclude_any_of<I, S>(handlers: I) -> HandlerPolicy
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HandlerPolicy {
        name: "ExcludedHandler".to_string(),
        rules: vec![HandlerRule::ExcludeAnyOf(names(handlers))],
        try_all: false,
    }
}

impl HandlerPolicy {
    #[must_use]
    pub fn and(mut self, other: HandlerPolicy) -> Self {
        self.name = format!("{}+{}", self.name, other.name);
        self.rules.extend(other.rules);
        self.try_all |= other.try_all;
        self
    }
}

#[async_trait]
impl AuthenticationPolicy for HandlerPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        if self.try_all && !authentication.all_credentials_attempted() {
            debug!("Not every credential was attempted");
            return Ok(PolicyExecutionResult::failure());
        }

        let satisfied = self.rules.iter().all(|rule| rule.check(authentication));
        Ok(PolicyExecutionResult::from_bool(satisfied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::test_support::authentication;

    async fn satisfied(policy: &HandlerPolicy, authentication: &Authentication) -> bool {
        policy
            .is_satisfied_by(authentication, &BTreeSet::new(), &PolicyContext::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_require_any_of() {
        let policy = require_any_of(["LdapHandler"], false);
        assert!(satisfied(&policy, &authentication(1, &["LdapHandler"], &[])).await);
        assert!(!satisfied(&policy, &authentication(1, &["OtpHandler"], &[])).await);
    }

    #[tokio::test]
    async fn test_require_nothing_is_vacuous() {
        let policy = require_any_of(Vec::<String>::new(), false);
        assert!(satisfied(&policy, &authentication(1, &[], &["LdapHandler"])).await);
    }

    #[tokio::test]
    async fn test_require_any_of_with_try_all() {
        let policy = require_any_of(["LdapHandler"], true);
        assert!(!satisfied(&policy, &authentication(2, &["LdapHandler"], &[])).await);
        assert!(satisfied(&policy, &authentication(2, &["LdapHandler"], &["OtpHandler"])).await);
    }

    #[tokio::test]
    async fn test_exclude_is_negation_of_require() {
        let excluded = exclude_any_of(["LdapHandler"]);
        let required = require_any_of(["LdapHandler"], false);

        for auth in [
            authentication(1, &["LdapHandler"], &[]),
            authentication(1, &["OtpHandler"], &[]),
            authentication(2, &["OtpHandler", "LdapHandler"], &[]),
        ] {
            assert_eq!(
                satisfied(&excluded, &auth).await,
                !satisfied(&required, &auth).await
            );
        }
    }

    #[tokio::test]
    async fn test_combined_rules() {
        let policy = require_any_of(["LdapHandler", "JdbcHandler"], false)
            .and(exclude_any_of(["LegacyHandler"]));

        assert_eq!(policy.name(), "RequiredHandler+ExcludedHandler");
        assert!(satisfied(&policy, &authentication(1, &["JdbcHandler"], &[])).await);
        assert!(!satisfied(&policy, &authentication(2, &["JdbcHandler", "LegacyHandler"], &[])).await);
    }
}
