//! Policy backed by a CEL expression.
//!
//! The expression sees `principal`, `authentication` and `service` (the
//! requested service id, or null). It yields:
//! - `null`, `""` or `true` when the authentication is acceptable,
//! - `false` to reject it as a failed login,
//! - the name of a failure kind (e.g. `'AccountLocked'`) to reject it with
//!   that kind.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use cel_interpreter::{Context, Program, Value};
use tracing::debug;

use crate::authentication::{Authentication, FailureKind};
use crate::error::Error;
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};

fn context_error<E: fmt::Display>(error: E) -> Error {
    Error::Execution(format!("Failed to build script context: {error}"))
}

pub struct ScriptedAuthenticationPolicy {
    source: String,
    program: Program,
}

impl ScriptedAuthenticationPolicy {
    pub fn new(source: &str) -> Result<Self, Error> {
        let program = Program::compile(source).map_err(|e| {
            Error::Initialization(format!("Failed to compile policy script '{source}': {e}"))
        })?;

        Ok(Self {
            source: source.to_string(),
            program,
        })
    }

    fn build_context<'a>(
        authentication: &'a Authentication,
        context: &PolicyContext<'_>,
    ) -> Result<Context<'a>, Error> {
        let mut cel_context = Context::default();
        cel_context
            .add_variable("principal", &authentication.principal)
            .map_err(context_error)?;
        cel_context
            .add_variable("authentication", authentication)
            .map_err(context_error)?;
        cel_context
            .add_variable("service", context.service.map(|s| s.id.clone()))
            .map_err(context_error)?;
        Ok(cel_context)
    }
}

#[async_trait]
impl AuthenticationPolicy for ScriptedAuthenticationPolicy {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        let principal_id = &authentication.principal.id;
        let cel_context = Self::build_context(authentication, context)?;

        let value = self.program.execute(&cel_context).map_err(|e| {
            Error::Execution(format!("Policy script '{}' failed: {e}", self.source))
        })?;
        debug!("Policy script '{}' evaluates to {value:?}", self.source);

        match value {
            Value::Null | Value::Bool(true) => Ok(PolicyExecutionResult::success()),
            Value::String(s) if s.is_empty() => Ok(PolicyExecutionResult::success()),
            Value::Bool(false) => Err(Error::security(
                FailureKind::FailedLogin,
                principal_id,
                "rejected by policy script",
            )),
            Value::String(s) => match s.parse::<FailureKind>() {
                Ok(kind) => Err(Error::security(kind, principal_id, "rejected by policy script")),
                Err(e) => Err(Error::Execution(format!(
                    "Policy script '{}' returned an invalid result: {e}",
                    self.source
                ))),
            },
            other => Err(Error::Execution(format!(
                "Policy script '{}' returned an unsupported value: {other:?}",
                self.source
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::{AuthenticationBuilder, Principal};
    use crate::service::Service;

    async fn evaluate(source: &str) -> Result<PolicyExecutionResult, Error> {
        let policy = ScriptedAuthenticationPolicy::new(source).unwrap();
        let principal = Principal::new("casuser").with_attribute("memberOf", &["staff"]);
        let authentication = AuthenticationBuilder::new(principal)
            .add_attribute("authnContext", &["password"])
            .build();
        let service = Service::new("https://app.example.org");
        let context = PolicyContext {
            service: Some(&service),
            registered_service: None,
        };

        policy
            .evaluate(&authentication, &BTreeSet::new(), &context)
            .await
    }

    #[tokio::test]
    async fn test_success_values() {
        for source in ["null", "''", "true", "principal.id == 'casuser'"] {
            assert_eq!(
                evaluate(source).await,
                Ok(PolicyExecutionResult::success()),
                "{source}"
            );
        }
    }

    #[tokio::test]
    async fn test_false_is_failed_login() {
        let Err(Error::Security(error)) = evaluate("'admins' in principal.attributes.memberOf").await
        else {
            panic!("expected a security error");
        };
        assert_eq!(error.kind, FailureKind::FailedLogin);
    }

    #[tokio::test]
    async fn test_named_failure_kind() {
        let Err(Error::Security(error)) =
            evaluate("service == 'https://app.example.org' ? 'AccountLocked' : ''").await
        else {
            panic!("expected a security error");
        };
        assert_eq!(error.kind, FailureKind::AccountLocked);
        assert_eq!(error.principal_id.as_deref(), Some("casuser"));
    }

    #[tokio::test]
    async fn test_unknown_result() {
        assert!(matches!(evaluate("'Whatever'").await, Err(Error::Execution(_))));
        assert!(matches!(evaluate("42").await, Err(Error::Execution(_))));
    }

    #[test]
    fn test_invalid_script() {
        assert!(matches!(
            ScriptedAuthenticationPolicy::new("principal.id =="),
            Err(Error::Initialization(_))
        ));
    }
}
