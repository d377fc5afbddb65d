
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::authentication::{Attributes, Authentication, FailureKind};
use crate::error::Error;
use crate::http_client::{EndpointConfig, RestEndpoint};
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyRequest<'a> {
    principal_id: &'a str,
    attributes: &'a Attributes,
    service_id: Option<&'a str>,
}

/// Delegates the decision to a remote endpoint.
///
/// Only a `200` response satisfies the policy; any other status is mapped
/// to a security error for the principal.
pub struct RestfulAuthenticationPolicy {
    endpoint: RestEndpoint,
}

impl RestfulAuthenticationPolicy {
    pub fn new(config: EndpointConfig) -> Result<Self, Error> {
        Ok(Self {
            endpoint: RestEndpoint::new("authentication_policy", config)?,
        })
    }
}

#[async_trait]
impl AuthenticationPolicy for RestfulAuthenticationPolicy {
    fn name(&self) -> &str {
        "Restful"
    }

    #[instrument(skip_all, fields(url = %self.endpoint.url()))]
    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        let principal = &authentication.principal;
        let request = PolicyRequest {
            principal_id: &principal.id,
            attributes: &principal.attributes,
            service_id: context.service.map(|s| s.id.as_str()),
        };

        let response = self.endpoint.post_json(&request).await?;
        if response.status == 200 {
            debug!("Endpoint accepted principal '{}'", principal.id);
            return Ok(PolicyExecutionResult::success());
        }

        let kind = FailureKind::from_status_code(response.status);
        warn!(
            "Endpoint rejected principal '{}' with status {}",
            principal.id, response.status
        );
        Err(Error::security(
            kind,
            &principal.id,
            format!("policy endpoint responded with status {}", response.status),
        ))
    }
}
