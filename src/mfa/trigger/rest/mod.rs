
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::cache::{Cache, CacheExt};
use crate::error::Error;
use crate::http_client::{EndpointConfig, RestEndpoint};
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{MultifactorAuthenticationProvider, MultifactorAuthenticationProviders};

#[derive(Clone, Debug, Deserialize)]
pub struct RestTriggerConfig {
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    /// Seconds a response is reused for the same principal and service,
    /// `0` disables caching.
    #[serde(default)]
    pub cache_ttl: u64,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest<'a> {
    principal_id: &'a str,
    service_id: Option<&'a str>,
}

/// Asks a remote endpoint which provider to activate. The endpoint answers
/// `200` with the provider id as body.
///
/// Remote failures, other statuses and blank bodies never activate a
/// provider; they are logged and the trigger does not apply.
pub struct RestEndpointTrigger {
    endpoint: RestEndpoint,
    providers: Arc<MultifactorAuthenticationProviders>,
    cache: Arc<dyn Cache>,
    cache_ttl: u64,
    order: i32,
}

impl RestEndpointTrigger {
    pub fn new(
        config: RestTriggerConfig,
        providers: Arc<MultifactorAuthenticationProviders>,
        cache: Arc<dyn Cache>,
    ) -> Result<Self, Error> {
        Ok(Self {
            endpoint: RestEndpoint::new("mfa_trigger", config.endpoint)?,
            providers,
            cache,
            cache_ttl: config.cache_ttl,
            order: config.order,
        })
    }

    async fn requested_provider(&self, request: &TriggerRequest<'_>) -> Option<String> {
        let key = format!(
            "mfa-trigger:{}:{}",
            request.principal_id,
            request.service_id.unwrap_or_default()
        );

        if self.cache_ttl > 0 {
            match self.cache.retrieve::<Option<String>>(&key).await {
                Ok(Some(cached)) => return cached,
                Ok(None) => {}
                Err(e) => warn!("Ignoring cached trigger response: {e}"),
            }
        }

        let provider_id = match self.endpoint.post_json(request).await {
            Ok(response) if response.status == 200 => {
                Some(response.body.trim().to_string()).filter(|id| !id.is_empty())
            }
            Ok(response) => {
                debug!("Endpoint answered with status {}", response.status);
                return None;
            }
            Err(e) => {
                warn!("Unable to reach the trigger endpoint: {e}");
                return None;
            }
        };

        if self.cache_ttl > 0 {
            if let Err(e) = self.cache.store(&key, &provider_id, self.cache_ttl).await {
                warn!("Unable to cache trigger response: {e}");
            }
        }

        provider_id
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for RestEndpointTrigger {
    fn name(&self) -> &str {
        "RestEndpoint"
    }

    fn order(&self) -> i32 {
        self.order
    }

    #[instrument(skip_all, fields(url = %self.endpoint.url()))]
    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        let request = TriggerRequest {
            principal_id: &input.authentication.principal.id,
            service_id: input.service.map(|s| s.id.as_str()),
        };

        let Some(provider_id) = self.requested_provider(&request).await else {
            return Ok(None);
        };

        debug!("Endpoint requested provider '{provider_id}'");
        self.providers.require(&provider_id).map(Some)
    }
}
