use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::Error;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{MultifactorAuthenticationProvider, MultifactorAuthenticationProviders};

#[derive(Clone, Debug, Deserialize)]
pub struct HttpRequestTriggerConfig {
    #[serde(default = "HttpRequestTriggerConfig::default_name")]
    pub parameter: String,
    #[serde(default = "HttpRequestTriggerConfig::default_name")]
    pub header: String,
    #[serde(default = "HttpRequestTriggerConfig::default_name")]
    pub session_attribute: String,
    #[serde(default)]
    pub order: i32,
}

impl HttpRequestTriggerConfig {
    fn default_name() -> String {
        "authn_method".to_string()
    }
}

impl Default for HttpRequestTriggerConfig {
    fn default() -> Self {
        Self {
            parameter: Self::default_name(),
            header: Self::default_name(),
            session_attribute: Self::default_name(),
            order: 0,
        }
    }
}

/// Activates the provider named by the request: a query parameter, then a
/// header, then a session attribute.
pub struct HttpRequestTrigger {
    config: HttpRequestTriggerConfig,
    providers: Arc<MultifactorAuthenticationProviders>,
}

impl HttpRequestTrigger {
    pub fn new(config: HttpRequestTriggerConfig, providers: Arc<MultifactorAuthenticationProviders>) -> Self {
        Self { config, providers }
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for HttpRequestTrigger {
    fn name(&self) -> &str {
        "HttpRequest"
    }

    fn order(&self) -> i32 {
        self.config.order
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        let request = input.request;
        let requested = request
            .parameter(&self.config.parameter)
            .or_else(|| request.header(&self.config.header))
            .or_else(|| request.session_attribute(&self.config.session_attribute))
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let Some(provider_id) = requested else {
            debug!("No provider requested by the HTTP request");
            return Ok(None);
        };

        debug!("HTTP request asks for provider '{provider_id}'");
        self.providers.require(provider_id).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::Principal;
    use crate::mfa::trigger::test_support::{authentication, input, providers};
    use crate::request::RequestContext;

    fn trigger(config: HttpRequestTriggerConfig) -> HttpRequestTrigger {
        HttpRequestTrigger::new(config, providers(&[("mfa-dummy", 0), ("mfa-duo", 0)]))
    }

    #[tokio::test]
    async fn test_configured_header() {
        let trigger = trigger(HttpRequestTriggerConfig {
            header: "X-CAS-MFA".to_string(),
            ..HttpRequestTriggerConfig::default()
        });
        let authentication = authentication(Principal::new("casuser"));

        let mut request = RequestContext::default();
        request.insert_header("X-CAS-MFA", "mfa-dummy").unwrap();
        let provider = trigger
            .is_activated(&input(&authentication, None, &request))
            .await
            .unwrap();
        assert_eq!(provider.unwrap().id, "mfa-dummy");

        let request = RequestContext::default();
        let provider = trigger
            .is_activated(&input(&authentication, None, &request))
            .await
            .unwrap();
        assert!(provider.is_none());
    }

    #[tokio::test]
    async fn test_parameter_takes_precedence() {
        let trigger = trigger(HttpRequestTriggerConfig::default());
        let authentication = authentication(Principal::new("casuser"));

        let mut request = RequestContext::default();
        request.insert_header("authn_method", "mfa-dummy").unwrap();
        request
            .parameters
            .insert("authn_method".to_string(), vec!["mfa-duo".to_string()]);
        let provider = trigger
            .is_activated(&input(&authentication, None, &request))
            .await
            .unwrap();
        assert_eq!(provider.unwrap().id, "mfa-duo");
    }

    #[tokio::test]
    async fn test_session_attribute() {
        let trigger = trigger(HttpRequestTriggerConfig::default());
        let authentication = authentication(Principal::new("casuser"));

        let mut request = RequestContext::default();
        request
            .session_attributes
            .insert("authn_method".to_string(), "mfa-duo".to_string());
        let provider = trigger
            .is_activated(&input(&authentication, None, &request))
            .await
            .unwrap();
        assert_eq!(provider.unwrap().id, "mfa-duo");
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let trigger = trigger(HttpRequestTriggerConfig::default());
        let authentication = authentication(Principal::new("casuser"));

        let mut request = RequestContext::default();
        request.insert_header("authn_method", "mfa-u2f").unwrap();
        let result = trigger
            .is_activated(&input(&authentication, None, &request))
            .await;
        assert!(matches!(result, Err(Error::ProviderAbsent(_))));
    }
}
