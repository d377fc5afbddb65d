use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::authentication::Attributes;
use crate::error::Error;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{MultifactorAuthenticationProvider, MultifactorAuthenticationProviders};
use crate::service::split_names;

#[derive(Clone, Debug, Deserialize)]
pub struct AttributeTriggerConfig {
    /// Comma-separated attribute names.
    pub attribute_names: String,
    /// Only used when a single provider is registered.
    pub value_regex: Option<String>,
    #[serde(default)]
    pub order: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AttributeSource {
    Principal,
    Authentication,
}

/// Activates a provider from the values of principal or authentication
/// attributes.
///
/// With a single provider and a value pattern, any matching value activates
/// that provider. Otherwise the providers are checked in registry order and
/// the first one designated by any value wins.
pub struct AttributeTrigger {
    source: AttributeSource,
    attribute_names: Vec<String>,
    value_regex: Option<Regex>,
    providers: Arc<MultifactorAuthenticationProviders>,
    order: i32,
}

impl AttributeTrigger {
    pub fn principal(
        config: &AttributeTriggerConfig,
        providers: Arc<MultifactorAuthenticationProviders>,
    ) -> Result<Self, Error> {
        Self::new(AttributeSource::Principal, config, providers)
    }

    pub fn authentication(
        config: &AttributeTriggerConfig,
        providers: Arc<MultifactorAuthenticationProviders>,
    ) -> Result<Self, Error> {
        Self::new(AttributeSource::Authentication, config, providers)
    }

    fn new(
        source: AttributeSource,
        config: &AttributeTriggerConfig,
        providers: Arc<MultifactorAuthenticationProviders>,
    ) -> Result<Self, Error> {
        let attribute_names: Vec<String> = split_names(&config.attribute_names)
            .into_iter()
            .map(str::to_string)
            .collect();
        if attribute_names.is_empty() {
            return Err(Error::Initialization(
                "Attribute trigger requires at least one attribute name".to_string(),
            ));
        }

        let value_regex = config
            .value_regex
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    Error::Initialization(format!("Invalid attribute trigger pattern '{p}': {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            source,
            attribute_names,
            value_regex,
            providers,
            order: config.order,
        })
    }

    fn values<'a>(&'a self, attributes: &'a Attributes) -> impl Iterator<Item = &'a String> + 'a {
        self.attribute_names
            .iter()
            .filter_map(|name| attributes.get(name))
            .flatten()
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for AttributeTrigger {
    fn name(&self) -> &str {
        match self.source {
            AttributeSource::Principal => "PrincipalAttribute",
            AttributeSource::Authentication => "AuthenticationAttribute",
        }
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        let attributes = match self.source {
            AttributeSource::Principal => &input.authentication.principal.attributes,
            AttributeSource::Authentication => &input.authentication.attributes,
        };

        if self.providers.len() == 1 {
            if let Some(pattern) = &self.value_regex {
                let matched = self.values(attributes).any(|value| pattern.is_match(value));
                debug!("Attribute values matched '{pattern}': {matched}");
                return Ok(if matched {
                    self.providers.iter().next().cloned()
                } else {
                    None
                });
            }
        }

        for provider in self.providers.iter() {
            if let Some(value) = self.values(attributes).find(|value| provider.matches(value)) {
                debug!("Attribute value '{value}' designates provider '{}'", provider.id);
                return Ok(Some(provider.clone()));
            }
        }

        Ok(None)
    }
}
