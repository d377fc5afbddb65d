use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::service::Service;

/// Rewrites a requested service before it is looked up.
pub trait ServiceSelectionStrategy: Send + Sync {
    fn supports(&self, service: &Service) -> bool;
    fn resolve(&self, service: &Service) -> Service;
}

pub trait ServiceSelectionPlan: Send + Sync {
    fn resolve_service(&self, service: &Service) -> Service;
}

#[derive(Clone, Debug, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub callback_prefixes: Vec<String>,
    #[serde(default = "SelectionConfig::default_parameter")]
    pub parameter: String,
}

impl SelectionConfig {
    fn default_parameter() -> String {
        "service".to_string()
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            callback_prefixes: Vec::new(),
            parameter: Self::default_parameter(),
        }
    }
}

/// Unwraps the real target of protocol callback URLs, e.g.
/// `https://sso.example.org/oauth2/callback?service=https://app.example.org/`.
pub struct QueryParameterSelectionStrategy {
    prefixes: Vec<String>,
    parameter: String,
}

impl QueryParameterSelectionStrategy {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            prefixes: config.callback_prefixes.clone(),
            parameter: config.parameter.clone(),
        }
    }

    fn nested_service(&self, service: &Service) -> Option<String> {
        let (_, query) = service.id.split_once('?')?;
        let query = query.split('#').next().unwrap_or_default();
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;

        pairs
            .into_iter()
            .find(|(name, value)| name == &self.parameter && !value.is_empty())
            .map(|(_, value)| value)
    }
}

impl ServiceSelectionStrategy for QueryParameterSelectionStrategy {
    fn supports(&self, service: &Service) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| service.id.starts_with(prefix.as_str()))
            && self.nested_service(service).is_some()
    }

    fn resolve(&self, service: &Service) -> Service {
        match self.nested_service(service) {
            Some(id) => Service::new(id),
            None => service.clone(),
        }
    }
}

/// Runs the strategies in order; the first supporting one wins.
#[derive(Default)]
pub struct DefaultServiceSelectionPlan {
    strategies: Vec<Arc<dyn ServiceSelectionStrategy>>,
}

impl DefaultServiceSelectionPlan {
    pub fn new(strategies: Vec<Arc<dyn ServiceSelectionStrategy>>) -> Self {
        Self { strategies }
    }
}

impl ServiceSelectionPlan for DefaultServiceSelectionPlan {
    fn resolve_service(&self, service: &Service) -> Service {
        for strategy in &self.strategies {
            if strategy.supports(service) {
                let resolved = strategy.resolve(service);
                debug!("Resolved service '{service}' to '{resolved}'");
                return resolved;
            }
        }
        service.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DefaultServiceSelectionPlan {
        let config = SelectionConfig {
            callback_prefixes: vec!["https://sso.example.org/oauth2/callback".to_string()],
            parameter: SelectionConfig::default_parameter(),
        };
        DefaultServiceSelectionPlan::new(vec![Arc::new(QueryParameterSelectionStrategy::new(
            &config,
        ))])
    }

    #[test]
    fn test_unwraps_callback_service() {
        let service = Service::new(
            "https://sso.example.org/oauth2/callback?client_id=app&service=https%3A%2F%2Fapp.example.org%2Fhome",
        );

        assert_eq!(
            plan().resolve_service(&service),
            Service::new("https://app.example.org/home")
        );
    }

    #[test]
    fn test_keeps_other_services() {
        let service = Service::new("https://app.example.org/?service=https://other.example.org/");
        assert_eq!(plan().resolve_service(&service), service);

        let service = Service::new("https://sso.example.org/oauth2/callback?client_id=app");
        assert_eq!(plan().resolve_service(&service), service);
    }
}
