use std::sync::Arc;

use tracing::debug;

use crate::service::{RegisteredService, Service};

/// Lookup of the registered service responsible for a requested service.
#[cfg_attr(test, mockall::automock)]
pub trait ServicesManager: Send + Sync {
    fn find_service_by(&self, service: &Service) -> Option<Arc<RegisteredService>>;
}

#[derive(Debug, Default)]
pub struct InMemoryServicesManager {
    services: Vec<Arc<RegisteredService>>,
}

impl InMemoryServicesManager {
    pub fn new(mut services: Vec<RegisteredService>) -> Self {
        services.sort_by(|a, b| {
            a.evaluation_order
                .cmp(&b.evaluation_order)
                .then(a.id.cmp(&b.id))
        });

        Self {
            services: services.into_iter().map(Arc::new).collect(),
        }
    }
}

impl ServicesManager for InMemoryServicesManager {
    fn find_service_by(&self, service: &Service) -> Option<Arc<RegisteredService>> {
        let found = self.services.iter().find(|r| r.matches(service)).cloned();
        match &found {
            Some(registered) => debug!("Service '{service}' matched registered service '{}'", registered.name),
            None => debug!("No registered service found for '{service}'"),
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{AccessStrategy, RegisteredServiceConfig};

    fn registered(id: u64, name: &str, pattern: &str, evaluation_order: i32) -> RegisteredService {
        RegisteredService::new(&RegisteredServiceConfig {
            id,
            name: name.to_string(),
            service_id: pattern.to_string(),
            evaluation_order,
            access_strategy: AccessStrategy::default(),
            multifactor_policy: None,
            authentication_policy: None,
        })
        .unwrap()
    }

    #[test]
    fn test_lowest_evaluation_order_wins() {
        let manager = InMemoryServicesManager::new(vec![
            registered(1, "catch-all", "https://.*", 100),
            registered(2, "payroll", r"https://payroll\.example\.org/.*", 1),
        ]);

        let found = manager
            .find_service_by(&Service::new("https://payroll.example.org/home"))
            .unwrap();
        assert_eq!(found.name, "payroll");

        let found = manager
            .find_service_by(&Service::new("https://wiki.example.org/"))
            .unwrap();
        assert_eq!(found.name, "catch-all");
    }

    #[test]
    fn test_unknown_service() {
        let manager = InMemoryServicesManager::new(vec![registered(
            1,
            "payroll",
            r"https://payroll\.example\.org/.*",
            0,
        )]);

        assert!(manager
            .find_service_by(&Service::new("https://unknown.example.org/"))
            .is_none());
    }
}
