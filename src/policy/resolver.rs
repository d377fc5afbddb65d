use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::authentication::AuthenticationTransaction;
use crate::error::Error;
use crate::policy::{
    AuthenticationPolicy, AuthenticationPolicyResolver, ContextualAuthenticationPolicyFactory,
};
use crate::service::{
    ensure_sso_access_allowed, RegisteredService, ServiceSelectionPlan, ServicesManager,
};

/// Supplies the authentication policy declared by the target service.
///
/// `supports` is not a pure predicate: it denies the transaction with
/// [`Error::UnauthorizedSso`] when the service may not use single sign-on,
/// before any policy is resolved.
pub struct RegisteredServiceAuthenticationPolicyResolver {
    services_manager: Arc<dyn ServicesManager>,
    selection_plan: Arc<dyn ServiceSelectionPlan>,
    factory: Arc<dyn ContextualAuthenticationPolicyFactory<Arc<RegisteredService>>>,
}

impl RegisteredServiceAuthenticationPolicyResolver {
    pub fn new(
        services_manager: Arc<dyn ServicesManager>,
        selection_plan: Arc<dyn ServiceSelectionPlan>,
        factory: Arc<dyn ContextualAuthenticationPolicyFactory<Arc<RegisteredService>>>,
    ) -> Self {
        Self {
            services_manager,
            selection_plan,
            factory,
        }
    }

    fn find_registered_service(
        &self,
        transaction: &AuthenticationTransaction,
    ) -> Option<Arc<RegisteredService>> {
        let service = transaction.service.as_ref()?;
        let resolved = self.selection_plan.resolve_service(service);
        self.services_manager.find_service_by(&resolved)
    }
}

impl AuthenticationPolicyResolver for RegisteredServiceAuthenticationPolicyResolver {
    fn name(&self) -> &str {
        "RegisteredService"
    }

    fn supports(&self, transaction: &AuthenticationTransaction) -> Result<bool, Error> {
        let Some(registered_service) = self.find_registered_service(transaction) else {
            return Ok(false);
        };

        ensure_sso_access_allowed(&registered_service, Utc::now())?;
        Ok(registered_service.authentication_policy.is_some())
    }

    fn resolve(
        &self,
        transaction: &AuthenticationTransaction,
    ) -> Result<Vec<Arc<dyn AuthenticationPolicy>>, Error> {
        let Some(registered_service) = self.find_registered_service(transaction) else {
            return Ok(Vec::new());
        };

        let name = registered_service.name.clone();
        match self.factory.create_policy(registered_service)? {
            Some(policy) => {
                debug!("Using authentication policy '{}' of service '{name}'", policy.name());
                let policy: Arc<dyn AuthenticationPolicy> = Arc::new(policy);
                Ok(vec![policy])
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RegisteredServiceAuthenticationPolicyFactory;
    use crate::service::{
        AccessStrategy, AuthenticationPolicyCriteria, DefaultServiceSelectionPlan,
        MockServicesManager, RegisteredServiceConfig, Service,
    };

    fn registered(
        access_strategy: AccessStrategy,
        criteria: Option<AuthenticationPolicyCriteria>,
    ) -> Arc<RegisteredService> {
        Arc::new(
            RegisteredService::new(&RegisteredServiceConfig {
                id: 1,
                name: "payroll".to_string(),
                service_id: r"https://payroll\.example\.org/.*".to_string(),
                evaluation_order: 0,
                access_strategy,
                multifactor_policy: None,
                authentication_policy: criteria,
            })
            .unwrap(),
        )
    }

    fn resolver(found: Option<Arc<RegisteredService>>) -> RegisteredServiceAuthenticationPolicyResolver {
        let mut manager = MockServicesManager::new();
        manager
            .expect_find_service_by()
            .returning(move |_| found.clone());

        RegisteredServiceAuthenticationPolicyResolver::new(
            Arc::new(manager),
            Arc::new(DefaultServiceSelectionPlan::default()),
            Arc::new(RegisteredServiceAuthenticationPolicyFactory),
        )
    }

    fn transaction() -> AuthenticationTransaction {
        AuthenticationTransaction::new(
            Some(Service::new("https://payroll.example.org/home")),
            Vec::new(),
        )
    }

    #[test]
    fn test_supports_service_with_criteria() {
        let resolver = resolver(Some(registered(
            AccessStrategy::default(),
            Some(AuthenticationPolicyCriteria::AllCredentials),
        )));

        assert!(resolver.supports(&transaction()).unwrap());
        let policies = resolver.resolve(&transaction()).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name(), "AllCredentialsValidated");
    }

    #[test]
    fn test_service_without_criteria() {
        let resolver = resolver(Some(registered(AccessStrategy::default(), None)));

        assert!(!resolver.supports(&transaction()).unwrap());
        assert!(resolver.resolve(&transaction()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_or_missing_service() {
        let resolver = resolver(None);
        assert!(!resolver.supports(&transaction()).unwrap());
        assert!(!resolver
            .supports(&AuthenticationTransaction::default())
            .unwrap());
    }

    #[test]
    fn test_supports_denies_unauthorized_sso() {
        let resolver = resolver(Some(registered(
            AccessStrategy::Default {
                enabled: true,
                sso_enabled: false,
            },
            Some(AuthenticationPolicyCriteria::AllCredentials),
        )));

        assert!(matches!(
            resolver.supports(&transaction()),
            Err(Error::UnauthorizedSso(_))
        ));
    }
}
