mod access_strategy;
mod manager;
mod selection;

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;
use crate::mfa::FailureMode;
use crate::policy::{
    exclude_any_of, require_any_of, AllCredentialsValidatedPolicy,
    AtLeastOneCredentialValidatedPolicy, AuthenticationPolicy, NotPreventedPolicy,
    RequiredAttributesPolicy,
};
pub use access_strategy::{ensure_sso_access_allowed, AccessStrategy};
pub use manager::{InMemoryServicesManager, ServicesManager};
#[cfg(test)]
pub use manager::MockServicesManager;
pub use selection::{
    DefaultServiceSelectionPlan, QueryParameterSelectionStrategy, SelectionConfig,
    ServiceSelectionPlan, ServiceSelectionStrategy,
};

/// Target service requested by the client.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Service {
    pub id: String,
}

impl Service {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Per-service authentication policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticationPolicyCriteria {
    AllowedHandlers {
        handlers: Vec<String>,
        #[serde(default)]
        try_all: bool,
    },
    ExcludedHandlers {
        handlers: Vec<String>,
    },
    AnyCredential {
        #[serde(default)]
        try_all: bool,
    },
    AllCredentials,
    NotPrevented,
    RequiredAttributes {
        attributes: std::collections::BTreeMap<String, String>,
    },
}

impl AuthenticationPolicyCriteria {
    pub fn build(&self) -> Result<Arc<dyn AuthenticationPolicy>, Error> {
        let policy: Arc<dyn AuthenticationPolicy> = match self {
            Self::AllowedHandlers { handlers, try_all } => {
                Arc::new(require_any_of(handlers.iter().cloned(), *try_all))
            }
            Self::ExcludedHandlers { handlers } => Arc::new(exclude_any_of(handlers.iter().cloned())),
            Self::AnyCredential { try_all } => {
                Arc::new(AtLeastOneCredentialValidatedPolicy::new(*try_all))
            }
            Self::AllCredentials => Arc::new(AllCredentialsValidatedPolicy),
            Self::NotPrevented => Arc::new(NotPreventedPolicy),
            Self::RequiredAttributes { attributes } => {
                Arc::new(RequiredAttributesPolicy::new(attributes)?)
            }
        };
        Ok(policy)
    }
}

/// Authentication policy of a registered service, built when the service is
/// loaded.
#[derive(Clone)]
pub struct ServiceAuthenticationPolicy {
    pub criteria: AuthenticationPolicyCriteria,
    pub policy: Arc<dyn AuthenticationPolicy>,
}

impl ServiceAuthenticationPolicy {
    pub fn new(criteria: &AuthenticationPolicyCriteria) -> Result<Self, Error> {
        Ok(Self {
            criteria: criteria.clone(),
            policy: criteria.build()?,
        })
    }
}

impl fmt::Debug for ServiceAuthenticationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ServiceAuthenticationPolicy")
            .field("criteria", &self.criteria)
            .field("policy", &self.policy.name())
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MultifactorPolicyConfig {
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub failure_mode: FailureMode,
    #[serde(default)]
    pub bypass_enabled: bool,
    pub principal_attribute_name_trigger: Option<String>,
    pub principal_attribute_value_to_match: Option<String>,
    pub bypass_principal_attribute_name: Option<String>,
    pub bypass_principal_attribute_value: Option<String>,
}

/// Multifactor requirements declared by a registered service.
#[derive(Clone, Debug, Default)]
pub struct MultifactorPolicy {
    pub providers: Vec<String>,
    pub failure_mode: FailureMode,
    pub bypass_enabled: bool,
    pub principal_attribute_name_trigger: Option<String>,
    pub principal_attribute_value_to_match: Option<Regex>,
    pub bypass_principal_attribute_name: Option<String>,
    pub bypass_principal_attribute_value: Option<Regex>,
}

impl MultifactorPolicy {
    pub fn new(config: &MultifactorPolicyConfig) -> Result<Self, Error> {
        Ok(Self {
            providers: config.providers.clone(),
            failure_mode: config.failure_mode,
            bypass_enabled: config.bypass_enabled,
            principal_attribute_name_trigger: config
                .principal_attribute_name_trigger
                .clone()
                .filter(|name| !name.trim().is_empty()),
            principal_attribute_value_to_match: compile_optional(
                config.principal_attribute_value_to_match.as_deref(),
            )?,
            bypass_principal_attribute_name: config.bypass_principal_attribute_name.clone(),
            bypass_principal_attribute_value: compile_optional(
                config.bypass_principal_attribute_value.as_deref(),
            )?,
        })
    }

    /// Configured trigger attribute names, the setting may be comma-delimited.
    pub fn trigger_attribute_names(&self) -> Vec<&str> {
        self.principal_attribute_name_trigger
            .as_deref()
            .map(split_names)
            .unwrap_or_default()
    }
}

fn compile_optional(pattern: Option<&str>) -> Result<Option<Regex>, Error> {
    pattern
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            Regex::new(p).map_err(|e| Error::Initialization(format!("Invalid regex '{p}': {e}")))
        })
        .transpose()
}

/// Splits a comma-delimited list of names, ignoring blanks.
pub fn split_names(names: &str) -> Vec<&str> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisteredServiceConfig {
    pub id: u64,
    pub name: String,
    pub service_id: String,
    #[serde(default)]
    pub evaluation_order: i32,
    #[serde(default)]
    pub access_strategy: AccessStrategy,
    pub multifactor_policy: Option<MultifactorPolicyConfig>,
    pub authentication_policy: Option<AuthenticationPolicyCriteria>,
}

/// Client application known to the server.
#[derive(Clone, Debug, Serialize)]
pub struct RegisteredService {
    pub id: u64,
    pub name: String,
    #[serde(serialize_with = "serialize_pattern")]
    pub service_id: Regex,
    pub evaluation_order: i32,
    pub access_strategy: AccessStrategy,
    #[serde(skip)]
    pub multifactor_policy: Option<MultifactorPolicy>,
    #[serde(skip)]
    pub authentication_policy: Option<ServiceAuthenticationPolicy>,
}

fn serialize_pattern<S: Serializer>(regex: &Regex, serializer: S) -> Result<S::Ok, S::Error> {
    let pattern = regex.as_str();
    let pattern = pattern
        .strip_prefix("^(?:")
        .and_then(|p| p.strip_suffix(")$"))
        .unwrap_or(pattern);
    serializer.serialize_str(pattern)
}

impl RegisteredService {
    pub fn new(config: &RegisteredServiceConfig) -> Result<Self, Error> {
        let service_id = Regex::new(&format!("^(?:{})$", config.service_id)).map_err(|e| {
            Error::Initialization(format!(
                "Invalid service id pattern for service '{}': {e}",
                config.name
            ))
        })?;

        let multifactor_policy = config
            .multifactor_policy
            .as_ref()
            .map(MultifactorPolicy::new)
            .transpose()
            .map_err(|e| {
                Error::Initialization(format!(
                    "Invalid multifactor policy for service '{}': {e}",
                    config.name
                ))
            })?;

        let authentication_policy = config
            .authentication_policy
            .as_ref()
            .map(ServiceAuthenticationPolicy::new)
            .transpose()
            .map_err(|e| {
                Error::Initialization(format!(
                    "Invalid authentication policy for service '{}': {e}",
                    config.name
                ))
            })?;

        Ok(Self {
            id: config.id,
            name: config.name.clone(),
            service_id,
            evaluation_order: config.evaluation_order,
            access_strategy: config.access_strategy.clone(),
            multifactor_policy,
            authentication_policy,
        })
    }

    pub fn matches(&self, service: &Service) -> bool {
        self.service_id.is_match(&service.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(service_id: &str) -> RegisteredServiceConfig {
        RegisteredServiceConfig {
            id: 1,
            name: "portal".to_string(),
            service_id: service_id.to_string(),
            evaluation_order: 0,
            access_strategy: AccessStrategy::default(),
            multifactor_policy: None,
            authentication_policy: None,
        }
    }

    #[test]
    fn test_service_id_is_a_full_match() {
        let service = RegisteredService::new(&config(r"https://portal\.example\.org/.*")).unwrap();

        assert!(service.matches(&Service::new("https://portal.example.org/login")));
        assert!(!service.matches(&Service::new("http://evil.org/?https://portal.example.org/")));
    }

    #[test]
    fn test_invalid_service_id() {
        let result = RegisteredService::new(&config("https://(portal"));
        assert!(matches!(result, Err(Error::Initialization(_))));
    }

    #[test]
    fn test_deserialize_with_policies() {
        let config: RegisteredServiceConfig = toml::from_str(
            r#"
            id = 7
            name = "payroll"
            service_id = "https://payroll\\.example\\.org/.*"

            [access_strategy]
            type = "default"
            sso_enabled = false

            [multifactor_policy]
            providers = ["mfa-duo", "mfa-gauth"]
            failure_mode = "open"
            principal_attribute_name_trigger = "memberOf, eduPersonAffiliation"
            principal_attribute_value_to_match = "^faculty$"

            [authentication_policy]
            type = "allowed_handlers"
            handlers = ["LdapHandler"]
            try_all = true
        "#,
        )
        .unwrap();

        let service = RegisteredService::new(&config).unwrap();
        assert!(!service.access_strategy.is_sso_allowed());

        let policy = service.multifactor_policy.unwrap();
        assert_eq!(policy.providers, ["mfa-duo", "mfa-gauth"]);
        assert_eq!(policy.failure_mode, FailureMode::Open);
        assert_eq!(
            policy.trigger_attribute_names(),
            ["memberOf", "eduPersonAffiliation"]
        );
        assert!(policy
            .principal_attribute_value_to_match
            .unwrap()
            .is_match("faculty"));

        let policy = service.authentication_policy.unwrap();
        assert_eq!(
            policy.criteria,
            AuthenticationPolicyCriteria::AllowedHandlers {
                handlers: vec!["LdapHandler".to_string()],
                try_all: true,
            }
        );
        assert_eq!(policy.policy.name(), "RequiredHandler");
    }

    #[test]
    fn test_invalid_required_attribute_pattern() {
        let mut config = config(r"https://portal\.example\.org/.*");
        config.authentication_policy = Some(AuthenticationPolicyCriteria::RequiredAttributes {
            attributes: [("memberOf".to_string(), "(".to_string())].into(),
        });

        let result = RegisteredService::new(&config);
        assert!(matches!(result, Err(Error::Initialization(message)) if message.contains("portal")));
    }

    #[test]
    fn test_serialize_exposes_pattern() {
        let service = RegisteredService::new(&config(r"https://portal\.example\.org/.*")).unwrap();
        let json = serde_json::to_value(&service).unwrap();

        assert_eq!(json["service_id"], r"https://portal\.example\.org/.*");
        assert_eq!(json["name"], "portal");
    }
}
