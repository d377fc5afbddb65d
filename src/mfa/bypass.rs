use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::authentication::{Attributes, Authentication, AUTHENTICATION_METHOD};
use crate::error::Error;
use crate::request::RequestContext;
use crate::service::{split_names, RegisteredService};

/// Conditions under which a provider is skipped.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BypassConfig {
    pub principal_attribute_name: Option<String>,
    pub principal_attribute_value: Option<String>,
    pub authentication_attribute_name: Option<String>,
    pub authentication_attribute_value: Option<String>,
    pub authentication_handler_name: Option<String>,
    pub authentication_method_name: Option<String>,
    pub credential_type: Option<String>,
    /// Comma-separated header names.
    pub http_request_headers: Option<String>,
    pub http_request_remote_address: Option<String>,
}

#[derive(Debug)]
struct AttributeRule {
    name: String,
    value: Option<Regex>,
}

impl AttributeRule {
    fn new(name: Option<&str>, value: Option<&str>) -> Result<Option<Self>, Error> {
        let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            name: name.to_string(),
            value: compile(value)?,
        }))
    }

    /// Present attribute with no pattern, or any value matching the pattern.
    fn matches(&self, attributes: &Attributes) -> bool {
        let Some(values) = attributes.get(&self.name) else {
            return false;
        };

        match &self.value {
            Some(pattern) => values.iter().any(|value| pattern.is_match(value)),
            None => !values.is_empty(),
        }
    }
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>, Error> {
    pattern
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            Regex::new(p)
                .map_err(|e| Error::Initialization(format!("Invalid bypass pattern '{p}': {e}")))
        })
        .transpose()
}

#[derive(Debug, Default)]
pub struct BypassRules {
    principal_attribute: Option<AttributeRule>,
    authentication_attribute: Option<AttributeRule>,
    authentication_handler: Option<Regex>,
    authentication_method: Option<Regex>,
    credential_type: Option<Regex>,
    http_request_headers: Vec<String>,
    remote_address: Option<Regex>,
}

impl BypassRules {
    pub fn new(config: &BypassConfig) -> Result<Self, Error> {
        Ok(Self {
            principal_attribute: AttributeRule::new(
                config.principal_attribute_name.as_deref(),
                config.principal_attribute_value.as_deref(),
            )?,
            authentication_attribute: AttributeRule::new(
                config.authentication_attribute_name.as_deref(),
                config.authentication_attribute_value.as_deref(),
            )?,
            authentication_handler: compile(config.authentication_handler_name.as_deref())?,
            authentication_method: compile(config.authentication_method_name.as_deref())?,
            credential_type: compile(config.credential_type.as_deref())?,
            http_request_headers: config
                .http_request_headers
                .as_deref()
                .map(split_names)
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect(),
            remote_address: compile(config.http_request_remote_address.as_deref())?,
        })
    }

    /// Whether any configured condition holds for this attempt.
    pub fn should_bypass(&self, authentication: &Authentication, request: &RequestContext) -> bool {
        let principal = &authentication.principal;

        if let Some(rule) = &self.principal_attribute {
            if rule.matches(&principal.attributes) {
                debug!("Bypass: principal attribute '{}' matches", rule.name);
                return true;
            }
        }

        if let Some(rule) = &self.authentication_attribute {
            if rule.matches(&authentication.attributes) {
                debug!("Bypass: authentication attribute '{}' matches", rule.name);
                return true;
            }
        }

        if let Some(pattern) = &self.authentication_handler {
            if authentication.successes.keys().any(|h| pattern.is_match(h)) {
                debug!("Bypass: authentication handler matches '{pattern}'");
                return true;
            }
        }

        if let Some(pattern) = &self.authentication_method {
            let methods = authentication.attribute_values(AUTHENTICATION_METHOD);
            if methods.iter().any(|m| pattern.is_match(m)) {
                debug!("Bypass: authentication method matches '{pattern}'");
                return true;
            }
        }

        if let Some(pattern) = &self.credential_type {
            if authentication
                .credentials
                .iter()
                .any(|c| pattern.is_match(&c.credential_type))
            {
                debug!("Bypass: credential type matches '{pattern}'");
                return true;
            }
        }

        if let Some(header) = self
            .http_request_headers
            .iter()
            .find(|name| request.headers.contains_key(name.as_str()))
        {
            debug!("Bypass: request carries header '{header}'");
            return true;
        }

        if let (Some(pattern), Some(client_ip)) = (&self.remote_address, &request.client_ip) {
            if pattern.is_match(client_ip) {
                debug!("Bypass: remote address '{client_ip}' matches");
                return true;
            }
        }

        false
    }
}

/// Bypass declared by the registered service itself.
pub fn service_requests_bypass(
    registered_service: Option<&RegisteredService>,
    authentication: &Authentication,
) -> bool {
    let Some(policy) = registered_service.and_then(|s| s.multifactor_policy.as_ref()) else {
        return false;
    };

    if policy.bypass_enabled {
        debug!("Bypass: multifactor authentication is disabled for this service");
        return true;
    }

    let Some(name) = policy.bypass_principal_attribute_name.as_deref() else {
        return false;
    };
    let values = authentication.principal.attribute_values(name);
    let matched = match &policy.bypass_principal_attribute_value {
        Some(pattern) => values.iter().any(|v| pattern.is_match(v)),
        None => !values.is_empty(),
    };
    if matched {
        debug!("Bypass: service bypass attribute '{name}' matches");
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::{AuthenticationBuilder, CredentialMetaData, HandlerResult, Principal};
    use crate::service::{AccessStrategy, MultifactorPolicyConfig, RegisteredServiceConfig};

    fn authentication() -> Authentication {
        let principal = Principal::new("casuser")
            .with_attribute("memberOf", &["staff"])
            .with_attribute("mfaExempt", &["true"]);
        AuthenticationBuilder::new(principal)
            .add_credential(CredentialMetaData::new("casuser", "UsernamePassword"))
            .add_success("LdapHandler", HandlerResult::default())
            .add_attribute("authnContext", &["urn:password"])
            .build()
    }

    fn rules(config: BypassConfig) -> BypassRules {
        BypassRules::new(&config).unwrap()
    }

    #[test]
    fn test_no_rules_never_bypass() {
        assert!(!rules(BypassConfig::default()).should_bypass(&authentication(), &RequestContext::default()));
    }

    #[test]
    fn test_principal_attribute() {
        let request = RequestContext::default();
        let matching = rules(BypassConfig {
            principal_attribute_name: Some("memberOf".to_string()),
            principal_attribute_value: Some("^staff$".to_string()),
            ..BypassConfig::default()
        });
        assert!(matching.should_bypass(&authentication(), &request));

        let presence_only = rules(BypassConfig {
            principal_attribute_name: Some("mfaExempt".to_string()),
            ..BypassConfig::default()
        });
        assert!(presence_only.should_bypass(&authentication(), &request));

        let other_value = rules(BypassConfig {
            principal_attribute_name: Some("memberOf".to_string()),
            principal_attribute_value: Some("^faculty$".to_string()),
            ..BypassConfig::default()
        });
        assert!(!other_value.should_bypass(&authentication(), &request));
    }

    #[test]
    fn test_authentication_details() {
        let request = RequestContext::default();
        for config in [
            BypassConfig {
                authentication_attribute_name: Some("authnContext".to_string()),
                authentication_attribute_value: Some("password".to_string()),
                ..BypassConfig::default()
            },
            BypassConfig {
                authentication_handler_name: Some("^Ldap.*".to_string()),
                ..BypassConfig::default()
            },
            BypassConfig {
                authentication_method_name: Some("LdapHandler".to_string()),
                ..BypassConfig::default()
            },
            BypassConfig {
                credential_type: Some("UsernamePassword".to_string()),
                ..BypassConfig::default()
            },
        ] {
            assert!(rules(config).should_bypass(&authentication(), &request));
        }
    }

    #[test]
    fn test_request_headers_and_address() {
        let mut request = RequestContext {
            client_ip: Some("192.168.1.20".to_string()),
            ..RequestContext::default()
        };

        let by_header = rules(BypassConfig {
            http_request_headers: Some("X-Internal, X-Trusted".to_string()),
            ..BypassConfig::default()
        });
        assert!(!by_header.should_bypass(&authentication(), &request));
        request.insert_header("x-trusted", "1").unwrap();
        assert!(by_header.should_bypass(&authentication(), &request));

        let by_address = rules(BypassConfig {
            http_request_remote_address: Some(r"^192\.168\.".to_string()),
            ..BypassConfig::default()
        });
        assert!(by_address.should_bypass(&authentication(), &request));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = BypassConfig {
            credential_type: Some("(".to_string()),
            ..BypassConfig::default()
        };
        assert!(matches!(BypassRules::new(&config), Err(Error::Initialization(_))));
    }

    #[test]
    fn test_service_bypass() {
        let service = |policy: MultifactorPolicyConfig| {
            RegisteredService::new(&RegisteredServiceConfig {
                id: 1,
                name: "portal".to_string(),
                service_id: ".*".to_string(),
                evaluation_order: 0,
                access_strategy: AccessStrategy::default(),
                multifactor_policy: Some(policy),
                authentication_policy: None,
            })
            .unwrap()
        };

        let disabled = service(MultifactorPolicyConfig {
            bypass_enabled: true,
            ..MultifactorPolicyConfig::default()
        });
        assert!(service_requests_bypass(Some(&disabled), &authentication()));

        let by_attribute = service(MultifactorPolicyConfig {
            bypass_principal_attribute_name: Some("memberOf".to_string()),
            bypass_principal_attribute_value: Some("staff".to_string()),
            ..MultifactorPolicyConfig::default()
        });
        assert!(service_requests_bypass(Some(&by_attribute), &authentication()));

        let enforced = service(MultifactorPolicyConfig::default());
        assert!(!service_requests_bypass(Some(&enforced), &authentication()));
        assert!(!service_requests_bypass(None, &authentication()));
    }
}
