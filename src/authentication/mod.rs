mod failure;
mod principal;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::service::Service;
pub use failure::{AuthenticationFailure, FailureKind, SecurityError};
pub use principal::Principal;

/// Attribute name listing the handlers that validated a credential.
pub const SUCCESSFUL_AUTHENTICATION_HANDLERS: &str = "successfulAuthenticationHandlers";
/// Attribute name recording the authentication method(s) used.
pub const AUTHENTICATION_METHOD: &str = "authenticationMethod";

/// Multi-valued attributes, ordered by name.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Metadata of a credential submitted in a transaction.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CredentialMetaData {
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
}

impl CredentialMetaData {
    pub fn new(id: impl Into<String>, credential_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential_type: credential_type.into(),
        }
    }
}

/// Success metadata produced by an authentication handler.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct HandlerResult {
    #[serde(default)]
    pub credential_type: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Outcome of one authentication transaction.
///
/// Built once by the authentication machinery, read-only afterwards.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Authentication {
    pub principal: Principal,
    #[serde(default)]
    pub credentials: Vec<CredentialMetaData>,
    #[serde(default)]
    pub successes: BTreeMap<String, HandlerResult>,
    #[serde(default)]
    pub failures: BTreeMap<String, AuthenticationFailure>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default = "Utc::now")]
    pub authentication_date: DateTime<Utc>,
}

impl Authentication {
    /// Principal attributes merged with the authentication attributes.
    ///
    /// Values keep their order, principal values first, duplicates dropped.
    pub fn merged_attributes(&self) -> Attributes {
        let mut merged = self.principal.attributes.clone();
        for (name, values) in &self.attributes {
            let entry = merged.entry(name.clone()).or_default();
            for value in values {
                if !entry.contains(value) {
                    entry.push(value.clone());
                }
            }
        }
        merged
    }

    /// Whether every submitted credential has a recorded outcome.
    pub fn all_credentials_attempted(&self) -> bool {
        self.successes.len() + self.failures.len() == self.credentials.len()
    }

    pub fn attribute_values(&self, name: &str) -> &[String] {
        self.attributes.get(name).map_or(&[], Vec::as_slice)
    }
}

pub struct AuthenticationBuilder {
    principal: Principal,
    credentials: Vec<CredentialMetaData>,
    successes: BTreeMap<String, HandlerResult>,
    failures: BTreeMap<String, AuthenticationFailure>,
    attributes: Attributes,
    authentication_date: DateTime<Utc>,
}

impl AuthenticationBuilder {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            credentials: Vec::new(),
            successes: BTreeMap::new(),
            failures: BTreeMap::new(),
            attributes: Attributes::new(),
            authentication_date: Utc::now(),
        }
    }

    #[must_use]
    pub fn add_credential(mut self, credential: CredentialMetaData) -> Self {
        self.credentials.push(credential);
        self
    }

    #[must_use]
    pub fn add_success(mut self, handler_name: &str, result: HandlerResult) -> Self {
        self.successes.insert(handler_name.to_string(), result);
        self.push_attribute_value(SUCCESSFUL_AUTHENTICATION_HANDLERS, handler_name);
        self.push_attribute_value(AUTHENTICATION_METHOD, handler_name);
        self
    }

    #[must_use]
    pub fn add_failure(mut self, handler_name: &str, failure: AuthenticationFailure) -> Self {
        self.failures.insert(handler_name.to_string(), failure);
        self
    }

    #[must_use]
    pub fn add_attribute(mut self, name: &str, values: &[&str]) -> Self {
        for value in values {
            self.push_attribute_value(name, value);
        }
        self
    }

    #[must_use]
    pub fn authentication_date(mut self, date: DateTime<Utc>) -> Self {
        self.authentication_date = date;
        self
    }

    fn push_attribute_value(&mut self, name: &str, value: &str) {
        let values = self.attributes.entry(name.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    pub fn build(self) -> Authentication {
        Authentication {
            principal: self.principal,
            credentials: self.credentials,
            successes: self.successes,
            failures: self.failures,
            attributes: self.attributes,
            authentication_date: self.authentication_date,
        }
    }
}

/// Credentials submitted for a target service, before policies apply.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AuthenticationTransaction {
    #[serde(default)]
    pub service: Option<Service>,
    #[serde(default)]
    pub credentials: Vec<CredentialMetaData>,
}

impl AuthenticationTransaction {
    pub fn new(service: Option<Service>, credentials: Vec<CredentialMetaData>) -> Self {
        Self {
            service,
            credentials,
        }
    }
}
