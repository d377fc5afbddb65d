use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

mod error;

use crate::cache;
use crate::mfa;
use crate::policy::{PolicyConfig, PolicyKind};
use crate::service::{RegisteredServiceConfig, SelectionConfig};
pub use error::Error;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub cache: cache::Config,
    #[serde(default)]
    pub authentication: AuthenticationConfig,
    #[serde(default)]
    pub mfa: mfa::Config,
    #[serde(default)]
    pub service: Vec<RegisteredServiceConfig>,
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthenticationConfig {
    /// Policies applied to every transaction. When empty, at least one
    /// credential must be validated.
    #[serde(default)]
    pub policy: Vec<PolicyConfig>,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice)?;

        for policy in &config.authentication.policy {
            if let PolicyKind::Script { script } = &policy.kind {
                cel_interpreter::Program::compile(script)?;
            }
        }

        let mut ids = BTreeSet::new();
        for service in &config.service {
            if !ids.insert(service.id) {
                return Err(Error::Initialization(format!(
                    "Duplicate registered service id {}",
                    service.id
                )));
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mfa::FailureMode;
    use std::io::Write;

    #[test]
    fn test_load_minimal_config() {
        let config = Configuration::load_from_str("").unwrap();

        assert_eq!(config.cache, cache::Config::Memory);
        assert!(config.authentication.policy.is_empty());
        assert_eq!(config.authentication.selection.parameter, "service");
        assert_eq!(config.mfa.failure_mode, FailureMode::Undefined);
        assert!(config.mfa.providers.is_empty());
        assert!(config.service.is_empty());
        assert!(config.observability.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let config = r#"
        [cache.redis]
        url = "redis://localhost:6379/0"
        key_prefix = "cas:"

        [[authentication.policy]]
        type = "required_handlers"
        handlers = ["LdapHandler"]

        [[authentication.policy]]
        type = "script"
        order = 5
        script = "principal.id != 'blocked'"

        [authentication.selection]
        callback_prefixes = ["https://sso.example.org/oauth2/callback"]

        [mfa]
        failure_mode = "closed"

        [[mfa.provider]]
        id = "mfa-duo"

        [[service]]
        id = 1
        name = "payroll"
        service_id = "https://payroll\\.example\\.org/.*"

        [service.multifactor_policy]
        providers = ["mfa-duo"]

        [observability.tracing]
        endpoint = "http://localhost:4317"
        sampling_rate = 0.5
        "#;

        let config = Configuration::load_from_str(config).unwrap();

        assert!(matches!(config.cache, cache::Config::Redis(_)));
        assert_eq!(config.authentication.policy.len(), 2);
        assert_eq!(config.authentication.policy[1].order, 5);
        assert_eq!(config.mfa.failure_mode, FailureMode::Closed);
        assert_eq!(config.mfa.providers[0].id, "mfa-duo");
        assert_eq!(config.service[0].name, "payroll");

        let tracing = config.observability.unwrap().tracing.unwrap();
        assert_eq!(tracing.endpoint, "http://localhost:4317");
        assert!((tracing.sampling_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[mfa.provider]]\nid = \"mfa-gauth\"").unwrap();

        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.mfa.providers[0].id, "mfa-gauth");

        assert!(matches!(
            Configuration::load("/nonexistent/config.toml"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            Configuration::load_from_str("[mfa]\nfailure_mode = \"sometimes\""),
            Err(Error::ConfigurationFileFormat(_))
        ));

        let script = r#"
        [[authentication.policy]]
        type = "script"
        script = "principal.id =="
        "#;
        assert!(matches!(
            Configuration::load_from_str(script),
            Err(Error::CELPolicy(_))
        ));

        let duplicate = r#"
        [[service]]
        id = 1
        name = "a"
        service_id = ".*"

        [[service]]
        id = 1
        name = "b"
        service_id = ".*"
        "#;
        assert!(matches!(
            Configuration::load_from_str(duplicate),
            Err(Error::Initialization(_))
        ));
    }
}
