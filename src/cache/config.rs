use std::sync::Arc;

use serde::Deserialize;

use crate::cache::{memory, redis, Cache, Error};

/// Backend for the remote lookup cache.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub enum Config {
    #[default]
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "redis")]
    Redis(redis::BackendConfig),
}

impl Config {
    pub fn to_backend(&self) -> Result<Arc<dyn Cache>, Error> {
        match self {
            Config::Redis(config) => Ok(Arc::new(redis::Backend::new(config)?)),
            Config::Memory => Ok(Arc::new(memory::Backend::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use super::*;

    #[test]
    fn test_deserialize_backends() {
        #[derive(Deserialize)]
        struct Wrapper {
            cache: Config,
        }

        let wrapper: Wrapper = toml::from_str("[cache.memory]").unwrap();
        assert_eq!(wrapper.cache, Config::Memory);

        let wrapper: Wrapper = toml::from_str(
            r#"
            [cache.redis]
            url = "redis://localhost:6379/1"
            key_prefix = "mfa:"
        "#,
        )
        .unwrap();
        assert_eq!(
            wrapper.cache,
            Config::Redis(redis::BackendConfig {
                url: "redis://localhost:6379/1".to_string(),
                key_prefix: "mfa:".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let backend = Config::Memory.to_backend().unwrap();
        assert_eq!((*backend).type_id(), TypeId::of::<memory::Backend>());
    }

    #[tokio::test]
    async fn test_redis_backend_is_lazy() {
        let config = Config::Redis(redis::BackendConfig {
            url: "redis://localhost:6379/0".to_string(),
            key_prefix: "test_cache_config".to_string(),
        });

        let backend = config.to_backend().unwrap();
        assert_eq!((*backend).type_id(), TypeId::of::<redis::Backend>());
    }

    #[test]
    fn test_redis_backend_rejects_invalid_url() {
        let config = Config::Redis(redis::BackendConfig {
            url: "not a redis url".to_string(),
            key_prefix: String::new(),
        });

        assert!(matches!(config.to_backend(), Err(Error::Backend(_))));
    }
}
