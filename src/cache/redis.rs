use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Deserialize;
use tracing::info;

use crate::cache::{Cache, Error};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default)]
    pub key_prefix: String,
}

/// Cache shared between nodes of a clustered deployment.
#[derive(Debug)]
pub struct Backend {
    client: redis::Client,
    key_prefix: String,
}

impl Backend {
    pub fn new(config: &BackendConfig) -> Result<Self, Error> {
        info!("Using Redis cache store");
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Backend {
            client,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

#[async_trait]
impl Cache for Backend {
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(self.prefixed(key), value, expires_in).await?;
        Ok(())
    }

    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(self.prefixed(key)).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefix() {
        let backend = Backend::new(&BackendConfig {
            url: "redis://localhost:6379/0".to_string(),
            key_prefix: "cas:mfa:".to_string(),
        })
        .unwrap();

        assert_eq!(backend.prefixed("rest:casuser"), "cas:mfa:rest:casuser");
    }
}
