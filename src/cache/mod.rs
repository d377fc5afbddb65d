use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt::Debug;
use tracing::{debug, warn};

mod config;
mod error;
mod memory;
mod redis;

pub use config::Config;
pub use error::Error;

/// Key/value store with per-entry expiry, shared by the remote-backed
/// triggers to avoid calling an endpoint on every login.
#[async_trait]
pub trait Cache: Any + Debug + Send + Sync {
    /// Stores `value` under `key` for `expires_in` seconds.
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error>;

    /// Returns the live value stored under `key`, if any.
    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error>;
}

/// Typed access on top of [`Cache`], values are stored as JSON.
#[async_trait]
pub trait CacheExt: Cache {
    async fn retrieve<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let Some(cached) = self.retrieve_value(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<T>(&cached) {
            Ok(value) => {
                debug!("Using cached value for key: {key}");
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Failed to deserialize cached value for key {key}: {e}");
                Err(Error::Execution(format!(
                    "Failed to deserialize cached value: {e}"
                )))
            }
        }
    }

    async fn store<T>(&self, key: &str, value: &T, ttl: u64) -> Result<(), Error>
    where
        T: Serialize + Sync,
    {
        let serialized = serde_json::to_string(value).map_err(|e| {
            warn!("Failed to serialize value for caching for key {key}: {e}");
            Error::Execution(format!("Failed to serialize value for caching: {e}"))
        })?;

        self.store_value(key, &serialized, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_typed_round_trip_through_dyn_cache() {
        let cache: Arc<dyn Cache> = Config::Memory.to_backend().unwrap();

        cache
            .store("rest:casuser", &Some("mfa-duo".to_string()), 30)
            .await
            .unwrap();
        let cached: Option<Option<String>> = cache.retrieve("rest:casuser").await.unwrap();
        assert_eq!(cached, Some(Some("mfa-duo".to_string())));

        let missing: Option<Option<String>> = cache.retrieve("rest:unknown").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_retrieve_invalid_json() {
        let cache: Arc<dyn Cache> = Config::Memory.to_backend().unwrap();
        cache.store_value("broken", "{not json", 30).await.unwrap();

        let result: Result<Option<bool>, Error> = cache.retrieve("broken").await;
        assert!(matches!(result, Err(Error::Execution(_))));
    }
}
