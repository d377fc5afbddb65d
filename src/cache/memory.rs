use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

use crate::cache::{Cache, Error};

const PURGE_EVERY: usize = 500;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache; expired entries are purged every few hundred operations.
#[derive(Debug)]
pub struct Backend {
    entries: RwLock<HashMap<String, Entry>>,
    operations: AtomicUsize,
}

impl Backend {
    pub fn new() -> Self {
        info!("Using in-memory cache store");
        Backend {
            entries: RwLock::new(HashMap::new()),
            operations: AtomicUsize::new(0),
        }
    }

    async fn maybe_purge(&self) {
        if self.operations.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY != 0 {
            return;
        }

        let now = Instant::now();
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl Cache for Backend {
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error> {
        self.maybe_purge().await;

        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error> {
        self.maybe_purge().await;

        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }
}
