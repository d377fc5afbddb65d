use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Triggered,
    NotTriggered,
    Failed,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let outcome = match self {
            AuditOutcome::Triggered => "TRIGGERED",
            AuditOutcome::NotTriggered => "NOT_TRIGGERED",
            AuditOutcome::Failed => "FAILED",
        };
        f.write_str(outcome)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub action: String,
    pub outcome: AuditOutcome,
    pub principal: Option<String>,
    /// Event id when an event was produced, the error message on failure.
    pub resource: Option<String>,
    pub resolver: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub when: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: &str, outcome: AuditOutcome, resolver: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
            outcome,
            principal: None,
            resource: None,
            resolver: resolver.to_string(),
            client_ip: None,
            user_agent: None,
            when: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditTrail: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Writes audit records as `info` events on the `audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditTrail;

#[async_trait]
impl AuditTrail for TracingAuditTrail {
    async fn record(&self, record: AuditRecord) {
        info!(
            target: "audit",
            id = %record.id,
            action = %record.action,
            outcome = %record.outcome,
            principal = record.principal.as_deref().unwrap_or_default(),
            resource = record.resource.as_deref().unwrap_or_default(),
            resolver = %record.resolver,
            client_ip = record.client_ip.as_deref().unwrap_or_default(),
            "Audit record"
        );
    }
}

/// Keeps records in memory, in the order they were written.
#[derive(Debug, Default)]
pub struct InMemoryAuditTrail {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditTrail {
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditTrail for InMemoryAuditTrail {
    async fn record(&self, record: AuditRecord) {
        self.records.lock().await.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_trail_keeps_order() {
        let trail = InMemoryAuditTrail::default();
        trail
            .record(AuditRecord::new("AUTHENTICATION_EVENT", AuditOutcome::Triggered, "mfa"))
            .await;
        trail
            .record(AuditRecord::new("AUTHENTICATION_EVENT", AuditOutcome::Failed, "mfa"))
            .await;

        let outcomes: Vec<AuditOutcome> = trail.records().await.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, [AuditOutcome::Triggered, AuditOutcome::Failed]);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(AuditOutcome::NotTriggered).unwrap();
        assert_eq!(json, "NOT_TRIGGERED");
        assert_eq!(AuditOutcome::NotTriggered.to_string(), "NOT_TRIGGERED");
    }
}
