use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::authentication::Authentication;
use crate::error::Error;
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};
use crate::ticket::{Ticket, TicketRegistry};

/// Denies a new session when the principal already holds a live
/// ticket-granting ticket.
///
/// Every evaluation scans the whole ticket registry.
pub struct UniquePrincipalPolicy {
    registry: Arc<dyn TicketRegistry>,
}

impl UniquePrincipalPolicy {
    pub fn new(registry: Arc<dyn TicketRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl AuthenticationPolicy for UniquePrincipalPolicy {
    fn name(&self) -> &str {
        "UniquePrincipal"
    }

    #[instrument(skip_all, fields(principal = %authentication.principal.id))]
    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        let principal_id = authentication.principal.id.to_lowercase();
        let now = Utc::now();

        let sessions = self
            .registry
            .get_tickets(&|ticket: &Ticket| match ticket {
                Ticket::TicketGranting(tgt) => {
                    !ticket.is_expired(now) && tgt.principal_id.to_lowercase() == principal_id
                }
                Ticket::Service(_) => false,
            })
            .await?;

        if sessions.is_empty() {
            return Ok(PolicyExecutionResult::success());
        }

        debug!(
            "Principal '{}' already has {} live session(s)",
            authentication.principal.id,
            sessions.len()
        );
        Ok(PolicyExecutionResult::failure())
    }
}
