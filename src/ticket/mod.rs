mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
pub use memory::InMemoryTicketRegistry;

/// Long-lived ticket representing an established SSO session.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TicketGrantingTicket {
    pub id: String,
    pub principal_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ServiceTicket {
    pub id: String,
    pub service: String,
    pub granting_ticket_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ticket {
    TicketGranting(TicketGrantingTicket),
    Service(ServiceTicket),
}

impl Ticket {
    pub fn id(&self) -> &str {
        match self {
            Ticket::TicketGranting(ticket) => &ticket.id,
            Ticket::Service(ticket) => &ticket.id,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let expires_at = match self {
            Ticket::TicketGranting(ticket) => ticket.expires_at,
            Ticket::Service(ticket) => ticket.expires_at,
        };
        expires_at <= now
    }
}

/// Read access to the tickets of live sessions.
///
/// Implementations scan every ticket; the cost grows with the number of
/// sessions.
#[async_trait]
pub trait TicketRegistry: Send + Sync {
    async fn get_tickets(
        &self,
        predicate: &(dyn for<'t> Fn(&'t Ticket) -> bool + Send + Sync),
    ) -> Result<Vec<Ticket>, Error>;
}
