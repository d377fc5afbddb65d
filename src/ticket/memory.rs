use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::ticket::{Ticket, TicketRegistry};

#[derive(Debug, Default)]
pub struct InMemoryTicketRegistry {
    tickets: RwLock<BTreeMap<String, Ticket>>,
}

impl InMemoryTicketRegistry {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        let tickets = tickets
            .into_iter()
            .map(|ticket| (ticket.id().to_string(), ticket))
            .collect();

        Self {
            tickets: RwLock::new(tickets),
        }
    }

    pub async fn add_ticket(&self, ticket: Ticket) {
        debug!("Adding ticket '{}'", ticket.id());
        self.tickets
            .write()
            .await
            .insert(ticket.id().to_string(), ticket);
    }

    pub async fn delete_ticket(&self, id: &str) -> Option<Ticket> {
        debug!("Deleting ticket '{id}'");
        self.tickets.write().await.remove(id)
    }
}

#[async_trait]
impl TicketRegistry for InMemoryTicketRegistry {
    async fn get_tickets(
        &self,
        predicate: &(dyn for<'t> Fn(&'t Ticket) -> bool + Send + Sync),
    ) -> Result<Vec<Ticket>, Error> {
        let tickets = self.tickets.read().await;
        Ok(tickets.values().filter(|t| predicate(t)).cloned().collect())
    }
}
