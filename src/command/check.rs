use std::sync::Arc;

use argh::FromArgs;
use tracing::info;

use crate::audit::TracingAuditTrail;
use crate::command;
use crate::configuration::Configuration;
use crate::engine::{registered_services, Engine};
use crate::service::InMemoryServicesManager;
use crate::ticket::InMemoryTicketRegistry;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "check",
    description = "Validate the configuration by building every policy, provider and trigger"
)]
pub struct Options {}

pub struct Command {
    config: Configuration,
}

impl Command {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<(), command::Error> {
        let services = registered_services(&self.config)?;
        let service_count = services.len();

        Engine::new(
            &self.config,
            Arc::new(InMemoryServicesManager::new(services)),
            Arc::new(InMemoryTicketRegistry::default()),
            None,
            Arc::new(TracingAuditTrail),
        )?;

        info!("Configuration is valid");
        println!(
            "Configuration is valid: {} policies, {} registered services, {} multifactor providers",
            self.config.authentication.policy.len(),
            service_count,
            self.config.mfa.providers.len()
        );
        Ok(())
    }
}
