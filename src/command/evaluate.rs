use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use argh::FromArgs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditRecord, InMemoryAuditTrail};
use crate::authentication::{Authentication, AuthenticationTransaction};
use crate::command;
use crate::configuration::Configuration;
use crate::engine::{registered_services, Engine};
use crate::metrics_provider::METRICS_PROVIDER;
use crate::mfa::Event;
use crate::policy::PolicyOutcome;
use crate::request::{RecordedRequest, RequestContext};
use crate::service::{InMemoryServicesManager, Service};
use crate::ticket::{InMemoryTicketRegistry, Ticket};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "evaluate",
    description = "Evaluate policies and multifactor triggers against a recorded transaction"
)]
pub struct Options {
    #[argh(option, short = 't')]
    /// path to the JSON transaction to evaluate
    pub transaction: String,
    #[argh(switch)]
    /// print the metrics collected during the evaluation
    pub metrics: bool,
}

/// A completed authentication and the request it was made in.
#[derive(Debug, Deserialize)]
pub struct RecordedTransaction {
    pub service: Option<String>,
    pub authentication: Authentication,
    #[serde(default)]
    pub request: RecordedRequest,
    /// Live tickets, as seen by the ticket registry.
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    pub transitions: Option<BTreeSet<String>>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub policy: Option<PolicyOutcome>,
    pub event: Option<Event>,
    pub error: Option<String>,
    pub audit: Vec<AuditRecord>,
}

pub struct Command {
    config: Configuration,
    transaction: String,
    metrics: bool,
}

impl Command {
    pub fn new(options: &Options, config: Configuration) -> Self {
        Self {
            config,
            transaction: options.transaction.clone(),
            metrics: options.metrics,
        }
    }

    pub async fn run(&self) -> Result<(), command::Error> {
        let recorded: RecordedTransaction =
            serde_json::from_str(&fs::read_to_string(&self.transaction)?)?;
        let report = self.evaluate(recorded).await?;

        println!("{}", serde_json::to_string_pretty(&report)?);
        if self.metrics {
            let (_, metrics) = METRICS_PROVIDER.gather()?;
            println!("{}", String::from_utf8_lossy(&metrics));
        }
        Ok(())
    }

    /// Policies run first; multifactor resolution only follows a satisfied
    /// policy outcome.
    pub async fn evaluate(&self, recorded: RecordedTransaction) -> Result<Report, command::Error> {
        let audit_trail = Arc::new(InMemoryAuditTrail::default());
        let engine = Engine::new(
            &self.config,
            Arc::new(InMemoryServicesManager::new(registered_services(&self.config)?)),
            Arc::new(InMemoryTicketRegistry::new(recorded.tickets)),
            None,
            audit_trail.clone(),
        )?;

        let service = recorded.service.map(Service::new);
        let authentication = recorded.authentication;
        let transaction =
            AuthenticationTransaction::new(service.clone(), authentication.credentials.clone());

        let mut report = Report {
            policy: None,
            event: None,
            error: None,
            audit: Vec::new(),
        };

        match engine.evaluate_policies(&transaction, &authentication).await {
            Ok(outcome) if outcome.satisfied => {
                report.policy = Some(outcome);

                let request = RequestContext::try_from(recorded.request)?;
                let context = engine.flow_context(
                    service,
                    Some(authentication),
                    request,
                    recorded.transitions,
                );
                match engine.resolve_event(&context).await {
                    Ok(event) => report.event = event,
                    Err(e) => {
                        warn!("Unable to resolve multifactor event: {e}");
                        report.error = Some(e.to_string());
                    }
                }
            }
            Ok(outcome) => {
                info!("{} policies are not satisfied", outcome.failures.len());
                report.policy = Some(outcome);
            }
            Err(e) => {
                warn!("Unable to evaluate policies: {e}");
                report.error = Some(e.to_string());
            }
        }

        report.audit = audit_trail.records().await;
        Ok(report)
    }
}
