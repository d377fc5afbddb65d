use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mfa::MultifactorAuthenticationProvider;
use crate::service::RegisteredService;

/// How the login flow behaves when the provider is unavailable.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Let the user through without the second factor.
    Open,
    /// Block the login.
    Closed,
    /// Let the user through and record the provider as satisfied.
    Phantom,
    /// Skip the availability check.
    None,
    #[default]
    Undefined,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mode = match self {
            FailureMode::Open => "open",
            FailureMode::Closed => "closed",
            FailureMode::Phantom => "phantom",
            FailureMode::None => "none",
            FailureMode::Undefined => "undefined",
        };
        f.write_str(mode)
    }
}

/// Picks the effective failure mode: the service's, then the provider's,
/// then the global one.
#[derive(Clone, Copy, Debug)]
pub struct FailureModeEvaluator {
    global: FailureMode,
}

impl Default for FailureModeEvaluator {
    fn default() -> Self {
        Self {
            global: FailureMode::Closed,
        }
    }
}

impl FailureModeEvaluator {
    pub fn new(global: FailureMode) -> Self {
        let global = match global {
            FailureMode::Undefined => FailureMode::Closed,
            mode => mode,
        };
        Self { global }
    }

    pub fn evaluate(
        &self,
        registered_service: Option<&RegisteredService>,
        provider: &MultifactorAuthenticationProvider,
    ) -> FailureMode {
        let service_mode = registered_service
            .and_then(|service| service.multifactor_policy.as_ref())
            .map(|policy| policy.failure_mode)
            .filter(|mode| *mode != FailureMode::Undefined);

        service_mode
            .or(Some(provider.failure_mode).filter(|mode| *mode != FailureMode::Undefined))
            .unwrap_or(self.global)
    }
}
