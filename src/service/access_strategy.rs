use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::service::RegisteredService;

/// Access rules of a registered service.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessStrategy {
    Default {
        #[serde(default = "AccessStrategy::default_enabled")]
        enabled: bool,
        #[serde(default = "AccessStrategy::default_enabled")]
        sso_enabled: bool,
    },
    TimeBased {
        #[serde(default = "AccessStrategy::default_enabled")]
        enabled: bool,
        #[serde(default = "AccessStrategy::default_enabled")]
        sso_enabled: bool,
        starting_date_time: Option<DateTime<Utc>>,
        ending_date_time: Option<DateTime<Utc>>,
    },
}

impl Default for AccessStrategy {
    fn default() -> Self {
        AccessStrategy::Default {
            enabled: true,
            sso_enabled: true,
        }
    }
}

impl AccessStrategy {
    fn default_enabled() -> bool {
        true
    }

    pub fn is_service_access_allowed(&self, now: DateTime<Utc>) -> bool {
        match self {
            AccessStrategy::Default { enabled, .. } => *enabled,
            AccessStrategy::TimeBased {
                enabled,
                starting_date_time,
                ending_date_time,
                ..
            } => {
                if !enabled {
                    return false;
                }
                if starting_date_time.is_some_and(|start| now < start) {
                    return false;
                }
                !ending_date_time.is_some_and(|end| now > end)
            }
        }
    }

    pub fn is_sso_allowed(&self) -> bool {
        match self {
            AccessStrategy::Default { sso_enabled, .. }
            | AccessStrategy::TimeBased { sso_enabled, .. } => *sso_enabled,
        }
    }
}

/// Fails with [`Error::UnauthorizedSso`] when the service may not take part
/// in single sign-on at `now`.
pub fn ensure_sso_access_allowed(
    service: &RegisteredService,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    if !service.access_strategy.is_service_access_allowed(now) {
        warn!("Service '{}' is not allowed to use SSO: access disabled", service.name);
        return Err(Error::UnauthorizedSso(format!(
            "service '{}' is not enabled",
            service.name
        )));
    }

    if !service.access_strategy.is_sso_allowed() {
        warn!("Service '{}' is not allowed to use SSO", service.name);
        return Err(Error::UnauthorizedSso(format!(
            "service '{}' does not participate in single sign-on",
            service.name
        )));
    }

    Ok(())
}
