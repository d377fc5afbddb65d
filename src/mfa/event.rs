use serde::Serialize;

use crate::authentication::Principal;
use crate::mfa::FailureMode;

/// Transition forced on the login flow, its id is the provider id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    pub attributes: EventAttributes,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventAttributes {
    pub principal: Principal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub provider: String,
    pub failure_mode: FailureMode,
    pub trigger: String,
}
