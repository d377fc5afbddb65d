mod bypass;
mod config;
mod event;
mod failure_mode;
mod provider;
mod resolver;
mod selector;
pub mod trigger;

pub use bypass::{service_requests_bypass, BypassConfig, BypassRules};
pub use config::{Config, TriggersConfig};
pub use event::{Event, EventAttributes};
pub use failure_mode::{FailureMode, FailureModeEvaluator};
pub use provider::{
    MultifactorAuthenticationProvider, MultifactorAuthenticationProviders, ProviderConfig,
};
pub use resolver::{
    AuditedEventResolver, EventResolver, FlowContext, MultifactorEventResolver,
    AUTHENTICATION_EVENT,
};
pub use selector::{MultifactorAuthenticationProviderSelector, RankOrder, RankedProviderSelector};
