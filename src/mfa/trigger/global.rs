use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{MultifactorAuthenticationProvider, MultifactorAuthenticationProviders};

/// Requires the same provider for every authenticated request.
pub struct GlobalProviderTrigger {
    provider_id: String,
    providers: Arc<MultifactorAuthenticationProviders>,
    order: i32,
}

impl GlobalProviderTrigger {
    pub fn new(provider_id: &str, providers: Arc<MultifactorAuthenticationProviders>, order: i32) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            providers,
            order,
        }
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for GlobalProviderTrigger {
    fn name(&self) -> &str {
        "GlobalProvider"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn is_activated(
        &self,
        _input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        self.providers.require(&self.provider_id).map(Some)
    }
}
