use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::authentication::Principal;
use crate::mfa::MultifactorAuthenticationProvider;
use crate::service::RegisteredService;

/// Picks one provider when several are eligible.
pub trait MultifactorAuthenticationProviderSelector: Send + Sync {
    /// Deterministic for identical inputs; `None` only for an empty list.
    fn resolve(
        &self,
        providers: &[Arc<MultifactorAuthenticationProvider>],
        registered_service: Option<&RegisteredService>,
        principal: &Principal,
    ) -> Option<Arc<MultifactorAuthenticationProvider>>;
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    HighestRank,
    #[default]
    LowestRank,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RankedProviderSelector {
    order: RankOrder,
}

impl RankedProviderSelector {
    pub fn new(order: RankOrder) -> Self {
        Self { order }
    }
}

impl MultifactorAuthenticationProviderSelector for RankedProviderSelector {
    fn resolve(
        &self,
        providers: &[Arc<MultifactorAuthenticationProvider>],
        _registered_service: Option<&RegisteredService>,
        principal: &Principal,
    ) -> Option<Arc<MultifactorAuthenticationProvider>> {
        let mut ranked: Vec<&Arc<MultifactorAuthenticationProvider>> = providers.iter().collect();
        ranked.sort_by(|a, b| {
            let by_rank = match self.order {
                RankOrder::HighestRank => b.rank.cmp(&a.rank),
                RankOrder::LowestRank => a.rank.cmp(&b.rank),
            };
            by_rank.then_with(|| a.id.cmp(&b.id))
        });

        let selected = ranked.first().map(|provider| Arc::clone(provider));
        if let Some(provider) = &selected {
            debug!(
                "Selected provider '{}' out of {} for '{}'",
                provider.id,
                providers.len(),
                principal.id
            );
        }
        selected
    }
}
