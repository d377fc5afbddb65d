use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Error;
use crate::metrics_provider::TRIGGER_EVALUATIONS;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::MultifactorAuthenticationProvider;

/// Provider activated by a chain, with the trigger that activated it.
#[derive(Clone, Debug)]
pub struct Activation {
    pub trigger: String,
    pub provider: Arc<MultifactorAuthenticationProvider>,
}

/// Ordered list of triggers, evaluated one after the other; the first
/// activation wins and later triggers are not consulted.
///
/// A trigger that fails is logged and skipped so that it cannot deny the
/// login by itself.
#[derive(Default)]
pub struct TriggerChain {
    triggers: Vec<Arc<dyn MultifactorAuthenticationTrigger>>,
}

impl TriggerChain {
    pub fn new(mut triggers: Vec<Arc<dyn MultifactorAuthenticationTrigger>>) -> Self {
        triggers.sort_by_key(|trigger| trigger.order());
        Self { triggers }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(|trigger| trigger.name())
    }

    pub async fn first_activated(&self, input: &TriggerInput<'_>) -> Option<Activation> {
        for trigger in &self.triggers {
            let name = trigger.name();
            match trigger.is_activated(input).await {
                Ok(Some(provider)) => {
                    debug!("Trigger '{name}' activated provider '{}'", provider.id);
                    TRIGGER_EVALUATIONS.with_label_values(&[name, "activated"]).inc();
                    return Some(Activation {
                        trigger: name.to_string(),
                        provider,
                    });
                }
                Ok(None) => {
                    debug!("Trigger '{name}' is not activated");
                    TRIGGER_EVALUATIONS.with_label_values(&[name, "not_activated"]).inc();
                }
                Err(e) => {
                    warn!("Trigger '{name}' failed, continuing with the next one: {e}");
                    TRIGGER_EVALUATIONS.with_label_values(&[name, "error"]).inc();
                }
            }
        }

        None
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for TriggerChain {
    fn name(&self) -> &str {
        "Chain"
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        Ok(self
            .first_activated(input)
            .await
            .map(|activation| activation.provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::Principal;
    use crate::mfa::trigger::test_support::{authentication, input, providers};
    use crate::mfa::MultifactorAuthenticationProviders;
    use crate::request::RequestContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTrigger {
        name: &'static str,
        order: i32,
        provider: Option<&'static str>,
        providers: Arc<MultifactorAuthenticationProviders>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MultifactorAuthenticationTrigger for FixedTrigger {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        async fn is_activated(
            &self,
            _input: &TriggerInput<'_>,
        ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.provider {
                Some(id) => self.providers.require(id).map(Some),
                None => Ok(None),
            }
        }
    }

    fn trigger(
        name: &'static str,
        order: i32,
        provider: Option<&'static str>,
        calls: &Arc<AtomicUsize>,
    ) -> Arc<dyn MultifactorAuthenticationTrigger> {
        Arc::new(FixedTrigger {
            name,
            order,
            provider,
            providers: providers(&[("mfa-duo", 0), ("mfa-gauth", 0)]),
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let chain = TriggerChain::new(vec![
            trigger("second", 2, Some("mfa-gauth"), &second_calls),
            trigger("first", 1, Some("mfa-duo"), &first_calls),
        ]);

        let authentication = authentication(Principal::new("casuser"));
        let request = RequestContext::default();
        let activation = chain
            .first_activated(&input(&authentication, None, &request))
            .await
            .unwrap();

        assert_eq!(activation.provider.id, "mfa-duo");
        assert_eq!(activation.trigger, "first");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_evaluation_is_identical() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = TriggerChain::new(vec![
            trigger("none", 0, None, &calls),
            trigger("gauth", 0, Some("mfa-gauth"), &calls),
            trigger("duo", 0, Some("mfa-duo"), &calls),
        ]);

        let authentication = authentication(Principal::new("casuser"));
        let request = RequestContext::default();
        let input = input(&authentication, None, &request);

        for _ in 0..5 {
            let provider = chain.is_activated(&input).await.unwrap().unwrap();
            assert_eq!(provider.id, "mfa-gauth");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_failing_trigger_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = TriggerChain::new(vec![
            trigger("absent", 0, Some("mfa-u2f"), &calls),
            trigger("duo", 1, Some("mfa-duo"), &calls),
        ]);

        let authentication = authentication(Principal::new("casuser"));
        let request = RequestContext::default();
        let provider = chain
            .is_activated(&input(&authentication, None, &request))
            .await
            .unwrap();

        assert_eq!(provider.unwrap().id, "mfa-duo");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_nothing_activated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = TriggerChain::new(vec![trigger("none", 0, None, &calls)]);

        let authentication = authentication(Principal::new("casuser"));
        let request = RequestContext::default();
        assert!(chain
            .first_activated(&input(&authentication, None, &request))
            .await
            .is_none());
        assert!(TriggerChain::default().is_empty());
    }
}
