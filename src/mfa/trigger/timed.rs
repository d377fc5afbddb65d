use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, Timelike, Weekday};
use serde::Deserialize;
use tracing::debug;

use crate::error::Error;
use crate::mfa::trigger::{MultifactorAuthenticationTrigger, TriggerInput};
use crate::mfa::{MultifactorAuthenticationProvider, MultifactorAuthenticationProviders};

/// A time window requiring a provider. Any one condition is enough.
#[derive(Clone, Debug, Deserialize)]
pub struct TimedRule {
    pub provider_id: String,
    pub on_or_after_hour: Option<u32>,
    pub on_or_before_hour: Option<u32>,
    #[serde(default)]
    pub on_days: Vec<String>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

struct CompiledRule {
    provider: Arc<MultifactorAuthenticationProvider>,
    on_or_after_hour: Option<u32>,
    on_or_before_hour: Option<u32>,
    on_days: Vec<Weekday>,
    offset: FixedOffset,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TimedTriggerConfig {
    #[serde(default, rename = "rule")]
    pub rules: Vec<TimedRule>,
    #[serde(default)]
    pub order: i32,
}

pub struct TimedTrigger {
    rules: Vec<CompiledRule>,
    order: i32,
}

impl TimedTrigger {
    pub fn new(
        rules: &[TimedRule],
        providers: &MultifactorAuthenticationProviders,
        order: i32,
    ) -> Result<Self, Error> {
        let rules = rules
            .iter()
            .map(|rule| -> Result<CompiledRule, Error> {
                let on_days = rule
                    .on_days
                    .iter()
                    .map(|day| {
                        Weekday::from_str(day).map_err(|_| {
                            Error::Initialization(format!("Invalid day of week '{day}'"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                for hour in [rule.on_or_after_hour, rule.on_or_before_hour].into_iter().flatten() {
                    if hour > 23 {
                        return Err(Error::Initialization(format!("Invalid hour of day {hour}")));
                    }
                }

                let offset = FixedOffset::east_opt(rule.utc_offset_minutes * 60).ok_or_else(|| {
                    Error::Initialization(format!(
                        "Invalid UTC offset of {} minutes",
                        rule.utc_offset_minutes
                    ))
                })?;

                Ok(CompiledRule {
                    provider: providers.require(&rule.provider_id)?,
                    on_or_after_hour: rule.on_or_after_hour,
                    on_or_before_hour: rule.on_or_before_hour,
                    on_days,
                    offset,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { rules, order })
    }
}

#[async_trait]
impl MultifactorAuthenticationTrigger for TimedTrigger {
    fn name(&self) -> &str {
        "Timed"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn is_activated(
        &self,
        input: &TriggerInput<'_>,
    ) -> Result<Option<Arc<MultifactorAuthenticationProvider>>, Error> {
        for rule in &self.rules {
            let now = input.request.now.with_timezone(&rule.offset);
            let hour = now.hour();

            let activated = rule.on_days.contains(&now.weekday())
                || rule.on_or_before_hour.is_some_and(|before| hour <= before)
                || rule.on_or_after_hour.is_some_and(|after| hour >= after);

            if activated {
                debug!("Time {now} requires provider '{}'", rule.provider.id);
                return Ok(Some(rule.provider.clone()));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::Principal;
    use crate::mfa::trigger::test_support::{authentication, input, providers};
    use crate::request::RequestContext;
    use chrono::{TimeZone, Utc};

    fn rule(after: Option<u32>, before: Option<u32>, days: &[&str], offset: i32) -> TimedRule {
        TimedRule {
            provider_id: "mfa-duo".to_string(),
            on_or_after_hour: after,
            on_or_before_hour: before,
            on_days: days.iter().map(|d| d.to_string()).collect(),
            utc_offset_minutes: offset,
        }
    }

    async fn activated(rules: &[TimedRule], year: i32, month: u32, day: u32, hour: u32) -> bool {
        let trigger = TimedTrigger::new(rules, &providers(&[("mfa-duo", 0)]), 0).unwrap();
        let request = RequestContext {
            now: Utc.with_ymd_and_hms(year, month, day, hour, 30, 0).unwrap(),
            ..RequestContext::default()
        };
        let authentication = authentication(Principal::new("casuser"));
        trigger
            .is_activated(&input(&authentication, None, &request))
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn test_outside_office_hours() {
        let rules = [rule(Some(18), Some(7), &[], 0)];

        // 2024-06-05 is a Wednesday
        assert!(activated(&rules, 2024, 6, 5, 19).await);
        assert!(activated(&rules, 2024, 6, 5, 6).await);
        assert!(!activated(&rules, 2024, 6, 5, 12).await);
    }

    #[tokio::test]
    async fn test_days_of_week() {
        let rules = [rule(None, None, &["Saturday", "sun"], 0)];

        assert!(activated(&rules, 2024, 6, 8, 12).await);
        assert!(activated(&rules, 2024, 6, 9, 12).await);
        assert!(!activated(&rules, 2024, 6, 10, 12).await);
    }

    #[tokio::test]
    async fn test_utc_offset() {
        // 16:30 UTC is 18:30 at UTC+2
        let rules = [rule(Some(18), None, &[], 120)];
        assert!(activated(&rules, 2024, 6, 5, 16).await);

        let rules = [rule(Some(18), None, &[], 0)];
        assert!(!activated(&rules, 2024, 6, 5, 16).await);
    }

    #[test]
    fn test_invalid_rules() {
        let providers = providers(&[("mfa-duo", 0)]);

        let result = TimedTrigger::new(&[rule(Some(24), None, &[], 0)], &providers, 0);
        assert!(matches!(result, Err(Error::Initialization(_))));

        let result = TimedTrigger::new(&[rule(None, None, &["someday"], 0)], &providers, 0);
        assert!(matches!(result, Err(Error::Initialization(_))));

        let mut unknown = rule(Some(18), None, &[], 0);
        unknown.provider_id = "mfa-u2f".to_string();
        let result = TimedTrigger::new(&[unknown], &providers, 0);
        assert!(matches!(result, Err(Error::ProviderAbsent(_))));
    }
}
