use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::authentication::Authentication;
use crate::error::Error;
use crate::policy::{AuthenticationPolicy, PolicyContext, PolicyExecutionResult};

/// Satisfied when every configured attribute has a value matching its
/// pattern, looking at principal and authentication attributes together.
#[derive(Debug)]
pub struct RequiredAttributesPolicy {
    attributes: Vec<(String, Regex)>,
}

impl RequiredAttributesPolicy {
    pub fn new(attributes: &BTreeMap<String, String>) -> Result<Self, Error> {
        let attributes = attributes
            .iter()
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|regex| (name.clone(), regex))
                    .map_err(|e| {
                        Error::Initialization(format!(
                            "Invalid pattern '{pattern}' for required attribute '{name}': {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { attributes })
    }
}

#[async_trait]
impl AuthenticationPolicy for RequiredAttributesPolicy {
    fn name(&self) -> &str {
        "RequiredAttributes"
    }

    async fn evaluate(
        &self,
        authentication: &Authentication,
        _handlers: &BTreeSet<String>,
        _context: &PolicyContext<'_>,
    ) -> Result<PolicyExecutionResult, Error> {
        let merged = authentication.merged_attributes();

        for (name, pattern) in &self.attributes {
            let Some(values) = merged.get(name) else {
                debug!("Required attribute '{name}' is missing");
                return Ok(PolicyExecutionResult::failure());
            };

            if !values.iter().any(|value| pattern.is_match(value)) {
                debug!("No value of attribute '{name}' matches '{pattern}'");
                return Ok(PolicyExecutionResult::failure());
            }
        }

        Ok(PolicyExecutionResult::success())
    }
}
