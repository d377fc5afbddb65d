use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hyper::header::{HeaderName, HeaderValue, USER_AGENT};
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Ambient HTTP request of an authentication attempt.
///
/// Passed explicitly through policies, triggers and resolvers.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub headers: HeaderMap,
    pub parameters: BTreeMap<String, Vec<String>>,
    pub session_attributes: BTreeMap<String, String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub geo_location: Option<GeoLocation>,
    pub now: DateTime<Utc>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            parameters: BTreeMap::new(),
            session_attributes: BTreeMap::new(),
            client_ip: None,
            user_agent: None,
            geo_location: None,
            now: Utc::now(),
        }
    }
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn session_attribute(&self, name: &str) -> Option<&str> {
        self.session_attributes.get(name).map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent
            .as_deref()
            .or_else(|| self.headers.get(USER_AGENT).and_then(|v| v.to_str().ok()))
    }

    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_str(name)
            .map_err(|e| Error::Execution(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Execution(format!("Invalid header value '{value}': {e}")))?;
        self.headers.append(name, value);
        Ok(())
    }
}

/// Serialized form of a request, as found in recorded transactions.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecordedRequest {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub session_attributes: BTreeMap<String, String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub geo_location: Option<GeoLocation>,
    pub now: Option<DateTime<Utc>>,
}

impl TryFrom<RecordedRequest> for RequestContext {
    type Error = Error;

    fn try_from(recorded: RecordedRequest) -> Result<Self, Self::Error> {
        let mut context = RequestContext {
            session_attributes: recorded.session_attributes,
            client_ip: recorded.client_ip,
            user_agent: recorded.user_agent,
            geo_location: recorded.geo_location,
            now: recorded.now.unwrap_or_else(Utc::now),
            ..RequestContext::default()
        };

        for (name, value) in &recorded.headers {
            context.insert_header(name, value)?;
        }

        if let Some(query) = recorded.query.as_deref() {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
                .map_err(|e| Error::Execution(format!("Invalid query string '{query}': {e}")))?;
            for (name, value) in pairs {
                context.parameters.entry(name).or_default().push(value);
            }
        }

        Ok(context)
    }
}
