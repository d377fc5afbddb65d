use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use hyper::Uri;
use reqwest::header::AUTHORIZATION;
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;
use crate::metrics_provider::{REST_DURATION, REST_REQUESTS};

/// Sensitive configuration value, wiped from memory on drop and never printed.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    #[cfg(test)]
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointAuth {
    BasicAuth {
        username: String,
        password: Secret<String>,
    },
    BearerToken(Secret<String>),
}

/// Remote endpoint consulted by the REST policy and the REST trigger.
#[derive(Clone, Debug, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "EndpointConfig::default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(flatten)]
    pub auth: Option<EndpointAuth>,

    pub client_certificate_bundle: Option<PathBuf>,
    pub client_private_key: Option<PathBuf>,
    pub server_ca_bundle: Option<PathBuf>,
}

impl EndpointConfig {
    fn default_timeout_ms() -> u64 {
        5000
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.client_certificate_bundle.is_some() != self.client_private_key.is_some() {
            let msg = "Both certificate and key required for mTLS".to_string();
            return Err(Error::Initialization(msg));
        }

        let uri = Uri::try_from(&self.url)
            .map_err(|e| Error::Initialization(format!("Invalid endpoint URL '{}': {e}", self.url)))?;

        if !matches!(uri.scheme_str(), Some("http" | "https")) || uri.authority().is_none() {
            return Err(Error::Initialization(format!(
                "Invalid endpoint URL '{}': an absolute http(s) URL is required",
                self.url
            )));
        }

        Ok(())
    }
}

/// Status code and body of an endpoint response.
#[derive(Debug, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: String,
}

pub struct RestEndpoint {
    name: String,
    config: EndpointConfig,
    client: Client,
}

fn load_file(path: &PathBuf) -> Result<Vec<u8>, Error> {
    std::fs::read(path)
        .map_err(|e| Error::Initialization(format!("Failed to read certificate file: {e}")))
}

fn load_identity(config: &EndpointConfig) -> Result<Option<Identity>, Error> {
    let (Some(cert_path), Some(key_path)) = (
        config.client_certificate_bundle.as_ref(),
        config.client_private_key.as_ref(),
    ) else {
        return Ok(None);
    };

    let cert_pem = load_file(cert_path)?;
    let key_pem = load_file(key_path)?;

    Identity::from_pem(&[cert_pem, key_pem].concat())
        .map(Some)
        .map_err(|e| Error::Initialization(format!("Failed to create identity from PEM: {e}")))
}

impl RestEndpoint {
    pub fn new(name: &str, config: EndpointConfig) -> Result<Self, Error> {
        config.validate()?;

        let mut client_builder = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_millis(config.timeout_ms));

        if let Some(ca_bundle) = &config.server_ca_bundle {
            let certificates = Certificate::from_pem_bundle(&load_file(ca_bundle)?)
                .map_err(|e| Error::Initialization(format!("Failed to parse certificate: {e}")))?;
            for certificate in certificates {
                client_builder = client_builder.add_root_certificate(certificate);
            }
        }

        if let Some(identity) = load_identity(&config)? {
            client_builder = client_builder.identity(identity);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::Initialization(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            config,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Posts `body` as JSON. Any HTTP status is a response; only transport
    /// failures and timeouts are errors.
    pub async fn post_json<T: Serialize + ?Sized>(&self, body: &T) -> Result<EndpointResponse, Error> {
        let mut request = self.client.post(&self.config.url).json(body);

        match &self.config.auth {
            Some(EndpointAuth::BasicAuth { username, password }) => {
                request = request.basic_auth(username, Some(password.expose()));
            }
            Some(EndpointAuth::BearerToken(token)) => {
                request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
            }
            None => {}
        }

        let timer = REST_DURATION.with_label_values(&[&self.name]).start_timer();
        let result = request.send().await;
        timer.observe_duration();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to endpoint '{}' failed: {e}", self.name);
                REST_REQUESTS.with_label_values(&[&self.name, "error"]).inc();
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Endpoint '{}' responded with status {status}", self.name);
        REST_REQUESTS
            .with_label_values(&[&self.name, &status.to_string()])
            .inc();

        Ok(EndpointResponse { status, body })
    }
}
