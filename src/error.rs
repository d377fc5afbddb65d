use std::fmt;

use tracing::debug;

use crate::authentication::{FailureKind, SecurityError};
use crate::cache;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Execution(String),
    // business failures, mapped by the caller to flow transitions
    Security(SecurityError),
    UnauthorizedSso(String),
    NoMatchingTransition(String),
    ProviderAbsent(String),
    // backends
    Remote(String),
    Cache(cache::Error),
}

impl Error {
    pub fn security(kind: FailureKind, principal_id: &str, message: impl Into<String>) -> Self {
        Error::Security(SecurityError::new(kind, Some(principal_id), message))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) | Error::Execution(err) => write!(f, "{err}"),
            Error::Security(err) => write!(f, "Security error: {err}"),
            Error::UnauthorizedSso(err) => write!(f, "Unauthorized single sign-on: {err}"),
            Error::NoMatchingTransition(err) => write!(f, "No matching transition: {err}"),
            Error::ProviderAbsent(err) => {
                write!(f, "Multifactor authentication provider absent: {err}")
            }
            Error::Remote(err) => write!(f, "Remote endpoint error: {err}"),
            Error::Cache(err) => write!(f, "Cache error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<cache::Error> for Error {
    fn from(error: cache::Error) -> Self {
        debug!("Cache error: {error}");
        Error::Cache(error)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Remote(format!("request timed out: {error}"))
        } else {
            Error::Remote(error.to_string())
        }
    }
}

impl From<SecurityError> for Error {
    fn from(error: SecurityError) -> Self {
        Error::Security(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::UnauthorizedSso("service 'app' forbids SSO".to_string());
        assert_eq!(
            error.to_string(),
            "Unauthorized single sign-on: service 'app' forbids SSO"
        );

        let error = Error::security(FailureKind::AccountLocked, "casuser", "locked");
        assert_eq!(
            error.to_string(),
            "Security error: AccountLocked for 'casuser': locked"
        );
    }

    #[test]
    fn test_from_cache_error() {
        let error: Error = cache::Error::Backend("unreachable".to_string()).into();
        assert_eq!(
            error,
            Error::Cache(cache::Error::Backend("unreachable".to_string()))
        );
    }
}
