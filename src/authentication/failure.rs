use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of an authentication failure.
///
/// `Prevented` marks failures caused by the system rather than the user
/// (unreachable directory, misconfigured handler...).
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum FailureKind {
    FailedLogin,
    AccountDisabled,
    AccountLocked,
    AccountExpired,
    AccountNotFound,
    PasswordMustChange,
    Prevented,
    UniquePrincipalRequired,
}

impl FailureKind {
    /// Maps the status code of a remote policy endpoint to a failure kind.
    pub fn from_status_code(status: u16) -> Self {
        match status {
            403 | 405 => FailureKind::AccountDisabled,
            404 => FailureKind::AccountNotFound,
            423 => FailureKind::AccountLocked,
            412 => FailureKind::AccountExpired,
            428 => FailureKind::PasswordMustChange,
            _ => FailureKind::FailedLogin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::FailedLogin => "FailedLogin",
            FailureKind::AccountDisabled => "AccountDisabled",
            FailureKind::AccountLocked => "AccountLocked",
            FailureKind::AccountExpired => "AccountExpired",
            FailureKind::AccountNotFound => "AccountNotFound",
            FailureKind::PasswordMustChange => "PasswordMustChange",
            FailureKind::Prevented => "Prevented",
            FailureKind::UniquePrincipalRequired => "UniquePrincipalRequired",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FailedLogin" => Ok(FailureKind::FailedLogin),
            "AccountDisabled" => Ok(FailureKind::AccountDisabled),
            "AccountLocked" => Ok(FailureKind::AccountLocked),
            "AccountExpired" => Ok(FailureKind::AccountExpired),
            "AccountNotFound" => Ok(FailureKind::AccountNotFound),
            "PasswordMustChange" => Ok(FailureKind::PasswordMustChange),
            "Prevented" => Ok(FailureKind::Prevented),
            "UniquePrincipalRequired" => Ok(FailureKind::UniquePrincipalRequired),
            _ => Err(format!("Unknown failure kind '{s}'")),
        }
    }
}

/// Failure recorded by an authentication handler.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AuthenticationFailure {
    pub kind: FailureKind,
    #[serde(default)]
    pub message: String,
}

impl AuthenticationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_prevented(&self) -> bool {
        self.kind == FailureKind::Prevented
    }
}

/// Security error raised while evaluating a policy for a principal.
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityError {
    pub kind: FailureKind,
    pub principal_id: Option<String>,
    pub message: String,
}

impl SecurityError {
    pub fn new(kind: FailureKind, principal_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            principal_id: principal_id.map(ToString::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.principal_id {
            Some(id) => write!(f, "{} for '{id}': {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
