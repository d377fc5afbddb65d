use std::fmt;

use redis::RedisError;
use tracing::warn;

#[derive(Debug, PartialEq)]
pub enum Error {
    Backend(String),
    Execution(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Backend(err) | Error::Execution(err) => write!(f, "{err}"),
        }
    }
}

impl From<RedisError> for Error {
    fn from(error: RedisError) -> Self {
        warn!("Redis cache error: {error}");
        Error::Backend(format!("Redis cache unavailable ({})", error.category()))
    }
}

#[cfg(test)]
mod tests {
    use redis::RedisError;

    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::Execution("serialization failed".to_string());
        assert_eq!(format!("{error}"), "serialization failed");
    }

    #[test]
    fn test_from_redis_error_hides_details() {
        let error = RedisError::from((redis::ErrorKind::TypeError, "connection refused"));
        let error: Error = error.into();
        assert!(matches!(error, Error::Backend(msg) if !msg.contains("connection refused")));
    }
}
