use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::trace::TraceError;
use std::{fmt, io};
use tracing::debug;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    ConfigurationFileFormat(String),
    Initialization(String),
    TracingInit(TraceError),
    ExporterInit(ExporterBuildError),
    CELPolicy(cel_interpreter::ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::ConfigurationFileFormat(error) => {
                write!(f, "Configuration file format error.")?;
                write!(f, "{error}")
            }
            Error::Initialization(error) => write!(f, "Initialization error: {error}"),
            Error::TracingInit(error) => {
                write!(f, "Tracing initialization error: {error}")
            }
            Error::ExporterInit(error) => {
                write!(f, "Exporter initialization error: {error}")
            }
            Error::CELPolicy(error) => {
                write!(f, "CEL policy error")?;
                write!(f, "{error}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        debug!("TOML error: {error}");
        Error::ConfigurationFileFormat(error.to_string())
    }
}

impl From<crate::error::Error> for Error {
    fn from(error: crate::error::Error) -> Self {
        Error::Initialization(error.to_string())
    }
}

impl From<TraceError> for Error {
    fn from(error: TraceError) -> Self {
        Error::TracingInit(error)
    }
}

impl From<ExporterBuildError> for Error {
    fn from(error: ExporterBuildError) -> Self {
        Error::ExporterInit(error)
    }
}

impl From<cel_interpreter::ParseError> for Error {
    fn from(error: cel_interpreter::ParseError) -> Self {
        Error::CELPolicy(error)
    }
}
