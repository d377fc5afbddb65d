use crate::{configuration, error};
use std::{fmt, io};

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Configuration(configuration::Error),
    Engine(error::Error),
    Transaction(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(err) => write!(f, "IO error: {err}"),
            Error::Configuration(err) => {
                write!(f, "Configuration error:")?;
                write!(f, "{err}")
            }
            Error::Engine(err) => write!(f, "Engine error: {err}"),
            Error::Transaction(err) => write!(f, "Invalid transaction: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IO(err)
    }
}

impl From<configuration::Error> for Error {
    fn from(err: configuration::Error) -> Self {
        Error::Configuration(err)
    }
}

impl From<error::Error> for Error {
    fn from(err: error::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Transaction(err)
    }
}
