use crate::{fetch::FetchError, parse::ExtractionError};
use std::fmt::{self, Display, Formatter};

#[derive(Debug)]
pub enum Error {
    UnknownHall(String),
    Fetch(FetchError),
    Extraction(ExtractionError),
    Parse(serde_json::Error),
    HoursNotFound(String),
    Config { var: &'static str, reason: String },
    Io(std::io::Error),
}

impl Error {
    pub fn config(var: &'static str, reason: impl Display) -> Self {
        Self::Config {
            var,
            reason: reason.to_string(),
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Error::Fetch(e)
    }
}

impl From<ExtractionError> for Error {
    fn from(e: ExtractionError) -> Self {
        Error::Extraction(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownHall(key) => write!(f, "Unknown dining hall: {key:?}"),
            Error::Fetch(e) => write!(f, "Fetch error: {}", e),
            Error::Extraction(e) => write!(f, "Extraction error: {}", e),
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::HoursNotFound(url) => write!(f, "No hours of operation on {url}"),
            Error::Config { var, reason } => write!(f, "Config error in {var}: {reason}"),
            Error::Io(e) => write!(f, "Io error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
