use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdEventError>;

#[derive(Debug, Error)]
pub enum AdEventError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid placement: {0}")]
    InvalidPlacement(String),
    #[error("not permitted: {0}")]
    NotPermitted(String),
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<toml::de::Error> for AdEventError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for AdEventError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AdEventError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
