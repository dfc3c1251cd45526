use crate::lookup::LookupError;
use thiserror::Error;

pub type RecommenderResult<T> = Result<T, RecommenderError>;

#[derive(Error, Debug)]
pub enum RecommenderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Policy table loading error: {0}")]
    ModelLoad(String),

    #[error("Patient profile validation error: {0}")]
    Validation(String),

    #[error("Policy lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RecommenderError {
    fn from(err: config::ConfigError) -> Self {
        RecommenderError::Config(err.to_string())
    }
}
