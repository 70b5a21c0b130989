use thiserror::Error;

use crate::config::ConfigError;
use crate::infra::error::InfraError;

/// Top-level application error for startup and lifecycle paths.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unhandled failure: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
