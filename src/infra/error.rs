use thiserror::Error;

/// Failures raised while bringing infrastructure up or talking to it
/// outside a request: pool setup, migrations, storage directories,
/// subscriber installation.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("database unavailable: {0}")]
    Database(String),
    #[error("could not install telemetry: {0}")]
    Telemetry(String),
    #[error("bad configuration: {0}")]
    Configuration(String),
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
