use crate::store::StoreError;
use thiserror::Error;
use tonic::{Code, Status};

/// Error types for provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A key RPC arrived before `Configure`.
    #[error("Provider is not configured: call Configure with an etcd endpoint first")]
    NotConfigured,

    /// Server initialization or runtime error.
    #[error("Server error: {0}")]
    Server(String),

    /// A declared key entry failed structural validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store holds a directory where a leaf value was expected.
    #[error("{name} is a directory")]
    Directory { name: String },

    /// Nothing stored at the path and no default declared.
    #[error("no value at path '{path}' and no default for key '{name}'")]
    MissingValue { name: String, path: String },

    /// Any store failure other than a tolerated "not found".
    #[error("Failed to {operation} etcd key '{path}': {source}")]
    Store {
        operation: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    /// The discovery service could not produce a URL.
    #[error("Discovery request to '{endpoint}' failed: {message}")]
    Discovery { endpoint: String, message: String },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// gRPC transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl ProviderError {
    pub(crate) fn store(operation: &'static str, path: &str, source: StoreError) -> Self {
        ProviderError::Store {
            operation,
            path: path.to_string(),
            source,
        }
    }
}

impl From<ProviderError> for Status {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        let code = match err {
            ProviderError::Configuration(_) | ProviderError::InvalidInput(_) => {
                Code::InvalidArgument
            }
            ProviderError::NotConfigured
            | ProviderError::Directory { .. }
            | ProviderError::MissingValue { .. } => Code::FailedPrecondition,
            ProviderError::Store { .. }
            | ProviderError::Discovery { .. }
            | ProviderError::Transport(_) => Code::Unavailable,
            ProviderError::Server(_) | ProviderError::Io(_) => Code::Internal,
        };
        Status::new(code, message)
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
