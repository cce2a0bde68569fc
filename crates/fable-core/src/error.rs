//! Error types for the Fable RAG system

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an error, used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The caller asked for something invalid (400)
    ClientError,
    /// A dependency is missing or not ready (503)
    Unavailable,
    /// The requested entity does not exist (404)
    NotFound,
    /// Everything else (500)
    ServerError,
}

/// Core error types for the Fable RAG system
#[derive(Error, Debug)]
pub enum Error {
    #[error("System not initialized yet: {0}")]
    NotInitialized(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provider '{provider}' not available. Available: {available:?}")]
    ProviderUnavailable {
        provider: String,
        available: Vec<String>,
    },

    #[error("Model '{model}' not available. Available: {available:?}")]
    ModelUnavailable {
        model: String,
        available: Vec<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to initialize {provider}: {source}")]
    Initialization {
        provider: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Model '{model}' not found. Available models: {available:?}")]
    ModelNotFound {
        model: String,
        available: Vec<String>,
    },

    #[error("No models available")]
    NoModelsAvailable,

    #[error("{0} not found. Please install it first")]
    ToolNotFound(String),

    #[error("LLM failed to generate response: {0}")]
    GenerationFailed(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Wrap a backend construction error with the provider it belongs to.
    pub fn initialization(provider: impl Into<String>, source: Error) -> Self {
        Error::Initialization {
            provider: provider.into(),
            source: Box::new(source),
        }
    }

    /// Map this error onto the request-facing taxonomy.
    pub fn status_class(&self) -> StatusClass {
        match self {
            Error::NotInitialized(_) => StatusClass::Unavailable,
            Error::InvalidArgument(_)
            | Error::ProviderUnavailable { .. }
            | Error::ModelUnavailable { .. } => StatusClass::ClientError,
            Error::NotFound(_) => StatusClass::NotFound,
            _ => StatusClass::ServerError,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
