//! Error types for the embedding contract

/// Result alias using [`EmbedError`], used throughout the crate.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors a concrete embedding provider can surface to the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The provider configuration is unusable (bad model name, zero dimension, ...)
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Model loading or warm-up failed
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding generation itself failed
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Async task join errors from providers that offload to blocking threads
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Wrap an arbitrary error as a model-initialization failure.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Wrap an arbitrary error as an embedding-generation failure.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Build a configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
