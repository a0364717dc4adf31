use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Training error: {message}")]
    Training { message: String },

    #[error("Training diverged: {quantity} is NaN")]
    Diverged { quantity: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Dataset loading error: {message}")]
    DatasetLoad { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Gradient computation error: {message}")]
    GradientError { message: String },
}

impl ModelError {
    pub fn diverged(quantity: &str) -> Self {
        ModelError::Diverged {
            quantity: quantity.to_string(),
        }
    }

    pub fn is_divergence(&self) -> bool {
        matches!(self, ModelError::Diverged { .. })
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
