use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChimeError {
    /// Short error code string for structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            ChimeError::Config(_) => "CONFIG_ERROR",
            ChimeError::Serialization(_) => "SERIALIZATION_ERROR",
            ChimeError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChimeError>;
