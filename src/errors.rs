// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoothError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Retries exhausted; carries the last underlying failure.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Credential rejected by the provider. Never retried.
    #[error("Authentication rejected: {0}")]
    FatalAuth(String),

    #[error("Packaging error: {0}")]
    Packaging(String),

    #[error("LLM service error: {0}")]
    LLM(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BoothError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, BoothError::FatalAuth(_))
    }

    /// The dismissible message shown to the user for this error.
    pub fn notification(&self) -> String {
        match self {
            BoothError::Decode(_) => {
                "That image couldn't be processed. Please try another file.".to_string()
            }
            BoothError::Validation(reason) => reason.clone(),
            BoothError::Generation(_) | BoothError::LLM(_) => {
                "Oops! That image could not be generated. Please try again.".to_string()
            }
            BoothError::FatalAuth(_) => {
                "The configured API key is not valid. Please update it and try again.".to_string()
            }
            BoothError::Packaging(_) => "Sorry, the album download failed.".to_string(),
            BoothError::ImageProcessing(_) => {
                "Could not prepare that image for download.".to_string()
            }
            BoothError::Redis(_) | BoothError::Storage(_) | BoothError::Serialization(_) => {
                "Could not read or update your daily generation count.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for BoothError {
    fn from(err: serde_json::Error) -> Self {
        BoothError::Serialization(err.to_string())
    }
}
