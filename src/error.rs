//! Error taxonomy shared by every module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    /// Map could not be decoded or is missing required data
    #[error("Invalid map: {0}")]
    InvalidMap(String),

    /// Song could not be loaded, buffered, or played
    #[error("Failed to load media: {0}")]
    MediaLoad(String),

    /// A tuning value or coordinate is outside its valid domain
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::InvalidMap(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
