use thiserror::Error;

use crate::media::types::TransportState;

/// Decode, prepare or playback failure reported by a media engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no renderer builder for video type {0}")]
    UnsupportedType(String),
    #[error("failed to build renderers: {0}")]
    Build(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("session has been released")]
    Released,
}

/// The ad-decision service failed to load or serve an ad.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdRequestError {
    pub message: String,
    /// Service-specific error code, when the service reports one.
    pub code: Option<i32>,
}

impl AdRequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// A transport command reached a session that cannot honour it yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {command} while session is {state:?}")]
pub struct InvalidStateError {
    pub command: &'static str,
    pub state: TransportState,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("ad request error: {0}")]
    AdRequest(#[from] AdRequestError),
    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),
    #[error("settings error: {0}")]
    Settings(String),
}

impl PlayerError {
    /// Message shown to the user in a transient notice.
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Engine(e) => e.to_string(),
            PlayerError::AdRequest(e) => e.message.clone(),
            PlayerError::InvalidState(e) => e.to_string(),
            PlayerError::Settings(e) => e.clone(),
        }
    }
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::Settings(err.to_string())
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Settings(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
