use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MouthError {
    /// Malformed or unsupported container: bad header, unsupported
    /// channel count or sample width, zero-length audio.
    #[error("Format error: {0}")]
    Format(String),

    /// Every candidate rate and encoding was rejected by the device.
    #[error("Playback unavailable after {attempts} attempt(s): {reason}")]
    PlaybackUnavailable { attempts: usize, reason: String },

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Model not found in {dir}: {reason}")]
    ModelNotFound { dir: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    PlaybackUnavailable,
    Synthesis,
    ModelNotFound,
    Config,
    Io,
}

impl MouthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MouthError::Format(_) => ErrorKind::Format,
            MouthError::PlaybackUnavailable { .. } => {
                ErrorKind::PlaybackUnavailable
            }
            MouthError::Synthesis(_) => ErrorKind::Synthesis,
            MouthError::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            MouthError::Config(_) => ErrorKind::Config,
            MouthError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the same request might succeed if simply retried.
    ///
    /// Container and device failures are terminal for the request; a
    /// synthesis failure can be transient (e.g. the engine was killed).
    pub fn is_recoverable(&self) -> bool {
        match self {
            MouthError::Format(_) => false,
            MouthError::PlaybackUnavailable { .. } => false,
            MouthError::Synthesis(_) => true,
            MouthError::ModelNotFound { .. } => false,
            MouthError::Config(_) => false,
            MouthError::Io(_) => false,
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        MouthError::Format(msg.into())
    }
}

impl From<hound::Error> for MouthError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => MouthError::Io(io),
            other => MouthError::Format(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MouthError>;
