use thiserror::Error;

/// Errors raised by the engine's collaborators (input, vision, processes).
///
/// None of these escape a step: the executor logs them and moves on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input backend unavailable: {0}")]
    InputUnavailable(String),

    #[error("input simulation failed: {0}")]
    Input(String),

    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    #[error("key combination is empty")]
    EmptyKeyCombination,

    #[error("{action} requires a resolved target coordinate")]
    MissingTarget { action: &'static str },

    #[error("invalid image pattern: {0}")]
    InvalidPattern(String),

    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("process command failed: {0}")]
    Process(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl From<enigo::InputError> for EngineError {
    fn from(err: enigo::InputError) -> Self {
        EngineError::Input(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Task(err.to_string())
    }
}
