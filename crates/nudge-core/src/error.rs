use thiserror::Error;

/// Top-level error type shared by the Nudge crates.
///
/// Collaborator implementations (stores, config loading) report failures with
/// this type. The engine wraps it in its own error enums via `#[from]` so the
/// `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NudgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for NudgeError {
    fn from(err: toml::de::Error) -> Self {
        NudgeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NudgeError {
    fn from(err: toml::ser::Error) -> Self {
        NudgeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NudgeError {
    fn from(err: serde_json::Error) -> Self {
        NudgeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Nudge operations.
pub type Result<T> = std::result::Result<T, NudgeError>;
