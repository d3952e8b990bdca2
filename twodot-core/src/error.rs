use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    #[error("failed to load media '{source_ref}': {reason}")]
    MediaLoad { source_ref: String, reason: String },

    #[error("invalid trial spec: {0}")]
    InvalidTrialSpec(String),

    #[error("completion signal already delivered")]
    DoubleCompletion,

    #[error("unknown trial type '{0}'")]
    UnknownTrialType(String),

    #[error("malformed timeline: {0}")]
    Timeline(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot build presentation: {0}")]
    Presentation(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl TrialError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TrialError::InvalidTrialSpec(message.into())
    }

    pub fn media_load(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        TrialError::MediaLoad {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for TrialError {
    fn from(err: std::io::Error) -> Self {
        TrialError::Io(err.to_string())
    }
}
