//! Error types for context assembly.

pub type Result<T> = std::result::Result<T, ContextBuildError>;

/// Failure while reading an uploaded file's stored content.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or unreadable source data encountered while assembling context.
#[derive(Debug, thiserror::Error)]
pub enum ContextBuildError {
    #[error("Chat {0} is not part of the project snapshot")]
    TargetChatMissing(String),

    #[error("Failed to read uploaded file \"{name}\": {source}")]
    FileDecode {
        name: String,
        #[source]
        source: DecodeError,
    },
}
