use std::path::PathBuf;

use thiserror::Error;

use super::codec::DecodeError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{id}' has a malformed cache file")]
    Decode {
        id: String,
        #[source]
        source: DecodeError,
    },

    #[error("I/O error while {operation} at {}", path.display())]
    Store {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize session '{id}'")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid session id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error(transparent)]
    Completion(anyhow::Error),
}

impl SessionError {
    #[must_use]
    pub fn store(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Store {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn decode(id: &str, source: DecodeError) -> Self {
        Self::Decode {
            id: id.to_string(),
            source,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
