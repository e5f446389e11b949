//! Session storage traits and types for persisted chat history.

use async_trait::async_trait;
use chrono::{DateTime, Local};

use super::error::SessionError;
use super::message::SessionRecord;

/// Session ids longer than this are rejected.
const MAX_SESSION_ID_BYTES: usize = 255;

/// A stored session as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub modified: Option<DateTime<Local>>,
}

/// Durable mapping from session id to its full message history.
///
/// Implementations own their storage exclusively. Writes replace the whole
/// record; there is no merge at this layer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the record for `id`. A session that was never written reads as empty.
    async fn read(&self, id: &str) -> Result<SessionRecord, SessionError>;

    /// Replace the record for `id`.
    async fn write(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError>;

    /// Drop the record for `id`. Missing records are not an error.
    async fn invalidate(&self, id: &str) -> Result<(), SessionError>;

    /// Whether `id` has at least one stored message.
    ///
    /// Unreadable records count as absent.
    async fn exists(&self, id: &str) -> bool {
        match self.read(id).await {
            Ok(record) => !record.is_empty(),
            Err(error) => {
                tracing::debug!(session = id, %error, "treating unreadable session as absent");
                false
            }
        }
    }

    /// Stored sessions, most recently modified first.
    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError>;

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}

/// Reject ids that cannot safely be used as a file name inside the cache directory.
pub fn validate_session_id(id: &str) -> Result<(), SessionError> {
    let reason = if id.is_empty() {
        Some("must not be empty")
    } else if id.len() > MAX_SESSION_ID_BYTES {
        Some("must be at most 255 bytes")
    } else if id.starts_with('.') {
        Some("must not start with '.'")
    } else if id.contains(['/', '\\', '\0']) {
        Some("must not contain path separators or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SessionError::InvalidId {
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_ids() {
        for id in ["proj1", "temp", "my-chat_2", "with space", "ünïcode"] {
            assert!(validate_session_id(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn rejects_path_traversal_and_separators() {
        for id in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", ".hidden", "nul\0byte"] {
            let err = validate_session_id(id).unwrap_err();
            assert!(
                matches!(err, SessionError::InvalidId { .. }),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overlong_ids() {
        let id = "a".repeat(256);
        assert!(validate_session_id(&id).is_err());
        assert!(validate_session_id(&"a".repeat(255)).is_ok());
    }
}
