//! Session-aware decoration of a single completion call.
//!
//! The completion itself knows nothing about persistence. [`ChatSession`]
//! loads prior history, hands the merged transcript to the completion, and
//! only persists the new turn once a reply has come back.

use std::future::Future;

use super::error::SessionError;
use super::message::{Message, SessionRecord};
use super::traits::SessionStore;

/// Session id that is wiped before every use, giving a fresh one-shot chat.
pub const TEMP_SESSION_ID: &str = "temp";

pub struct ChatSession<'a> {
    store: &'a dyn SessionStore,
    model: String,
}

impl<'a> ChatSession<'a> {
    pub fn new(store: &'a dyn SessionStore, model: impl Into<String>) -> Self {
        Self {
            store,
            model: model.into(),
        }
    }

    pub fn store(&self) -> &'a dyn SessionStore {
        self.store
    }

    /// Drop the ephemeral session so the next turn starts from nothing.
    ///
    /// No-op for any other id.
    pub async fn reset_if_temporary(&self, session_id: &str) -> Result<(), SessionError> {
        if session_id == TEMP_SESSION_ID {
            tracing::debug!(session = session_id, "clearing temporary session");
            self.store.invalidate(session_id).await?;
        }
        Ok(())
    }

    /// Run `complete` with the session's history prepended to `messages`.
    ///
    /// An empty `session_id` bypasses the store entirely. The updated history
    /// (prior turns, `messages`, then the reply) is written only when
    /// `complete` succeeds; a failed or abandoned call leaves the stored
    /// history untouched.
    pub async fn complete<F, Fut>(
        &self,
        session_id: &str,
        messages: Vec<Message>,
        complete: F,
    ) -> Result<Message, SessionError>
    where
        F: FnOnce(Vec<Message>) -> Fut,
        Fut: Future<Output = anyhow::Result<Message>>,
    {
        if session_id.is_empty() {
            return complete(messages).await.map_err(SessionError::Completion);
        }

        self.reset_if_temporary(session_id).await?;

        let prior = self.store.read(session_id).await?;
        let mut transcript = prior.messages;
        let prior_len = transcript.len();
        transcript.extend(messages);
        tracing::debug!(
            session = session_id,
            prior = prior_len,
            total = transcript.len(),
            "merged history with new turn"
        );

        let reply = complete(transcript.clone())
            .await
            .map_err(SessionError::Completion)?;

        transcript.push(reply.clone());
        let record = SessionRecord::new(transcript, self.model.clone());
        self.store.write(session_id, &record).await?;

        Ok(reply)
    }
}
