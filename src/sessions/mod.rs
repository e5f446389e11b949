//! Session management: persists chat history across one-shot CLI runs.
//!
//! A [`SessionStore`] maps a session id to its full [`SessionRecord`]. The
//! production store keeps one JSON file per id (see [`codec`]) inside a
//! dedicated cache directory. [`ChatSession`] wraps a single completion call
//! so that prior turns are replayed before it and the new turn is persisted
//! after it.

pub mod codec;
pub mod error;
pub mod file;
pub mod in_memory;
pub mod message;
pub mod traits;
pub mod wrapper;

pub use codec::DecodeError;
pub use error::SessionError;
pub use file::FileSessionStore;
pub use in_memory::InMemorySessionStore;
pub use message::{Content, ContentBlock, Message, Role, SessionRecord, DEFAULT_MODEL};
pub use traits::{validate_session_id, SessionStore, SessionSummary};
pub use wrapper::{ChatSession, TEMP_SESSION_ID};

use crate::config::Config;

/// Open the file-backed store at the configured cache directory.
pub async fn create_session_store(config: &Config) -> anyhow::Result<Box<dyn SessionStore>> {
    let dir = config.chat_cache_dir()?;
    let store = FileSessionStore::open(dir).await?;
    Ok(Box::new(store))
}
