//! In-memory session store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::codec;
use super::error::SessionError;
use super::message::SessionRecord;
use super::traits::{validate_session_id, SessionStore, SessionSummary};

/// An in-memory session store backed by a mutex-protected hash map.
///
/// Records are kept in encoded form so reads go through the same codec as
/// the file store, including its failure modes.
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, (Vec<u8>, DateTime<Local>)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Store raw bytes for `id` without encoding, e.g. to simulate a corrupt record.
    pub fn insert_raw(&self, id: &str, bytes: impl Into<Vec<u8>>) {
        self.records
            .lock()
            .insert(id.to_string(), (bytes.into(), Local::now()));
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn read(&self, id: &str) -> Result<SessionRecord, SessionError> {
        validate_session_id(id)?;
        let bytes = match self.records.lock().get(id) {
            Some((bytes, _)) => bytes.clone(),
            None => return Ok(SessionRecord::default()),
        };
        codec::decode(&bytes).map_err(|source| SessionError::decode(id, source))
    }

    async fn write(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        validate_session_id(id)?;
        let bytes = codec::encode(record).map_err(|source| SessionError::Encode {
            id: id.to_string(),
            source,
        })?;
        self.records
            .lock()
            .insert(id.to_string(), (bytes, Local::now()));
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> Result<(), SessionError> {
        validate_session_id(id)?;
        self.records.lock().remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let records = self.records.lock();
        let mut results: Vec<SessionSummary> = records
            .iter()
            .map(|(id, (_, modified))| SessionSummary {
                id: id.clone(),
                modified: Some(*modified),
            })
            .collect();

        results.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
