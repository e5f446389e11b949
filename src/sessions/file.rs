//! File-backed session store: one JSON file per session id.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::codec;
use super::error::SessionError;
use super::message::SessionRecord;
use super::traits::{validate_session_id, SessionStore, SessionSummary};

/// Owner-only access for the cache directory.
#[cfg(unix)]
const CACHE_DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const RECORD_FILE_MODE: u32 = 0o600;

/// Session store that keeps each record in `<root>/<session id>`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Open the store, creating the cache directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let root = root.into();
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(CACHE_DIR_MODE);
        builder
            .create(&root)
            .await
            .map_err(|source| SessionError::store("creating cache directory", &root, source))?;
        tracing::debug!(path = %root.display(), "session cache directory ready");

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, SessionError> {
        validate_session_id(id)?;
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn read(&self, id: &str) -> Result<SessionRecord, SessionError> {
        let path = self.record_path(id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(session = id, "no cached history, starting empty");
                return Ok(SessionRecord::default());
            }
            Err(e) => return Err(SessionError::store("reading session file", &path, e)),
        };

        let record = codec::decode(&bytes).map_err(|source| SessionError::decode(id, source))?;
        tracing::debug!(
            session = id,
            messages = record.messages.len(),
            "loaded cached history"
        );
        Ok(record)
    }

    async fn write(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let path = self.record_path(id)?;
        let bytes = codec::encode(record).map_err(|source| SessionError::Encode {
            id: id.to_string(),
            source,
        })?;

        // Write a sibling temp file and rename it over the record so a crash
        // mid-write never leaves a truncated record behind.
        let temp_path = self.root.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        let mut options = OpenOptions::new();
        options.create_new(true).write(true);
        #[cfg(unix)]
        options.mode(RECORD_FILE_MODE);

        let mut temp_file = options
            .open(&temp_path)
            .await
            .map_err(|e| SessionError::store("creating temporary session file", &temp_path, e))?;
        let written = async {
            temp_file.write_all(&bytes).await?;
            temp_file.sync_all().await
        }
        .await;
        drop(temp_file);
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SessionError::store(
                "writing temporary session file",
                &temp_path,
                e,
            ));
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SessionError::store("replacing session file", &path, e));
        }

        sync_directory(&self.root).await?;
        tracing::debug!(
            session = id,
            messages = record.messages.len(),
            "persisted history"
        );
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> Result<(), SessionError> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(session = id, "invalidated session");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::store("removing session file", &path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| SessionError::store("listing cache directory", &self.root, e))?;

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::store("listing cache directory", &self.root, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if validate_session_id(&name).is_err() {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            sessions.push(SessionSummary {
                id: name,
                modified: metadata.modified().ok().map(DateTime::<Local>::from),
            });
        }

        sessions.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    fn name(&self) -> &str {
        "file"
    }
}

async fn sync_directory(path: &Path) -> Result<(), SessionError> {
    #[cfg(unix)]
    {
        let dir = fs::File::open(path)
            .await
            .map_err(|e| SessionError::store("opening directory for fsync", path, e))?;
        dir.sync_all()
            .await
            .map_err(|e| SessionError::store("syncing directory metadata", path, e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
