// src/session/snapshot.rs

use std::path::{Path, PathBuf};

use crate::models::history::InProgressSnapshot;

/// Fixed key of the mirror; one in-progress test per user.
const SNAPSHOT_FILE: &str = "in_progress_test.json";

/// File-backed mirror of each user's in-progress test, so a test survives a
/// restart of the server or a lost client.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, user_id: i64) -> PathBuf {
        self.root.join(user_id.to_string()).join(SNAPSHOT_FILE)
    }

    /// Overwrites the user's mirror.
    pub async fn save(&self, user_id: i64, snapshot: &InProgressSnapshot) -> std::io::Result<()> {
        let path = self.path_for(user_id);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec(snapshot)?;

        // Write then rename so a crash never leaves half a file behind.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await
    }

    /// Reads the user's mirror. A missing file is `None`; an unreadable one is
    /// removed and reported as `None`.
    pub async fn load(&self, user_id: i64) -> std::io::Result<Option<InProgressSnapshot>> {
        let path = self.path_for(user_id);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        match serde_json::from_slice::<InProgressSnapshot>(&body) {
            Ok(snapshot) if !snapshot.questions.is_empty() => Ok(Some(snapshot)),
            Ok(_) => {
                self.clear(user_id).await?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Discarding corrupt snapshot for user {}: {}", user_id, e);
                self.clear(user_id).await?;
                Ok(None)
            }
        }
    }

    pub async fn clear(&self, user_id: i64) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.path_for(user_id)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
