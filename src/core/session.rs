use crate::core::io::Storage;
use crate::core::state::Session;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Fixed key of the wizard snapshot.
pub const SESSION_KEY: &str = "session.json";

/// Snapshots and restores the `{stage, project}` session as an opaque blob.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Loads the saved session. A missing or unreadable snapshot yields the
    /// default session so a corrupt file never blocks a fresh start.
    pub async fn load(&self) -> Result<Session> {
        if !self.storage.exists(SESSION_KEY).await? {
            return Ok(Session::default());
        }
        let bytes = self.storage.read(SESSION_KEY).await?;
        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Ok(session),
            Err(e) => {
                log::warn!("Discarding unreadable session snapshot: {}", e);
                Ok(Session::default())
            }
        }
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let content = serde_json::to_vec(session).context("Failed to serialize session")?;
        self.storage.write(SESSION_KEY, &content).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.delete(SESSION_KEY).await
    }
}
