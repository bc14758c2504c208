use std::path::PathBuf;

use crate::{config, error::SessionError, types::Session};

/// File backed storage of the identity provider's session.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        SessionStore { path }
    }

    /// Store at `<data dir>/chipper/cache/session.json`.
    pub fn default_location() -> Self {
        let mut path = config::data_dir();
        path.push("cache/session.json");
        Self::new(path)
    }

    /// Returns the stored session, or `None` when nothing is stored.
    pub async fn load(&self) -> Result<Option<Session>, SessionError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let content = async_fs::read_to_string(&self.path).await?;
        let session: Session = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    pub async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(session)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), SessionError> {
        if self.path.is_file() {
            async_fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
