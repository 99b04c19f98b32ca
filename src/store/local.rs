use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;

use super::MemoryStore;

/// A [`MemoryStore`] kept as pretty-printed JSON on disk.
#[derive(Debug)]
pub struct FileStore(PathBuf);

impl FileStore {
    pub fn open(p: impl AsRef<Path>) -> Self {
        Self(p.as_ref().to_owned())
    }

    pub async fn load(&self) -> crate::Result<Option<MemoryStore>> {
        if fs::try_exists(&self.0).await? {
            let text = fs::read_to_string(&self.0).await?;
            let store = serde_json::from_str(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(Some(store))
        } else {
            Ok(None)
        }
    }

    pub async fn save(&self, value: &MemoryStore) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.0, json).await?;
        log::info!("saved store to {}", self.0.display());
        Ok(())
    }
}
