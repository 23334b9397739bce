use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use crate::state::GameState;

/// Save/load boundary for [`GameState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<GameState>>;
    async fn save(&self, state: &GameState) -> Result<()>;
}

/// Stores the state as one pretty-printed JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_or_default(&self) -> Result<GameState> {
        Ok(self.load().await?.unwrap_or_default())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<GameState>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {}", self.path.display())),
        };
        let state = GameState::from_json(&raw)
            .with_context(|| format!("parsing game state {}", self.path.display()))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &GameState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = state.to_json()?;
        // readers never observe a partially written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "game state saved");
        Ok(())
    }
}
