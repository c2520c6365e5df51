use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::TempDir;

use crate::{
    config::StorageConfig,
    pager::env::StorageEnv,
    storage::storage_manager::StorageManager,
    types::error::Result,
};

/// Database file in a private temporary directory with its own
/// [`StorageEnv`], removed on drop.
pub struct TempDatabase {
    pub path: PathBuf,
    pub env: Arc<StorageEnv>,
    _dir: TempDir,
}

impl TempDatabase {
    pub fn new() -> Result<Self> {
        Self::with_config(StorageConfig::default())
    }

    pub fn with_config(config: StorageConfig) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("lembar_test_").tempdir()?;
        let path = dir.path().join("test.db");
        let env = StorageEnv::new(config)?;
        StorageManager::create_database_in(&env, &path)?;
        Ok(Self {
            path,
            env,
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write session.
    pub fn open(&self) -> Result<StorageManager> {
        StorageManager::open_in(&self.env, &self.path)
    }

    pub fn open_read_only(&self) -> Result<StorageManager> {
        StorageManager::open_read_only_in(&self.env, &self.path)
    }
}
