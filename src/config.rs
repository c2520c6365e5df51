use serde::{Deserialize, Serialize};

use crate::types::error::{DatabaseError, Result};

/// Storage-layer tuning shared by every file opened through one `StorageEnv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Pages held by each file's cache before least recently used pages are
    /// evicted. Dirty victims are written back early.
    pub page_cache_capacity: usize,

    /// Abort attempts after a failed commit before the failure is treated as
    /// unrecoverable.
    pub abort_retry_limit: usize,

    /// Issue an fsync once all dirty pages are written at commit.
    pub sync_on_commit: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_cache_capacity: 128,
            abort_retry_limit: 10,
            sync_on_commit: true,
        }
    }
}

impl StorageConfig {
    pub fn with_page_cache_capacity(mut self, capacity: usize) -> Self {
        self.page_cache_capacity = capacity;
        self
    }

    pub fn with_abort_retry_limit(mut self, limit: usize) -> Self {
        self.abort_retry_limit = limit;
        self
    }

    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_cache_capacity == 0 {
            return Err(DatabaseError::InvalidConfig {
                reason: "page_cache_capacity must be at least 1".to_string(),
            });
        }
        if self.abort_retry_limit == 0 {
            return Err(DatabaseError::InvalidConfig {
                reason: "abort_retry_limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
