//! Per-file page cache.
//!
//! Pages are kept in least-recently-used order. Writes only touch the cache;
//! a dirty page reaches disk when it is evicted (through the owner's
//! write-back hook) or when the owner calls `sync_all`.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    pager::page_io,
    types::{
        PAGE_SIZE, PageNumber,
        error::{DatabaseError, Result},
    },
};

/// Receives dirty pages evicted from a cache. Implemented by the write
/// transaction that currently owns the file.
pub trait WriteBack: Send + Sync {
    fn write_back(&self, path: &Path, page_number: PageNumber, data: &[u8]);
}

struct CacheEntry {
    data: Vec<u8>,
    /// Recency stamp; the matching key in `Pager::recency`.
    stamp: u64,
}

/// Hit/miss counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct Pager {
    path: PathBuf,
    capacity: usize,
    entries: HashMap<PageNumber, CacheEntry>,
    /// Stamp -> page number, oldest first.
    recency: BTreeMap<u64, PageNumber>,
    dirty: HashSet<PageNumber>,
    next_stamp: u64,
    write_back: Option<Arc<dyn WriteBack>>,
    stats: CacheStats,
}

impl Pager {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity),
            recency: BTreeMap::new(),
            dirty: HashSet::new(),
            next_stamp: 0,
            write_back: None,
            stats: CacheStats::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_cached(&self, page_number: PageNumber) -> bool {
        self.entries.contains_key(&page_number)
    }

    pub fn is_dirty(&self, page_number: PageNumber) -> bool {
        self.dirty.contains(&page_number)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn set_write_back(&mut self, write_back: Option<Arc<dyn WriteBack>>) {
        self.write_back = write_back;
    }

    pub fn read_page(&mut self, page_number: PageNumber) -> Result<Vec<u8>> {
        if let Some(data) = self.touch(page_number).map(<[u8]>::to_vec) {
            self.stats.hits += 1;
            tracing::trace!("read_page(page_number = {}) cache hit", page_number);
            return Ok(data);
        }
        self.stats.misses += 1;
        let data = page_io::read_page(&self.path, page_number)?;
        self.insert(page_number, data.clone());
        Ok(data)
    }

    /// Replaces the cached copy and marks it dirty. Never touches disk except
    /// through an eviction this insert triggers.
    pub fn write_page(&mut self, page_number: PageNumber, data: Vec<u8>) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }
        if let Some(entry) = self.entries.get_mut(&page_number) {
            entry.data = data;
            self.touch(page_number);
        } else {
            self.insert(page_number, data);
        }
        self.dirty.insert(page_number);
        Ok(())
    }

    /// Writes every dirty page in ascending page order, marking each clean
    /// once it is on disk. Stops at the first failure.
    pub fn sync_all(&mut self) -> Result<()> {
        let mut pending: Vec<PageNumber> = self.dirty.iter().copied().collect();
        pending.sort_unstable();
        if pending.is_empty() {
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        for page_number in pending {
            if let Some(entry) = self.entries.get(&page_number) {
                page_io::write_page_to(&mut file, page_number, &entry.data)?;
            }
            self.dirty.remove(&page_number);
        }
        tracing::debug!(path = %self.path.display(), "synced dirty pages");
        Ok(())
    }

    /// Drops every cached page and dirty flag.
    pub fn purge(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.dirty.clear();
    }

    fn touch(&mut self, page_number: PageNumber) -> Option<&[u8]> {
        let entry = self.entries.get_mut(&page_number)?;
        self.recency.remove(&entry.stamp);
        entry.stamp = self.next_stamp;
        self.recency.insert(self.next_stamp, page_number);
        self.next_stamp += 1;
        Some(&entry.data)
    }

    fn insert(&mut self, page_number: PageNumber, data: Vec<u8>) {
        while self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.recency.insert(stamp, page_number);
        self.entries.insert(page_number, CacheEntry { data, stamp });
    }

    fn evict_oldest(&mut self) {
        let Some((_, page_number)) = self.recency.pop_first() else {
            return;
        };
        let Some(entry) = self.entries.remove(&page_number) else {
            return;
        };
        self.stats.evictions += 1;
        if self.dirty.remove(&page_number) {
            match &self.write_back {
                Some(write_back) => {
                    tracing::trace!("evicting dirty page {}", page_number);
                    write_back.write_back(&self.path, page_number, &entry.data);
                }
                None => {
                    tracing::warn!(
                        "dirty page {} evicted from {} with no writer attached",
                        page_number,
                        self.path.display()
                    );
                }
            }
        }
    }
}
