use crate::types::PageNumber;

/// On-disk size of one `(key, page_number)` pair.
pub const ENTRY_SIZE: usize = 12;

/// A B+tree slot: in a leaf it maps a key to a data page, in an internal node
/// it maps the minimum key of a subtree to the subtree's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: i64,
    pub page_number: PageNumber,
}

impl IndexEntry {
    pub fn new(key: i64, page_number: PageNumber) -> Self {
        Self { key, page_number }
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut bytes = [0u8; ENTRY_SIZE];
        bytes[..8].copy_from_slice(&self.key.to_le_bytes());
        bytes[8..].copy_from_slice(&self.page_number.to_le_bytes());
        bytes
    }
}

/// Index of the last entry whose key is `<= key`, if any. Entries must be
/// sorted ascending by key.
pub fn floor_index(entries: &[IndexEntry], key: i64) -> Option<usize> {
    entries.partition_point(|e| e.key <= key).checked_sub(1)
}

/// Slot to descend into: the floor entry, clamped to the first one for keys
/// smaller than every routing key.
pub fn route_index(entries: &[IndexEntry], key: i64) -> usize {
    floor_index(entries, key).unwrap_or(0)
}

/// Position of the entry with exactly `key`.
pub fn exact_index(entries: &[IndexEntry], key: i64) -> Option<usize> {
    entries.binary_search_by_key(&key, |e| e.key).ok()
}
