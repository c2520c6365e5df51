use crate::{
    types::{
        PAGE_SIZE, PageNumber,
        entry::{ENTRY_SIZE, IndexEntry},
        error::{DatabaseError, Result},
    },
    utils::codec::{ByteReader, pad_to_page},
};

/*
 * Index Node Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │  entry_count(4, signed)                                         │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  [key(8) | page_number(4)] x entry_count                        │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  prev(4) | next(4) | internal(1)                                │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    ZERO PADDING                                 │
 * └─────────────────────────────────────────────────────────────────┘
 */

const NODE_FIXED_SIZE: usize = 4 + 4 + 4 + 1;

/// Most entries a node page can physically hold.
pub const MAX_NODE_ENTRIES: usize = (PAGE_SIZE - NODE_FIXED_SIZE) / ENTRY_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexNode {
    pub page_number: PageNumber,
    pub entries: Vec<IndexEntry>,
    pub prev: PageNumber,
    pub next: PageNumber,
    pub internal: bool,
}

impl IndexNode {
    pub fn new_leaf(page_number: PageNumber) -> Self {
        Self {
            page_number,
            entries: Vec::new(),
            prev: 0,
            next: 0,
            internal: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        !self.internal
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min_key(&self) -> Option<i64> {
        self.entries.first().map(|e| e.key)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(PAGE_SIZE);
        buffer.extend_from_slice(&(self.entries.len() as i32).to_le_bytes());
        for entry in &self.entries {
            buffer.extend_from_slice(&entry.to_bytes());
        }
        buffer.extend_from_slice(&self.prev.to_le_bytes());
        buffer.extend_from_slice(&self.next.to_le_bytes());
        buffer.push(self.internal as u8);
        pad_to_page(buffer, self.page_number)
    }

    pub fn from_bytes(page_number: PageNumber, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut reader = ByteReader::new(bytes, page_number);
        let count = reader.read_i32()?;
        if count < 0 || count as usize > MAX_NODE_ENTRIES {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: format!("index node entry count {}", count),
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = reader.read_i64()?;
            let child = reader.read_u32()?;
            entries.push(IndexEntry::new(key, child));
        }
        let prev = reader.read_u32()?;
        let next = reader.read_u32()?;
        let internal = reader.read_u8()? != 0;

        Ok(Self {
            page_number,
            entries,
            prev,
            next,
            internal,
        })
    }
}
