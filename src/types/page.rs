use std::cmp::Ordering;

use crate::{
    types::{
        PAGE_SIZE, PageNumber,
        error::{DatabaseError, Result},
        row::{FieldValue, ROW_PAGE_HEADER_SIZE, Row, RowMeta},
        value::Value,
    },
    utils::codec::{ByteReader, pad_to_page},
};

/*
 * Row Page Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │  next(4) | prev(4) | row_count(4)                               │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  [row 0][row 1] ... [row n-1]   fixed width, sorted ascending   │
 * │                                 by the clustered field          │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    ZERO PADDING                                 │
 * └─────────────────────────────────────────────────────────────────┘
 */

/// One link of a table's clustered heap.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedRowPage {
    pub page_number: PageNumber,
    pub next: PageNumber,
    pub prev: PageNumber,
    row_size: usize,
    data: Vec<u8>,
}

impl FixedRowPage {
    pub fn new(page_number: PageNumber, row_size: usize) -> Self {
        Self {
            page_number,
            next: 0,
            prev: 0,
            row_size,
            data: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(PAGE_SIZE);
        buffer.extend_from_slice(&self.next.to_le_bytes());
        buffer.extend_from_slice(&self.prev.to_le_bytes());
        buffer.extend_from_slice(&(self.row_count() as u32).to_le_bytes());
        buffer.extend_from_slice(&self.data);
        pad_to_page(buffer, self.page_number)
    }

    pub fn from_bytes(page_number: PageNumber, row_size: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut reader = ByteReader::new(bytes, page_number);
        let next = reader.read_u32()?;
        let prev = reader.read_u32()?;
        let row_count = reader.read_u32()? as usize;
        let capacity = (PAGE_SIZE - ROW_PAGE_HEADER_SIZE) / row_size.max(1);
        if row_count > capacity {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: format!("row count {} exceeds capacity {}", row_count, capacity),
            });
        }
        let data = reader.take(row_count * row_size)?.to_vec();
        Ok(Self {
            page_number,
            next,
            prev,
            row_size,
            data,
        })
    }

    pub fn row_count(&self) -> usize {
        self.data.len() / self.row_size
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn can_insert(&self) -> bool {
        ROW_PAGE_HEADER_SIZE + self.row_size * (self.row_count() + 1) <= PAGE_SIZE
    }

    pub fn row_bytes(&self, index: usize) -> Result<&[u8]> {
        if index >= self.row_count() {
            return Err(DatabaseError::SearchOverflow {
                index,
                len: self.row_count(),
            });
        }
        let start = index * self.row_size;
        Ok(&self.data[start..start + self.row_size])
    }

    pub fn row_at(&self, meta: &RowMeta, index: usize) -> Result<Row> {
        Row::decode(meta, self.row_bytes(index)?)
    }

    pub fn key_at(&self, meta: &RowMeta, index: usize) -> Result<Value> {
        meta.decode_cluster_key(self.row_bytes(index)?)
    }

    pub fn rows(&self, meta: &RowMeta) -> Result<Vec<Row>> {
        (0..self.row_count()).map(|i| self.row_at(meta, i)).collect()
    }

    /// Clustered value of the first non-null row; nulls sort first so this is
    /// the first value past the leading null run.
    pub fn first_non_null_key(&self, meta: &RowMeta) -> Result<Option<Value>> {
        for index in 0..self.row_count() {
            let key = self.key_at(meta, index)?;
            if !key.is_null() {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    pub fn last_key(&self, meta: &RowMeta) -> Result<Option<Value>> {
        match self.row_count() {
            0 => Ok(None),
            n => self.key_at(meta, n - 1).map(Some),
        }
    }

    /// First row whose clustered value is not less than `key`.
    pub fn lower_bound(&self, meta: &RowMeta, key: &Value) -> Result<usize> {
        let (mut low, mut high) = (0, self.row_count());
        while low < high {
            let mid = low + (high - low) / 2;
            if self.key_at(meta, mid)?.compare(key) == Ordering::Less {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// Rows whose clustered value equals `key`, in page order.
    pub fn rows_with_key(&self, meta: &RowMeta, key: &Value) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for index in self.lower_bound(meta, key)?..self.row_count() {
            if self.key_at(meta, index)?.compare(key) != Ordering::Equal {
                break;
            }
            rows.push(self.row_at(meta, index)?);
        }
        Ok(rows)
    }

    pub fn insert_row(&mut self, meta: &RowMeta, row: &Row) -> Result<()> {
        if !self.can_insert() {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        let key = row
            .get_value(meta.cluster_field_id)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds {
                index: meta.cluster_field_id,
            })?;
        let position = self.lower_bound(meta, key)?;
        let encoded = row.encode(meta)?;
        let offset = position * self.row_size;
        self.data.splice(offset..offset, encoded);
        Ok(())
    }

    /// Removes rows whose clustered value equals `key` and which satisfy every
    /// filter, up to `limit` rows. Returns the removed rows.
    pub fn remove_rows(
        &mut self,
        meta: &RowMeta,
        key: &Value,
        filters: &[FieldValue],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        let mut removed = Vec::new();
        let mut index = self.lower_bound(meta, key)?;
        while index < self.row_count() {
            if limit.is_some_and(|limit| removed.len() >= limit) {
                break;
            }
            let row = self.row_at(meta, index)?;
            if row.values[meta.cluster_field_id].compare(key) != Ordering::Equal {
                break;
            }
            if meta.matches_filters(&row, filters) {
                let start = index * self.row_size;
                self.data.drain(start..start + self.row_size);
                removed.push(row);
            } else {
                index += 1;
            }
        }
        Ok(removed)
    }

    /// Moves the upper half of the rows out, leaving `row_count / 2` behind.
    pub fn split_off_upper(&mut self) -> Result<Vec<u8>> {
        let keep = self.row_count() / 2;
        if keep == 0 {
            return Err(DatabaseError::SearchUnderflow);
        }
        Ok(self.data.split_off(keep * self.row_size))
    }

    /// Builds a sibling page out of rows taken from a split.
    pub fn with_rows(page_number: PageNumber, row_size: usize, data: Vec<u8>) -> Self {
        Self {
            page_number,
            next: 0,
            prev: 0,
            row_size,
            data,
        }
    }
}
