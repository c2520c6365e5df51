use crate::types::{
    PAGE_SIZE, PageNumber,
    error::{DatabaseError, Result},
};

/// Pages governed by one map page, the map page itself included.
pub const PAGES_PER_MAP: u32 = (PAGE_SIZE * 8) as u32;

/// Map page that owns `page_number`. Map pages sit at 1, 1 + 32768, ...
pub fn map_page_for(page_number: PageNumber) -> PageNumber {
    ((page_number - 1) / PAGES_PER_MAP) * PAGES_PER_MAP + 1
}

pub fn is_map_page(page_number: PageNumber) -> bool {
    page_number != 0 && (page_number - 1) % PAGES_PER_MAP == 0
}

/// Allocation bitmap for the region starting at `page_number`. Bit `i`
/// (byte `i / 8`, bit `i % 8`) covers page `page_number + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeMapPage {
    pub page_number: PageNumber,
    bits: Vec<u8>,
}

impl FreeMapPage {
    /// A fresh map with only its own bit set.
    pub fn new(page_number: PageNumber) -> Self {
        let mut map = Self {
            page_number,
            bits: vec![0u8; PAGE_SIZE],
        };
        map.set(0);
        map
    }

    pub fn from_bytes(page_number: PageNumber, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut map = Self {
            page_number,
            bits: bytes.to_vec(),
        };
        map.set(0);
        Ok(map)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.clone()
    }

    pub fn is_set(&self, offset: usize) -> bool {
        self.bits[offset / 8] & (1 << (offset % 8)) != 0
    }

    pub fn set(&mut self, offset: usize) {
        self.bits[offset / 8] |= 1 << (offset % 8);
    }

    pub fn unset(&mut self, offset: usize) {
        self.bits[offset / 8] &= !(1 << (offset % 8));
    }

    /// Offset of the first clear bit.
    pub fn first_free(&self) -> Option<usize> {
        self.bits
            .iter()
            .position(|byte| *byte != 0xff)
            .map(|index| index * 8 + self.bits[index].trailing_ones() as usize)
    }

    pub fn free_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_zeros() as usize).sum()
    }

    pub fn offset_of(&self, page_number: PageNumber) -> usize {
        (page_number - self.page_number) as usize
    }
}
