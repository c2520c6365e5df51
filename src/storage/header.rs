use crate::{
    types::{
        HEADER_PAGE_NUMBER, PAGE_SIZE, PageNumber,
        error::{DatabaseError, Result},
    },
    utils::codec::{ByteReader, pad_to_page},
};

/// Page 0: the root of the table catalog chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbHeader {
    pub first_table_meta_page: PageNumber,
}

impl DbHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let buffer = self.first_table_meta_page.to_le_bytes().to_vec();
        pad_to_page(buffer, HEADER_PAGE_NUMBER)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut reader = ByteReader::new(bytes, HEADER_PAGE_NUMBER);
        Ok(Self {
            first_table_meta_page: reader.read_u32()?,
        })
    }
}
