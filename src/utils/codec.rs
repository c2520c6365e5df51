use crate::types::{
    PAGE_SIZE, PageNumber,
    error::{DatabaseError, Result},
};

/// Sequential little-endian reader over a page buffer. Every read is bounds
/// checked and reports the owning page on failure.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    page_number: PageNumber,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8], page_number: PageNumber) -> Self {
        Self {
            bytes,
            offset: 0,
            page_number,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| DatabaseError::CorruptedPage {
                page_number: self.page_number,
                reason: format!(
                    "read of {} bytes at offset {} runs past the page",
                    len, self.offset
                ),
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Reads a NUL-terminated string and consumes the terminator.
    pub fn read_cstr(&mut self) -> Result<String> {
        let rest = &self.bytes[self.offset..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| DatabaseError::CorruptedPage {
                page_number: self.page_number,
                reason: "unterminated string".to_string(),
            })?;
        let raw = self.take(len + 1)?;
        String::from_utf8(raw[..len].to_vec()).map_err(|e| DatabaseError::SerializationError {
            details: format!("invalid UTF-8 in page {}: {}", self.page_number, e),
        })
    }
}

/// Pads an encoded page out to `PAGE_SIZE`, rejecting anything that overflows it.
pub fn pad_to_page(mut buffer: Vec<u8>, page_number: PageNumber) -> Result<Vec<u8>> {
    if buffer.len() > PAGE_SIZE {
        return Err(DatabaseError::CorruptedPage {
            page_number,
            reason: format!("encoded size {} exceeds page size", buffer.len()),
        });
    }
    buffer.resize(PAGE_SIZE, 0);
    Ok(buffer)
}
