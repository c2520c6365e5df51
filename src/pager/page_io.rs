use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::types::{
    PAGE_SIZE, PageNumber,
    error::{DatabaseError, Result},
};

pub fn page_offset(page_number: PageNumber) -> u64 {
    page_number as u64 * PAGE_SIZE as u64
}

/// Reads one page. A page that lies (even partly) past the end of the file is
/// an `UnexpectedEof` I/O error, see `DatabaseError::is_end_of_file`.
pub fn read_page(path: &Path, page_number: PageNumber) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; PAGE_SIZE];
    file.seek(SeekFrom::Start(page_offset(page_number)))?;
    file.read_exact(&mut buffer)?;
    tracing::trace!("read_page(page_number = {}) from disk", page_number);
    Ok(buffer)
}

/// Writes one page, first growing the file with zero pages when the target
/// lies past its end.
pub fn write_page(path: &Path, page_number: PageNumber, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    write_page_to(&mut file, page_number, data)
}

pub(crate) fn write_page_to(file: &mut File, page_number: PageNumber, data: &[u8]) -> Result<()> {
    if data.len() != PAGE_SIZE {
        return Err(DatabaseError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: data.len(),
        });
    }
    let offset = page_offset(page_number);
    if file.metadata()?.len() < offset {
        file.set_len(offset)?;
    }
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

/// Creates (or truncates) a database file.
pub fn create_file(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(())
}

pub fn page_count(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?.len() / PAGE_SIZE as u64)
}

pub fn sync_file(path: &Path) -> Result<()> {
    OpenOptions::new().write(true).open(path)?.sync_all()?;
    Ok(())
}
