use crate::{
    storage::{
        context::DbContext,
        free_map::{FreeMapPage, PAGES_PER_MAP, is_map_page, map_page_for},
    },
    types::{
        PageNumber,
        error::{DatabaseError, Result},
    },
};

/// Allocates the lowest free page number, scanning map pages from page 1. A
/// map page that does not exist yet is created at the end of the file.
pub fn alloc_page(ctx: &DbContext) -> Result<PageNumber> {
    ctx.require_write("page allocation");
    let mut map_page_number: PageNumber = 1;
    loop {
        let mut map = match ctx.read_page(map_page_number) {
            Ok(bytes) => FreeMapPage::from_bytes(map_page_number, &bytes)?,
            Err(e) if e.is_end_of_file() => {
                tracing::debug!("creating free map page {}", map_page_number);
                let map = FreeMapPage::new(map_page_number);
                ctx.write_page(map_page_number, map.to_bytes())?;
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(offset) = map.first_free() {
            let page_number = map_page_number
                .checked_add(offset as PageNumber)
                .ok_or_else(|| DatabaseError::AllocationFailure {
                    reason: "page number space exhausted".to_string(),
                })?;
            map.set(offset);
            ctx.write_page(map_page_number, map.to_bytes())?;
            tracing::debug!("alloc_page() = {}", page_number);
            return Ok(page_number);
        }

        map_page_number = map_page_number.checked_add(PAGES_PER_MAP).ok_or_else(|| {
            DatabaseError::AllocationFailure {
                reason: "every free map region is full".to_string(),
            }
        })?;
    }
}

/// Returns `page_number` to its region's free map.
///
/// Panics when asked to free the header page or a map page.
pub fn free_page(ctx: &DbContext, page_number: PageNumber) -> Result<()> {
    ctx.require_write("page free");
    if page_number == 0 {
        panic!("attempt to free the database header page");
    }
    if is_map_page(page_number) {
        panic!("attempt to free free map page {}", page_number);
    }

    let map_page_number = map_page_for(page_number);
    let mut map = FreeMapPage::from_bytes(map_page_number, &ctx.read_page(map_page_number)?)?;
    map.unset(map.offset_of(page_number));
    ctx.write_page(map_page_number, map.to_bytes())?;
    tracing::debug!("free_page({})", page_number);
    Ok(())
}
