pub mod entry;
pub mod error;
pub mod page;
pub mod row;
pub mod value;

// Common type aliases
pub type PageNumber = u32;
pub type FieldId = usize;

pub const PAGE_SIZE: usize = 4096;

/// Page 0 always holds the database header.
pub const HEADER_PAGE_NUMBER: PageNumber = 0;

/// Page 0 doubles as the "no page" link value in every on-disk structure.
pub const NULL_PAGE: PageNumber = 0;
