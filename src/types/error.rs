use thiserror::Error;

use crate::types::PageNumber;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page allocation failed: {reason}")]
    AllocationFailure { reason: String },

    #[error("Not found")]
    NotFound,

    #[error("Key or value already exists")]
    Overlapped,

    #[error("Empty")]
    Empty,

    #[error("Search overflowed: index {index} (len: {len})")]
    SearchOverflow { index: usize, len: usize },

    #[error("Search underflowed")]
    SearchUnderflow,

    #[error("End of iteration")]
    EndOfIteration,

    #[error("Field {field} cannot be null")]
    NilValue { field: usize },

    #[error("Page is full (page_number: {page_number})")]
    PageFull { page_number: PageNumber },

    #[error("Column index {index} out of bounds")]
    ColumnIndexOutOfBounds { index: usize },

    #[error("Column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Table '{name}' not found")]
    TableNotFound { name: String },

    #[error("Table '{name}' already exists")]
    TableAlreadyExists { name: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Value for field {field} does not fit in {width} bytes")]
    ValueOutOfRange { field: usize, width: usize },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Transaction aborted: {reason}")]
    TransactionAborted { reason: String },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: page_number={page_number}, reason={reason}")]
    CorruptedPage {
        page_number: PageNumber,
        reason: String,
    },
}

impl DatabaseError {
    /// Lookups report a missing key either as `NotFound` or, on a tree with no
    /// root, as `Empty`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound | DatabaseError::Empty)
    }

    /// True for a short read past the end of the database file.
    pub fn is_end_of_file(&self) -> bool {
        matches!(self, DatabaseError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
