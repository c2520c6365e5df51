pub mod cache;
pub mod env;
pub mod page_io;
pub mod transaction;

pub use cache::{Pager, WriteBack};
pub use env::{FileLock, StorageEnv};
pub use transaction::{ReadTransaction, Transaction, WriteTransaction};
