pub mod art;
pub mod config;
pub mod executor;
pub mod pager;
pub mod storage;
pub mod types;
pub mod utils;
