pub mod insert;
pub mod scan;
