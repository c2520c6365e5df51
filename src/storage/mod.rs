pub mod allocator;
pub mod bplus_tree;
pub mod context;
pub mod free_map;
pub mod header;
pub mod index_node;
pub mod schema;
pub mod storage_manager;
pub mod table;
pub mod table_view;
