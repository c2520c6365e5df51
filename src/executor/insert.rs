use crate::{
    storage::table_view::TableView,
    types::{error::Result, row::Row},
};

pub trait Inserter {
    fn insert(&mut self, row: Row) -> Result<()>;

    /// Inserts rows in order, stopping at the first failure. Rows before the
    /// failing one stay inserted.
    fn insert_batch(&mut self, rows: Vec<Row>) -> Result<()>;

    fn table_name(&self) -> &str;
}

impl Inserter for TableView {
    fn insert(&mut self, row: Row) -> Result<()> {
        TableView::insert(self, row)
    }

    fn insert_batch(&mut self, rows: Vec<Row>) -> Result<()> {
        let count = rows.len();
        for row in rows {
            TableView::insert(self, row)?;
        }
        tracing::debug!("inserted {} rows into {}", count, TableView::table_name(self));
        Ok(())
    }

    fn table_name(&self) -> &str {
        TableView::table_name(self)
    }
}
