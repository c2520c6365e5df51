use crate::{
    storage::table_view::TableView,
    types::{
        error::{DatabaseError, Result},
        row::Row,
    },
};

pub trait Scanner {
    fn scan(&mut self) -> Result<Option<Row>>;
    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Row>>;
    fn reset(&mut self) -> Result<()>;
}

impl Scanner for TableView {
    fn scan(&mut self) -> Result<Option<Row>> {
        match self.next() {
            Ok(row) => Ok(Some(row)),
            Err(DatabaseError::EndOfIteration) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(batch_size);
        while rows.len() < batch_size {
            match self.scan()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    fn reset(&mut self) -> Result<()> {
        TableView::reset(self)
    }
}

/// Adapts a [`Scanner`] into an iterator of rows, starting from wherever the
/// scanner currently stands.
pub struct ScanIterator<S: Scanner> {
    scanner: S,
}

impl<S: Scanner> ScanIterator<S> {
    pub fn new(scanner: S) -> Self {
        Self { scanner }
    }

    pub fn into_inner(self) -> S {
        self.scanner
    }
}

impl<S: Scanner> Iterator for ScanIterator<S> {
    type Item = Result<Row>;
    fn next(&mut self) -> Option<Self::Item> {
        self.scanner.scan().transpose()
    }
}
