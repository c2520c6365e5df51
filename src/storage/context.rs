use std::{cell::RefCell, path::PathBuf, rc::Rc};

use crate::{
    pager::transaction::Transaction,
    types::{PageNumber, error::Result},
};

/// Handle on the transaction of one database session. Cloned into every table
/// view and tree opened in the session; all page traffic goes through it.
#[derive(Clone)]
pub struct DbContext {
    txn: Rc<RefCell<Transaction>>,
}

impl DbContext {
    pub fn new(txn: Transaction) -> Self {
        Self {
            txn: Rc::new(RefCell::new(txn)),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.txn.borrow().path().to_path_buf()
    }

    pub fn is_writable(&self) -> bool {
        self.txn.borrow().is_write()
    }

    pub fn read_page(&self, page_number: PageNumber) -> Result<Vec<u8>> {
        self.txn.borrow().read_page(page_number)
    }

    pub fn write_page(&self, page_number: PageNumber, data: Vec<u8>) -> Result<()> {
        self.txn.borrow().write_page(page_number, data)
    }

    /// Panics unless the session holds a write transaction.
    pub fn require_write(&self, operation: &str) {
        if !self.is_writable() {
            panic!("{} requires a write transaction", operation);
        }
    }

    pub fn commit(&self) -> Result<()> {
        self.txn.borrow_mut().commit()
    }

    pub fn abort(&self) {
        self.txn.borrow_mut().abort();
    }
}
