use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    pager::{
        env::StorageEnv,
        page_io,
        transaction::{ReadTransaction, Transaction, WriteTransaction},
    },
    storage::{
        context::DbContext, header::DbHeader, schema::TableMeta, table, table_view::TableView,
    },
    types::{
        HEADER_PAGE_NUMBER, PageNumber,
        error::{DatabaseError, Result},
        row::RowMeta,
    },
};

/// One session over a database file: a read or write transaction plus the
/// table catalog reachable from the header page.
pub struct StorageManager {
    ctx: DbContext,
    path: PathBuf,
}

impl StorageManager {
    /// Creates (or truncates) `path` as an empty database.
    pub fn create_database<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::create_database_in(&StorageEnv::global(), path)
    }

    pub fn create_database_in<P: AsRef<Path>>(env: &Arc<StorageEnv>, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut txn = WriteTransaction::begin(env, path)?;
        page_io::create_file(path)?;
        txn.write_page(HEADER_PAGE_NUMBER, DbHeader::default().to_bytes()?)?;
        txn.commit()?;
        tracing::info!("created database at {}", path.display());
        Ok(())
    }

    /// Opens an existing database for writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_in(&StorageEnv::global(), path)
    }

    pub fn open_in<P: AsRef<Path>>(env: &Arc<StorageEnv>, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no database at {}", path.display()),
            )
            .into());
        }
        let txn = WriteTransaction::begin(env, path)?;
        tracing::info!("opened database at {} for writing", path.display());
        Self::start(Transaction::Write(txn), path)
    }

    /// Opens an existing database for reading. Blocks while a writer holds it.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_read_only_in(&StorageEnv::global(), path)
    }

    pub fn open_read_only_in<P: AsRef<Path>>(env: &Arc<StorageEnv>, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no database at {}", path.display()),
            )
            .into());
        }
        let txn = ReadTransaction::begin(env, path)?;
        tracing::info!("opened database at {} for reading", path.display());
        Self::start(Transaction::Read(txn), path)
    }

    /// Opens `path` for writing, creating the database first if it is missing.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new_in(&StorageEnv::global(), path)
    }

    pub fn new_in<P: AsRef<Path>>(env: &Arc<StorageEnv>, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            Self::create_database_in(env, path)?;
        }
        Self::open_in(env, path)
    }

    fn start(txn: Transaction, path: &Path) -> Result<Self> {
        let manager = Self {
            ctx: DbContext::new(txn),
            path: path.to_path_buf(),
        };
        manager.header()?;
        Ok(manager)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn context(&self) -> &DbContext {
        &self.ctx
    }

    pub fn is_writable(&self) -> bool {
        self.ctx.is_writable()
    }

    fn header(&self) -> Result<DbHeader> {
        DbHeader::from_bytes(&self.ctx.read_page(HEADER_PAGE_NUMBER)?)
    }

    /// Every table meta in catalog order, dropped ones included.
    fn catalog(&self) -> Result<Vec<TableMeta>> {
        let mut metas = Vec::new();
        let mut page_number = self.header()?.first_table_meta_page;
        while page_number != 0 {
            let meta = TableMeta::load(&self.ctx, page_number)?;
            page_number = meta.next_table_meta_page;
            metas.push(meta);
        }
        Ok(metas)
    }

    fn find_table(&self, table_name: &str) -> Result<TableMeta> {
        self.tables()?
            .into_iter()
            .find(|meta| meta.table_name == table_name)
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: table_name.to_string(),
            })
    }

    /// Live tables in catalog order.
    pub fn tables(&self) -> Result<Vec<TableMeta>> {
        Ok(self
            .catalog()?
            .into_iter()
            .filter(|meta| !meta.dropped)
            .collect())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables()?.into_iter().map(|meta| meta.table_name).collect())
    }

    pub fn table_schemas(&self) -> Result<Vec<RowMeta>> {
        Ok(self.tables()?.into_iter().map(|meta| meta.row_meta).collect())
    }

    pub fn create_table(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        row_meta: RowMeta,
    ) -> Result<PageNumber> {
        self.ctx.require_write("create table");
        row_meta.validate()?;
        if table_name.is_empty() {
            return Err(DatabaseError::InvalidSchema {
                reason: format!("invalid table name {:?}", table_name),
            });
        }
        if column_names.len() != row_meta.field_count() {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: row_meta.field_count(),
                actual: column_names.len(),
            });
        }

        let catalog = self.catalog()?;
        if catalog
            .iter()
            .any(|meta| !meta.dropped && meta.table_name == table_name)
        {
            return Err(DatabaseError::TableAlreadyExists {
                name: table_name.to_string(),
            });
        }

        let column_names: Vec<String> = column_names.iter().map(|c| c.to_string()).collect();
        let meta = table::create_table(&self.ctx, table_name, &column_names, &row_meta)?;

        match catalog.last() {
            Some(last) => {
                let mut last = last.clone();
                last.next_table_meta_page = meta.page_number;
                last.save(&self.ctx)?;
            }
            None => {
                let header = DbHeader {
                    first_table_meta_page: meta.page_number,
                };
                self.ctx.write_page(HEADER_PAGE_NUMBER, header.to_bytes()?)?;
            }
        }
        Ok(meta.page_number)
    }

    /// Marks the table dropped. Its pages stay allocated.
    pub fn drop_table(&mut self, table_name: &str) -> Result<()> {
        self.ctx.require_write("drop table");
        let mut meta = self.find_table(table_name)?;
        meta.dropped = true;
        meta.save(&self.ctx)?;
        tracing::debug!("dropped table {} at meta page {}", table_name, meta.page_number);
        Ok(())
    }

    pub fn open_table(&self, table_name: &str) -> Result<TableView> {
        let meta = self.find_table(table_name)?;
        TableView::open(self.ctx.clone(), meta.page_number)
    }

    /// Commits the session's transaction. Views opened from this session
    /// fail afterwards.
    pub fn commit(self) -> Result<()> {
        self.ctx.commit()
    }

    /// Discards every change made in this session.
    pub fn abort(self) {
        self.ctx.abort();
    }
}
