use std::cmp::Ordering;

use crate::{
    storage::{
        allocator::{alloc_page, free_page},
        bplus_tree::BPlusTree,
        context::DbContext,
        schema::TableMeta,
    },
    types::{
        FieldId, PageNumber,
        entry::IndexEntry,
        error::{DatabaseError, Result},
        page::FixedRowPage,
        row::{FieldMeta, FieldValue, Row, RowMeta},
        value::Value,
    },
};

#[derive(Debug, Default)]
struct Cursor {
    page: Option<FixedRowPage>,
    next_page: PageNumber,
    slot: usize,
}

/// Storage and cursor over one table.
///
/// Rows live in a doubly linked chain of [`FixedRowPage`]s sorted by the
/// clustered field, nulls first. The main index maps the index key of each
/// page's first non-null clustered value to the page; when several pages
/// start with the same key the lowest page number is kept. Every other
/// field with an index page is mirrored into a nested view over a
/// `(field, clustered field)` table.
///
/// The meta page is reloaded at the start of every operation, so views of
/// the same table opened in one session stay coherent. The cursor is not
/// reloaded between `next` calls.
pub struct TableView {
    ctx: DbContext,
    meta: TableMeta,
    index: BPlusTree,
    secondaries: Vec<(FieldId, TableView)>,
    cursor: Cursor,
}

impl TableView {
    pub fn open(ctx: DbContext, meta_page: PageNumber) -> Result<Self> {
        let meta = TableMeta::load(&ctx, meta_page)?;
        let index = BPlusTree::open(ctx.clone(), meta.main_index_root());

        let mut secondaries = Vec::new();
        for (field_id, page_number) in meta.field_index_pages.iter().enumerate() {
            if field_id != meta.cluster_field_id() && *page_number != 0 {
                secondaries.push((field_id, TableView::open(ctx.clone(), *page_number)?));
            }
        }

        let cursor = Cursor {
            page: None,
            next_page: meta.first_data_page,
            slot: 0,
        };
        Ok(Self {
            ctx,
            meta,
            index,
            secondaries,
            cursor,
        })
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn table_name(&self) -> &str {
        &self.meta.table_name
    }

    pub fn row_meta(&self) -> &RowMeta {
        &self.meta.row_meta
    }

    /// Column names qualified as `table.column`.
    pub fn column_names(&self) -> Vec<String> {
        self.meta
            .column_names
            .iter()
            .map(|column| format!("{}.{}", self.meta.table_name, column))
            .collect()
    }

    pub fn column_metas(&self) -> &[FieldMeta] {
        &self.meta.row_meta.fields
    }

    /// Fields backed by a secondary index table.
    pub fn secondary_fields(&self) -> Vec<FieldId> {
        self.secondaries.iter().map(|(field_id, _)| *field_id).collect()
    }

    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.reload()?;
        let row = self.check_row(row)?;
        self.place_row(&row)?;

        let cluster_value = &row.values[self.meta.cluster_field_id()];
        for (field_id, secondary) in self.secondaries.iter_mut() {
            secondary.insert(Row::new(vec![
                row.values[*field_id].clone(),
                cluster_value.clone(),
            ]))?;
        }
        Ok(())
    }

    /// Removes every row whose clustered value equals `key` and which matches
    /// all `filters`. Returns the number of rows removed.
    pub fn delete(&mut self, key: &Value, filters: &[FieldValue]) -> Result<usize> {
        self.delete_limited(key, filters, None).map(|rows| rows.len())
    }

    /// Rewrites the rows `delete(key, filters)` would remove with
    /// `new_values` applied, by removing and re-inserting them.
    ///
    /// Not atomic: when a re-insert fails, the rows not yet re-inserted are
    /// put back as they were, best-effort, and the error is returned.
    pub fn update(
        &mut self,
        key: &Value,
        filters: &[FieldValue],
        new_values: &[FieldValue],
    ) -> Result<usize> {
        self.reload()?;
        self.check_field_ids(filters)?;
        self.check_field_ids(new_values)?;
        let (key, filters) = self.normalize_lookup(key, filters)?;
        let originals = self.remove_rows(&key, &filters, None)?;

        for (index, original) in originals.iter().enumerate() {
            let mut row = original.clone();
            for new_value in new_values {
                row.set_value(new_value.field_id, new_value.value.clone())?;
            }
            if let Err(e) = self.insert(row) {
                tracing::warn!(
                    "update on {} failed after removing {} rows: {}",
                    self.meta.table_name,
                    originals.len(),
                    e
                );
                for pending in &originals[index..] {
                    if let Err(restore) = self.insert(pending.clone()) {
                        tracing::warn!("could not restore row {:?}: {}", pending.values, restore);
                    }
                }
                return Err(e);
            }
        }
        Ok(originals.len())
    }

    /// Rows whose field `field_id` equals `key`, in clustered order.
    pub fn search(&mut self, field_id: FieldId, key: &Value) -> Result<Vec<Row>> {
        self.reload()?;
        if field_id >= self.meta.row_meta.field_count() {
            return Err(DatabaseError::ColumnIndexOutOfBounds { index: field_id });
        }
        let normalized = self.meta.row_meta.normalize_field(field_id, key)?;
        let key = &normalized;
        if field_id == self.meta.cluster_field_id() {
            return self.search_clustered(key, &[]);
        }

        let Some(position) = self.secondaries.iter().position(|(f, _)| *f == field_id) else {
            return self.collect_rows(|row| row.values[field_id].compare(key) == Ordering::Equal);
        };

        let pairs = self.secondaries[position].1.search(0, key)?;
        let mut cluster_values: Vec<Value> = Vec::new();
        for mut pair in pairs {
            let value = pair.values.swap_remove(1);
            if !cluster_values
                .iter()
                .any(|v| v.compare(&value) == Ordering::Equal)
            {
                cluster_values.push(value);
            }
        }
        cluster_values.sort_by(|a, b| a.compare(b));

        let filters = if self.meta.row_meta.cluster_field().unique {
            Vec::new()
        } else {
            vec![FieldValue::new(field_id, key.clone())]
        };
        let mut rows = Vec::new();
        for value in &cluster_values {
            rows.extend(self.search_clustered(value, &filters)?);
        }
        rows.retain(|row| row.values[field_id].compare(key) == Ordering::Equal);
        Ok(rows)
    }

    /// Every row in clustered order.
    pub fn rows(&mut self) -> Result<Vec<Row>> {
        self.reload()?;
        self.collect_rows(|_| true)
    }

    /// Data page chain as `(page_number, row_count)` pairs.
    pub fn data_pages(&mut self) -> Result<Vec<(PageNumber, usize)>> {
        self.reload()?;
        let mut pages = Vec::new();
        let mut page_number = self.meta.first_data_page;
        while page_number != 0 {
            let page = self.load_page(page_number)?;
            pages.push((page_number, page.row_count()));
            page_number = page.next;
        }
        Ok(pages)
    }

    /// Entries of the main index in key order.
    pub fn index_entries(&mut self) -> Result<Vec<IndexEntry>> {
        self.reload()?;
        self.index.leaf_entries()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.reload()?;
        self.cursor = Cursor {
            page: None,
            next_page: self.meta.first_data_page,
            slot: 0,
        };
        Ok(())
    }

    pub fn has_next(&mut self) -> Result<bool> {
        loop {
            if let Some(page) = &self.cursor.page {
                if self.cursor.slot < page.row_count() {
                    return Ok(true);
                }
                self.cursor.next_page = page.next;
                self.cursor.page = None;
                self.cursor.slot = 0;
            }
            if self.cursor.next_page == 0 {
                return Ok(false);
            }
            let page = self.load_page(self.cursor.next_page)?;
            self.cursor.page = Some(page);
        }
    }

    /// Next row of the cursor, or `EndOfIteration` once the chain is exhausted.
    pub fn next(&mut self) -> Result<Row> {
        if !self.has_next()? {
            return Err(DatabaseError::EndOfIteration);
        }
        let Some(page) = &self.cursor.page else {
            return Err(DatabaseError::EndOfIteration);
        };
        let row = page.row_at(&self.meta.row_meta, self.cursor.slot)?;
        self.cursor.slot += 1;
        Ok(row)
    }

    pub(crate) fn delete_limited(
        &mut self,
        key: &Value,
        filters: &[FieldValue],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        self.reload()?;
        self.check_field_ids(filters)?;
        let (key, filters) = self.normalize_lookup(key, filters)?;
        self.remove_rows(&key, &filters, limit)
    }

    fn reload(&mut self) -> Result<()> {
        self.meta = TableMeta::load(&self.ctx, self.meta.page_number)?;
        self.index = BPlusTree::open(self.ctx.clone(), self.meta.main_index_root());
        Ok(())
    }

    fn check_field_ids(&self, values: &[FieldValue]) -> Result<()> {
        let field_count = self.meta.row_meta.field_count();
        match values.iter().find(|v| v.field_id >= field_count) {
            Some(v) => Err(DatabaseError::ColumnIndexOutOfBounds { index: v.field_id }),
            None => Ok(()),
        }
    }

    /// Clustered key and filters in their stored form.
    fn normalize_lookup(
        &self,
        key: &Value,
        filters: &[FieldValue],
    ) -> Result<(Value, Vec<FieldValue>)> {
        let meta = &self.meta.row_meta;
        Ok((
            meta.normalize_field(meta.cluster_field_id, key)?,
            meta.normalize_filters(filters)?,
        ))
    }

    /// Validates `row` and returns it as it will be stored.
    fn check_row(&mut self, row: Row) -> Result<Row> {
        let meta = self.meta.row_meta.clone();
        meta.check_shape(&row)?;
        for (field_id, (field, value)) in meta.fields.iter().zip(&row.values).enumerate() {
            if value.is_null() && !field.nullable {
                return Err(DatabaseError::NilValue { field: field_id });
            }
        }

        let row = Row::decode(&meta, &row.encode(&meta)?)?;
        for (field_id, field) in meta.fields.iter().enumerate() {
            let value = &row.values[field_id];
            if field.unique && !value.is_null() && !self.search(field_id, value)?.is_empty() {
                return Err(DatabaseError::Overlapped);
            }
        }
        Ok(row)
    }

    fn load_page(&self, page_number: PageNumber) -> Result<FixedRowPage> {
        FixedRowPage::from_bytes(
            page_number,
            self.meta.row_meta.size(),
            &self.ctx.read_page(page_number)?,
        )
    }

    fn save_page(&self, page: &FixedRowPage) -> Result<()> {
        self.ctx.write_page(page.page_number, page.to_bytes()?)
    }

    fn page_key(&self, page: &FixedRowPage) -> Result<Option<i64>> {
        Ok(page
            .first_non_null_key(&self.meta.row_meta)?
            .and_then(|value| value.index_key()))
    }

    fn persist_index_root(&mut self) -> Result<()> {
        let root = self.index.root_page_number();
        let cluster = self.meta.cluster_field_id();
        if self.meta.field_index_pages[cluster] != root {
            self.meta.field_index_pages[cluster] = root;
            self.meta.save(&self.ctx)?;
        }
        Ok(())
    }

    /// Points `key` at `page_number` unless a lower page already holds it.
    fn index_page(&mut self, key: i64, page_number: PageNumber) -> Result<()> {
        match self.index.search(key) {
            Ok(current) if current <= page_number => return Ok(()),
            Ok(_) => self.index.remove(key)?,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.index.insert(key, page_number)?;
        self.persist_index_root()
    }

    /// Drops the entry for `key` if it points at `page_number`, then lets an
    /// adjacent page starting with the same key take it over.
    fn unindex_page(
        &mut self,
        key: i64,
        page_number: PageNumber,
        neighbors: [PageNumber; 2],
    ) -> Result<()> {
        match self.index.search(key) {
            Ok(current) if current == page_number => {
                self.index.remove(key)?;
                self.persist_index_root()?;
            }
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        for neighbor in neighbors {
            if neighbor == 0 || neighbor == page_number {
                continue;
            }
            let page = self.load_page(neighbor)?;
            if self.page_key(&page)? == Some(key) {
                self.index_page(key, neighbor)?;
            }
        }
        Ok(())
    }

    /// Re-keys a saved page whose first non-null value may have moved away
    /// from `old_key`.
    fn refresh_page_key(&mut self, page: &FixedRowPage, old_key: Option<i64>) -> Result<()> {
        let new_key = self.page_key(page)?;
        if new_key == old_key {
            return Ok(());
        }
        if let Some(old_key) = old_key {
            self.unindex_page(old_key, page.page_number, [page.prev, page.next])?;
        }
        if let Some(new_key) = new_key {
            self.index_page(new_key, page.page_number)?;
        }
        Ok(())
    }

    /// Index-suggested starting page for `key`, or the first data page.
    fn locate(&self, key: &Value) -> Result<PageNumber> {
        let first = self.meta.first_data_page;
        let Some(hash) = key.index_key() else {
            return Ok(first);
        };
        match self.index.search_floor(hash) {
            Ok(entry) => Ok(entry.page_number),
            Err(e) if e.is_not_found() => Ok(first),
            Err(e) => Err(e),
        }
    }

    /// Earliest page of the chain that can hold rows equal to `key`.
    fn first_page_with(&self, key: &Value) -> Result<Option<FixedRowPage>> {
        let start = self.locate(key)?;
        if start == 0 {
            return Ok(None);
        }
        let meta = &self.meta.row_meta;
        let mut page = self.load_page(start)?;
        while page.prev != 0 {
            let prev = self.load_page(page.prev)?;
            match prev.last_key(meta)? {
                Some(last) if last.compare(key) != Ordering::Less => page = prev,
                _ => break,
            }
        }
        while page.next != 0 {
            match page.last_key(meta)? {
                Some(last) if last.compare(key) == Ordering::Less => {
                    page = self.load_page(page.next)?;
                }
                _ => break,
            }
        }
        Ok(Some(page))
    }

    /// Page that should receive a row with clustered value `key`.
    fn insert_target(&self, key: &Value) -> Result<FixedRowPage> {
        let meta = &self.meta.row_meta;
        let mut page = self.load_page(self.locate(key)?)?;
        while page.prev != 0 {
            let prev = self.load_page(page.prev)?;
            match prev.last_key(meta)? {
                Some(last) if last.compare(key) == Ordering::Greater => page = prev,
                _ => break,
            }
        }
        while page.next != 0 {
            let advance = match page.last_key(meta)? {
                Some(last) => match last.compare(key) {
                    Ordering::Less => true,
                    Ordering::Equal => !page.can_insert(),
                    Ordering::Greater => false,
                },
                None => false,
            };
            if !advance {
                break;
            }
            page = self.load_page(page.next)?;
        }
        Ok(page)
    }

    fn place_row(&mut self, row: &Row) -> Result<()> {
        let meta = self.meta.row_meta.clone();
        let key = &row.values[meta.cluster_field_id];

        if self.meta.first_data_page == 0 {
            let page_number = alloc_page(&self.ctx)?;
            self.save_page(&FixedRowPage::new(page_number, meta.size()))?;
            self.meta.first_data_page = page_number;
            self.meta.save(&self.ctx)?;
            tracing::debug!("table {} got first data page {}", self.meta.table_name, page_number);
        }

        loop {
            let mut page = self.insert_target(key)?;
            if page.can_insert() {
                let old_key = self.page_key(&page)?;
                page.insert_row(&meta, row)?;
                self.save_page(&page)?;
                return self.refresh_page_key(&page, old_key);
            }
            self.split_page(page)?;
        }
    }

    /// Moves the upper half of a full page into a new sibling linked right
    /// after it.
    fn split_page(&mut self, mut page: FixedRowPage) -> Result<()> {
        let old_key = self.page_key(&page)?;
        let upper = page.split_off_upper()?;
        let sibling_number = alloc_page(&self.ctx)?;
        let mut sibling =
            FixedRowPage::with_rows(sibling_number, self.meta.row_meta.size(), upper);
        sibling.prev = page.page_number;
        sibling.next = page.next;
        if page.next != 0 {
            let mut next = self.load_page(page.next)?;
            next.prev = sibling_number;
            self.save_page(&next)?;
        }
        page.next = sibling_number;
        self.save_page(&page)?;
        self.save_page(&sibling)?;

        self.refresh_page_key(&page, old_key)?;
        if let Some(key) = self.page_key(&sibling)? {
            self.index_page(key, sibling_number)?;
        }
        tracing::debug!(
            "table {} split data page {} into {}",
            self.meta.table_name,
            page.page_number,
            sibling_number
        );
        Ok(())
    }

    fn remove_rows(
        &mut self,
        key: &Value,
        filters: &[FieldValue],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        let meta = self.meta.row_meta.clone();
        let mut removed: Vec<Row> = Vec::new();
        let Some(mut page) = self.first_page_with(key)? else {
            return Ok(removed);
        };

        loop {
            let continues = page
                .last_key(&meta)?
                .is_some_and(|last| last.compare(key) == Ordering::Equal);
            let next = page.next;
            let old_key = self.page_key(&page)?;
            let remaining = limit.map(|limit| limit - removed.len());
            let rows = page.remove_rows(&meta, key, filters, remaining)?;

            if !rows.is_empty() {
                if page.is_empty() {
                    self.release_page(&page, old_key)?;
                } else {
                    self.save_page(&page)?;
                    self.refresh_page_key(&page, old_key)?;
                }
                removed.extend(rows);
            }

            if !continues || next == 0 || limit.is_some_and(|limit| removed.len() >= limit) {
                break;
            }
            page = self.load_page(next)?;
        }

        let cluster = meta.cluster_field_id;
        for row in &removed {
            for (field_id, secondary) in self.secondaries.iter_mut() {
                let pair = [FieldValue::new(1, row.values[cluster].clone())];
                secondary.delete_limited(&row.values[*field_id], &pair, Some(1))?;
            }
        }
        Ok(removed)
    }

    /// Unlinks an emptied page from the chain and frees it.
    fn release_page(&mut self, page: &FixedRowPage, old_key: Option<i64>) -> Result<()> {
        if page.prev != 0 {
            let mut prev = self.load_page(page.prev)?;
            prev.next = page.next;
            self.save_page(&prev)?;
        }
        if page.next != 0 {
            let mut next = self.load_page(page.next)?;
            next.prev = page.prev;
            self.save_page(&next)?;
        }
        if self.meta.first_data_page == page.page_number {
            self.meta.first_data_page = page.next;
            self.meta.save(&self.ctx)?;
        }
        if let Some(old_key) = old_key {
            self.unindex_page(old_key, page.page_number, [page.prev, page.next])?;
        }
        free_page(&self.ctx, page.page_number)?;
        tracing::debug!(
            "table {} released data page {}",
            self.meta.table_name,
            page.page_number
        );
        Ok(())
    }

    fn search_clustered(&self, key: &Value, filters: &[FieldValue]) -> Result<Vec<Row>> {
        let meta = &self.meta.row_meta;
        let mut rows = Vec::new();
        let Some(mut page) = self.first_page_with(key)? else {
            return Ok(rows);
        };
        loop {
            rows.extend(
                page.rows_with_key(meta, key)?
                    .into_iter()
                    .filter(|row| meta.matches_filters(row, filters)),
            );
            let continues = page
                .last_key(meta)?
                .is_some_and(|last| last.compare(key) == Ordering::Equal);
            if !continues || page.next == 0 {
                break;
            }
            page = self.load_page(page.next)?;
        }
        Ok(rows)
    }

    fn collect_rows(&self, predicate: impl Fn(&Row) -> bool) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut page_number = self.meta.first_data_page;
        while page_number != 0 {
            let page = self.load_page(page_number)?;
            rows.extend(
                page.rows(&self.meta.row_meta)?
                    .into_iter()
                    .filter(|row| predicate(row)),
            );
            page_number = page.next;
        }
        Ok(rows)
    }
}
