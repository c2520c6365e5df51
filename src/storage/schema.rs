use crate::{
    storage::context::DbContext,
    types::{
        FieldId, PAGE_SIZE, PageNumber,
        error::{DatabaseError, Result},
        row::{FieldMeta, RowMeta},
        value::DataType,
    },
    utils::codec::{ByteReader, pad_to_page},
};

/*
 * Table Meta Page Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │  field_count(4, signed) | table_name\0 | column_name\0 x n      │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  cluster_field_id(4)                                            │
 * │  [data_type(1) | width(2) | nullable(1) | unique(1)] x n        │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  first_data_page(4) | field_index_page(4) x n                   │
 * │  next_table_meta_page(4) | dropped(1)                           │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    ZERO PADDING                                 │
 * └─────────────────────────────────────────────────────────────────┘
 */

/// Catalog descriptor of one table, stored on its own page.
///
/// `field_index_pages[cluster_field_id]` is the root of the main index. For
/// every other field it is the meta page of that field's secondary index
/// table, or 0 when the field has none.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    pub page_number: PageNumber,
    pub table_name: String,
    pub column_names: Vec<String>,
    pub row_meta: RowMeta,
    pub first_data_page: PageNumber,
    pub field_index_pages: Vec<PageNumber>,
    pub next_table_meta_page: PageNumber,
    pub dropped: bool,
}

impl TableMeta {
    pub fn new(
        page_number: PageNumber,
        table_name: &str,
        column_names: Vec<String>,
        row_meta: RowMeta,
    ) -> Self {
        let field_count = row_meta.field_count();
        Self {
            page_number,
            table_name: table_name.to_string(),
            column_names,
            row_meta,
            first_data_page: 0,
            field_index_pages: vec![0; field_count],
            next_table_meta_page: 0,
            dropped: false,
        }
    }

    pub fn cluster_field_id(&self) -> FieldId {
        self.row_meta.cluster_field_id
    }

    pub fn main_index_root(&self) -> PageNumber {
        self.field_index_pages[self.cluster_field_id()]
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(PAGE_SIZE);
        buffer.extend_from_slice(&(self.row_meta.field_count() as i32).to_le_bytes());
        push_cstr(&mut buffer, &self.table_name, self.page_number)?;
        for name in &self.column_names {
            push_cstr(&mut buffer, name, self.page_number)?;
        }
        buffer.extend_from_slice(&(self.row_meta.cluster_field_id as u32).to_le_bytes());
        for field in &self.row_meta.fields {
            buffer.push(field.data_type.as_u8());
            buffer.extend_from_slice(&field.width.to_le_bytes());
            buffer.push(field.nullable as u8);
            buffer.push(field.unique as u8);
        }
        buffer.extend_from_slice(&self.first_data_page.to_le_bytes());
        for page in &self.field_index_pages {
            buffer.extend_from_slice(&page.to_le_bytes());
        }
        buffer.extend_from_slice(&self.next_table_meta_page.to_le_bytes());
        buffer.push(self.dropped as u8);
        pad_to_page(buffer, self.page_number)
    }

    pub fn from_bytes(page_number: PageNumber, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut reader = ByteReader::new(bytes, page_number);
        let field_count = reader.read_i32()?;
        if field_count <= 0 || field_count as usize > PAGE_SIZE {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: format!("table meta field count {}", field_count),
            });
        }
        let field_count = field_count as usize;

        let table_name = reader.read_cstr()?;
        let column_names = (0..field_count)
            .map(|_| reader.read_cstr())
            .collect::<Result<Vec<_>>>()?;
        let cluster_field_id = reader.read_u32()? as FieldId;

        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let data_type = DataType::from_u8(reader.read_u8()?)?;
            let width = reader.read_u16()?;
            let nullable = reader.read_u8()? != 0;
            let unique = reader.read_u8()? != 0;
            fields.push(FieldMeta {
                data_type,
                width,
                nullable,
                unique,
            });
        }
        if cluster_field_id >= field_count {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: format!("cluster field {} out of range", cluster_field_id),
            });
        }

        let first_data_page = reader.read_u32()?;
        let field_index_pages = (0..field_count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;
        let next_table_meta_page = reader.read_u32()?;
        let dropped = reader.read_u8()? != 0;

        Ok(Self {
            page_number,
            table_name,
            column_names,
            row_meta: RowMeta::new(fields, cluster_field_id),
            first_data_page,
            field_index_pages,
            next_table_meta_page,
            dropped,
        })
    }

    pub fn load(ctx: &DbContext, page_number: PageNumber) -> Result<Self> {
        Self::from_bytes(page_number, &ctx.read_page(page_number)?)
    }

    pub fn save(&self, ctx: &DbContext) -> Result<()> {
        ctx.write_page(self.page_number, self.to_bytes()?)
    }
}

fn push_cstr(buffer: &mut Vec<u8>, s: &str, page_number: PageNumber) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(DatabaseError::InvalidSchema {
            reason: format!("name {:?} on page {} contains a NUL byte", s, page_number),
        });
    }
    buffer.extend_from_slice(s.as_bytes());
    buffer.push(0);
    Ok(())
}
