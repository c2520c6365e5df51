use crate::{
    storage::{allocator::alloc_page, context::DbContext, schema::TableMeta},
    types::{PageNumber, error::Result, row::RowMeta},
};

/// Name of the auxiliary table indexing `field_id` of `table_name`.
pub fn secondary_table_name(table_name: &str, field_id: usize) -> String {
    format!("{}:second{}", table_name, field_id)
}

/// Allocates and persists the meta page of a new table, giving every
/// non-clustered field a secondary index table of `(field, clustered field)`
/// pairs clustered on the first column.
pub fn create_table(
    ctx: &DbContext,
    table_name: &str,
    column_names: &[String],
    row_meta: &RowMeta,
) -> Result<TableMeta> {
    let mut meta = create_bare_table(ctx, table_name, column_names.to_vec(), row_meta.clone())?;
    let cluster = row_meta.cluster_field_id;

    for field_id in 0..row_meta.field_count() {
        if field_id == cluster {
            continue;
        }
        let secondary_meta = RowMeta::new(
            vec![
                row_meta.fields[field_id].without_unique(),
                row_meta.fields[cluster].without_unique(),
            ],
            0,
        );
        let secondary = create_bare_table(
            ctx,
            &secondary_table_name(table_name, field_id),
            vec![column_names[field_id].clone(), column_names[cluster].clone()],
            secondary_meta,
        )?;
        meta.field_index_pages[field_id] = secondary.page_number;
    }

    meta.save(ctx)?;
    tracing::debug!(
        "created table {} at meta page {} with {} secondary indexes",
        table_name,
        meta.page_number,
        row_meta.field_count() - 1
    );
    Ok(meta)
}

fn create_bare_table(
    ctx: &DbContext,
    table_name: &str,
    column_names: Vec<String>,
    row_meta: RowMeta,
) -> Result<TableMeta> {
    let page_number: PageNumber = alloc_page(ctx)?;
    let meta = TableMeta::new(page_number, table_name, column_names, row_meta);
    meta.save(ctx)?;
    Ok(meta)
}
