use lembar::{
    executor::{
        insert::Inserter,
        scan::{ScanIterator, Scanner},
    },
    storage::{storage_manager::StorageManager, table_view::TableView},
    types::{
        error::DatabaseError,
        row::{FieldMeta, Row, RowMeta},
        value::Value,
    },
    utils::mock::TempDatabase,
};

fn create_test_table(storage: &mut StorageManager) -> Result<TableView, DatabaseError> {
    storage.create_table(
        "test_table",
        &["id", "name", "balance"],
        RowMeta::new(
            vec![
                FieldMeta::int(8).primary_key(),
                FieldMeta::fixed_char(10),
                FieldMeta::float(8),
            ],
            0,
        ),
    )?;
    storage.open_table("test_table")
}

fn account(id: i64, name: &str, balance: f64) -> Row {
    Row::new(vec![Value::Integer(id), Value::from(name), Value::Float(balance)])
}

fn all_rows(view: TableView) -> Result<Vec<Row>, DatabaseError> {
    let mut view = view;
    Scanner::reset(&mut view)?;
    ScanIterator::new(view).collect()
}

#[test]
fn test_inserter_table_name() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    let view = create_test_table(&mut storage)?;
    assert_eq!(Inserter::table_name(&view), "test_table");
    drop(view);
    storage.commit()
}

#[test]
fn test_single_insert() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    let mut view = create_test_table(&mut storage)?;

    Inserter::insert(&mut view, account(1, "Alice", 10.5))?;
    assert_eq!(all_rows(view)?, vec![account(1, "Alice", 10.5)]);
    storage.commit()
}

#[test]
fn test_batch_insert() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    let mut view = create_test_table(&mut storage)?;

    let rows = vec![
        account(3, "Charlie", 0.0),
        account(1, "Alice", 10.5),
        account(2, "Bob", -3.25),
    ];
    view.insert_batch(rows)?;
    let ids: Vec<Value> = all_rows(view)?.into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(ids, [1, 2, 3].map(Value::Integer).to_vec());
    storage.commit()
}

#[test]
fn test_batch_insert_stops_at_first_failure() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    let mut view = create_test_table(&mut storage)?;

    let rows = vec![
        account(1, "Alice", 1.0),
        account(2, "Bob", 2.0),
        account(1, "Again", 3.0),
        account(4, "Diana", 4.0),
    ];
    match view.insert_batch(rows) {
        Err(DatabaseError::Overlapped) => {}
        other => panic!("Expected Overlapped, got {:?}", other),
    }
    let names: Vec<Value> = all_rows(view)?.into_iter().map(|r| r.values[1].clone()).collect();
    assert_eq!(names, vec![Value::from("Alice"), Value::from("Bob")]);
    storage.commit()
}

#[test]
fn test_insert_type_mismatch() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    let mut view = create_test_table(&mut storage)?;

    let bad = Row::new(vec![Value::Integer(1), Value::Integer(2), Value::Float(1.0)]);
    match Inserter::insert(&mut view, bad) {
        Err(DatabaseError::TypeMismatch { .. }) => {}
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
    assert!(all_rows(view)?.is_empty());
    storage.commit()
}

#[test]
fn test_inserted_rows_survive_reopen() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    let mut view = create_test_table(&mut storage)?;
    view.insert_batch((0..500).map(|i| account(i, "bulk", i as f64)).collect())?;
    drop(view);
    storage.commit()?;

    let storage = db.open_read_only()?;
    let view = storage.open_table("test_table")?;
    let rows = all_rows(view)?;
    assert_eq!(rows.len(), 500);
    assert_eq!(rows[499], account(499, "bulk", 499.0));
    storage.abort();
    Ok(())
}

#[test]
fn test_aborted_inserts_are_discarded() -> Result<(), DatabaseError> {
    let db = TempDatabase::new()?;
    let mut storage = db.open()?;
    drop(create_test_table(&mut storage)?);
    storage.commit()?;

    let storage = db.open()?;
    let mut view = storage.open_table("test_table")?;
    view.insert_batch(vec![account(1, "Alice", 1.0), account(2, "Bob", 2.0)])?;
    drop(view);
    storage.abort();

    let storage = db.open_read_only()?;
    let view = storage.open_table("test_table")?;
    assert!(all_rows(view)?.is_empty());
    storage.abort();
    Ok(())
}
