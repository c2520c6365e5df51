use std::collections::BTreeMap;

use lembar::{
    storage::{storage_manager::StorageManager, table_view::TableView},
    types::{
        error::DatabaseError,
        row::{FieldMeta, FieldValue, Row, RowMeta},
        value::Value,
    },
    utils::mock::TempDatabase,
};
use proptest::prelude::*;

fn create_people(storage: &mut StorageManager) -> TableView {
    storage
        .create_table(
            "t",
            &["id", "name"],
            RowMeta::new(
                vec![FieldMeta::int(8).primary_key(), FieldMeta::fixed_char(8)],
                0,
            ),
        )
        .unwrap();
    storage.open_table("t").unwrap()
}

fn person(id: i64) -> Row {
    Row::new(vec![Value::Integer(id), Value::from(format!("name{}", id).as_str())])
}

fn create_scores(storage: &mut StorageManager) -> TableView {
    storage
        .create_table(
            "scores",
            &["player", "score", "email"],
            RowMeta::new(
                vec![
                    FieldMeta::fixed_char(12).not_null(),
                    FieldMeta::int(4),
                    FieldMeta::fixed_char(20).unique(),
                ],
                1,
            ),
        )
        .unwrap();
    storage.open_table("scores").unwrap()
}

fn score(player: &str, score: Option<i64>, email: Option<&str>) -> Row {
    Row::new(vec![
        Value::from(player),
        score.map_or(Value::Null, Value::Integer),
        email.map_or(Value::Null, Value::from),
    ])
}

fn drain_cursor(view: &mut TableView) -> Vec<Row> {
    view.reset().unwrap();
    let mut rows = Vec::new();
    while view.has_next().unwrap() {
        rows.push(view.next().unwrap());
    }
    rows
}

#[test]
fn test_insert_search_delete() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    for id in 0..10 {
        view.insert(person(id)).unwrap();
    }
    assert_eq!(
        view.search(0, &Value::Integer(5)).unwrap(),
        vec![Row::new(vec![Value::Integer(5), Value::from("name5")])]
    );

    assert_eq!(view.delete(&Value::Integer(5), &[]).unwrap(), 1);
    assert!(view.search(0, &Value::Integer(5)).unwrap().is_empty());
    assert_eq!(view.rows().unwrap().len(), 9);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_one_index_entry_per_data_page() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    let per_page = view.row_meta().rows_per_page() as i64;
    let total = per_page * 4 + 7;
    for id in 0..total {
        view.insert(person(id)).unwrap();
    }

    let pages = view.data_pages().unwrap();
    assert!(pages.len() >= 2);
    assert_eq!(
        pages.iter().map(|(_, rows)| *rows as i64).sum::<i64>(),
        total
    );

    let entries = view.index_entries().unwrap();
    assert_eq!(entries.len(), pages.len());
    let mut indexed: Vec<_> = entries.iter().map(|e| e.page_number).collect();
    let mut chained: Vec<_> = pages.iter().map(|(page, _)| *page).collect();
    indexed.sort_unstable();
    chained.sort_unstable();
    assert_eq!(indexed, chained);

    let ids: Vec<i64> = drain_cursor(&mut view)
        .iter()
        .map(|row| match row.values[0] {
            Value::Integer(id) => id,
            ref other => panic!("unexpected id {:?}", other),
        })
        .collect();
    assert_eq!(ids, (0..total).collect::<Vec<_>>());

    for id in [0, per_page - 1, per_page, total / 2, total - 1] {
        assert_eq!(view.search(0, &Value::Integer(id)).unwrap(), vec![person(id)]);
    }
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_random_insert_order_scans_sorted() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    // 0..1500 visited in a scrambled but complete order.
    let ids: Vec<i64> = (0..1500).map(|i| (i * 577) % 1500).collect();
    for &id in &ids {
        view.insert(person(id)).unwrap();
    }
    let scanned: Vec<Row> = drain_cursor(&mut view);
    assert_eq!(scanned, (0..1500).map(person).collect::<Vec<_>>());
    for &id in ids.iter().step_by(97) {
        assert_eq!(view.search(0, &Value::Integer(id)).unwrap(), vec![person(id)]);
    }
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_deleting_everything_releases_pages() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    for id in 0..800 {
        view.insert(person(id)).unwrap();
    }
    assert!(view.data_pages().unwrap().len() > 2);

    for id in (0..800).rev().step_by(2) {
        assert_eq!(view.delete(&Value::Integer(id), &[]).unwrap(), 1);
    }
    for id in (0..800).step_by(2) {
        assert_eq!(view.delete(&Value::Integer(id), &[]).unwrap(), 1);
    }
    assert!(view.data_pages().unwrap().is_empty());
    assert!(view.index_entries().unwrap().is_empty());
    assert_eq!(view.meta().first_data_page, 0);
    assert!(drain_cursor(&mut view).is_empty());

    view.insert(person(3)).unwrap();
    assert_eq!(view.rows().unwrap(), vec![person(3)]);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_rows_persist_after_commit() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);
    for id in 0..300 {
        view.insert(person(id)).unwrap();
    }
    drop(view);
    storage.commit().unwrap();

    let storage = db.open_read_only().unwrap();
    let mut view = storage.open_table("t").unwrap();
    assert_eq!(view.rows().unwrap().len(), 300);
    assert_eq!(view.search(1, &Value::from("name42")).unwrap(), vec![person(42)]);
    drop(view);
    storage.abort();
}

#[test]
fn test_duplicate_primary_key_is_rejected() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    view.insert(person(1)).unwrap();
    assert!(matches!(view.insert(person(1)), Err(DatabaseError::Overlapped)));
    assert_eq!(view.rows().unwrap().len(), 1);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_unique_secondary_field_is_enforced() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_scores(&mut storage);

    view.insert(score("ana", Some(10), Some("ana@example.org"))).unwrap();
    assert!(matches!(
        view.insert(score("bo", Some(12), Some("ana@example.org"))),
        Err(DatabaseError::Overlapped)
    ));
    view.insert(score("bo", Some(12), None)).unwrap();
    view.insert(score("cy", Some(12), None)).unwrap();
    assert_eq!(view.rows().unwrap().len(), 3);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_null_in_not_null_field_is_rejected() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    let row = Row::new(vec![Value::Null, Value::from("ghost")]);
    assert!(matches!(view.insert(row), Err(DatabaseError::NilValue { field: 0 })));

    let mut scores = create_scores(&mut storage);
    assert!(matches!(
        scores.insert(Row::new(vec![Value::Null, Value::Integer(1), Value::Null])),
        Err(DatabaseError::NilValue { field: 0 })
    ));
    drop((view, scores));
    storage.commit().unwrap();
}

#[test]
fn test_malformed_rows_are_rejected() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    assert!(matches!(
        view.insert(Row::new(vec![Value::Integer(1)])),
        Err(DatabaseError::ColumnCountMismatch { expected: 2, actual: 1 })
    ));
    assert!(matches!(
        view.insert(Row::new(vec![Value::from("x"), Value::from("y")])),
        Err(DatabaseError::TypeMismatch { .. })
    ));
    assert!(view.rows().unwrap().is_empty());
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_long_strings_are_truncated() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    view.insert(Row::new(vec![Value::Integer(1), Value::from("abcdefghijkl")]))
        .unwrap();
    let expected = vec![Row::new(vec![Value::Integer(1), Value::from("abcdefgh")])];
    assert_eq!(view.search(1, &Value::from("abcdefgh")).unwrap(), expected);
    assert_eq!(view.search(1, &Value::from("abcdefghijkl")).unwrap(), expected);
    assert!(view.search(1, &Value::from("abcdefg")).unwrap().is_empty());
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_nulls_scan_first() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_scores(&mut storage);

    view.insert(score("c", Some(30), None)).unwrap();
    view.insert(score("a", None, None)).unwrap();
    view.insert(score("d", Some(-4), None)).unwrap();
    view.insert(score("b", None, None)).unwrap();
    view.insert(score("e", Some(30), None)).unwrap();

    let scores: Vec<Value> = drain_cursor(&mut view)
        .into_iter()
        .map(|row| row.values[1].clone())
        .collect();
    assert_eq!(
        scores,
        vec![
            Value::Null,
            Value::Null,
            Value::Integer(-4),
            Value::Integer(30),
            Value::Integer(30),
        ]
    );

    let mut nulls = view.search(1, &Value::Null).unwrap();
    nulls.sort_by(|a, b| a.values[0].compare(&b.values[0]));
    assert_eq!(nulls.len(), 2);
    assert_eq!(view.search(1, &Value::Integer(30)).unwrap().len(), 2);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_duplicate_clustered_values_span_pages() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_scores(&mut storage);

    let per_page = view.row_meta().rows_per_page();
    let copies = per_page * 2 + 5;
    for i in 0..copies {
        view.insert(score(&format!("p{}", i), Some(7), None)).unwrap();
    }
    view.insert(score("low", Some(1), None)).unwrap();
    view.insert(score("high", Some(9), None)).unwrap();
    assert!(view.data_pages().unwrap().len() >= 3);

    assert_eq!(view.search(1, &Value::Integer(7)).unwrap().len(), copies);
    assert_eq!(view.search(0, &Value::from("p17")).unwrap().len(), 1);

    let filter = [FieldValue::new(0, "p3")];
    assert_eq!(view.delete(&Value::Integer(7), &filter).unwrap(), 1);
    assert_eq!(view.delete(&Value::Integer(7), &[]).unwrap(), copies - 1);
    assert!(view.search(0, &Value::from("p17")).unwrap().is_empty());

    let left: Vec<Value> = view
        .rows()
        .unwrap()
        .into_iter()
        .map(|row| row.values[0].clone())
        .collect();
    assert_eq!(left, vec![Value::from("low"), Value::from("high")]);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_delete_with_filters() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_scores(&mut storage);
    view.insert(score("ana", Some(5), None)).unwrap();
    view.insert(score("bo", Some(5), None)).unwrap();
    view.insert(score("cy", Some(6), None)).unwrap();

    assert_eq!(
        view.delete(&Value::Integer(5), &[FieldValue::new(0, "zed")]).unwrap(),
        0
    );
    assert_eq!(
        view.delete(&Value::Integer(5), &[FieldValue::new(0, "bo")]).unwrap(),
        1
    );
    assert_eq!(view.delete(&Value::Integer(42), &[]).unwrap(), 0);
    assert!(matches!(
        view.delete(&Value::Integer(5), &[FieldValue::new(9, 1i64)]),
        Err(DatabaseError::ColumnIndexOutOfBounds { index: 9 })
    ));
    assert!(view.search(0, &Value::from("bo")).unwrap().is_empty());
    assert_eq!(view.rows().unwrap().len(), 2);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_update_non_clustered_field() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);
    for id in 0..5 {
        view.insert(person(id)).unwrap();
    }

    let updated = view
        .update(&Value::Integer(2), &[], &[FieldValue::new(1, "renamed")])
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(
        view.search(0, &Value::Integer(2)).unwrap(),
        vec![Row::new(vec![Value::Integer(2), Value::from("renamed")])]
    );
    assert!(view.search(1, &Value::from("name2")).unwrap().is_empty());
    assert_eq!(view.search(1, &Value::from("renamed")).unwrap().len(), 1);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_update_moves_clustered_value() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);
    for id in 0..5 {
        view.insert(person(id)).unwrap();
    }

    view.update(&Value::Integer(0), &[], &[FieldValue::new(0, 100i64)])
        .unwrap();
    let ids: Vec<Value> = drain_cursor(&mut view)
        .into_iter()
        .map(|row| row.values[0].clone())
        .collect();
    assert_eq!(
        ids,
        [1, 2, 3, 4, 100].map(Value::Integer).to_vec()
    );
    assert_eq!(view.search(1, &Value::from("name0")).unwrap().len(), 1);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_failed_update_restores_rows() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);
    for id in 0..3 {
        view.insert(person(id)).unwrap();
    }

    let result = view.update(&Value::Integer(1), &[], &[FieldValue::new(0, 2i64)]);
    assert!(matches!(result, Err(DatabaseError::Overlapped)));
    assert_eq!(view.rows().unwrap(), (0..3).map(person).collect::<Vec<_>>());

    assert!(matches!(
        view.update(&Value::Integer(1), &[], &[FieldValue::new(5, 2i64)]),
        Err(DatabaseError::ColumnIndexOutOfBounds { index: 5 })
    ));
    assert_eq!(view.rows().unwrap().len(), 3);
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_cursor_end_of_iteration() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_people(&mut storage);

    view.reset().unwrap();
    assert!(!view.has_next().unwrap());
    assert!(matches!(view.next(), Err(DatabaseError::EndOfIteration)));

    view.insert(person(1)).unwrap();
    view.reset().unwrap();
    assert_eq!(view.next().unwrap(), person(1));
    assert!(matches!(view.next(), Err(DatabaseError::EndOfIteration)));
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_column_names_and_metadata() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut view = create_scores(&mut storage);

    assert_eq!(view.table_name(), "scores");
    assert_eq!(
        view.column_names(),
        vec!["scores.player", "scores.score", "scores.email"]
    );
    assert_eq!(view.column_metas().len(), 3);
    assert_eq!(view.secondary_fields(), vec![0, 2]);
    assert!(matches!(
        view.search(3, &Value::Integer(1)),
        Err(DatabaseError::ColumnIndexOutOfBounds { index: 3 })
    ));
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_views_share_session_state() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    let mut writer = create_people(&mut storage);
    let mut reader = storage.open_table("t").unwrap();

    for id in 0..400 {
        writer.insert(person(id)).unwrap();
    }
    assert_eq!(reader.rows().unwrap().len(), 400);
    assert_eq!(reader.search(0, &Value::Integer(399)).unwrap(), vec![person(399)]);
    drop((writer, reader));
    storage.commit().unwrap();
}

fn assert_one_index_entry_per_page(view: &mut TableView) {
    let pages = view.data_pages().unwrap();
    let entries = view.index_entries().unwrap();
    assert_eq!(entries.len(), pages.len());
    let mut indexed: Vec<_> = entries.iter().map(|e| e.page_number).collect();
    let mut chained: Vec<_> = pages.iter().map(|(page, _)| *page).collect();
    indexed.sort_unstable();
    chained.sort_unstable();
    assert_eq!(indexed, chained);
}

fn assert_scan_sorted(rows: &[Row], field_id: usize) {
    for pair in rows.windows(2) {
        assert!(
            pair[0].values[field_id].compare(&pair[1].values[field_id]).is_lt(),
            "{:?} before {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_narrow_float_keys_match_their_literals() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    storage
        .create_table(
            "points",
            &["x", "y"],
            RowMeta::new(vec![FieldMeta::float(4), FieldMeta::float(4)], 0),
        )
        .unwrap();
    let mut view = storage.open_table("points").unwrap();

    view.insert(Row::new(vec![Value::Float(1.1), Value::Float(2.2)]))
        .unwrap();
    let stored = vec![Row::new(vec![
        Value::Float(1.1f32 as f64),
        Value::Float(2.2f32 as f64),
    ])];
    assert_eq!(view.search(0, &Value::Float(1.1)).unwrap(), stored);
    assert_eq!(view.search(1, &Value::Float(2.2)).unwrap(), stored);

    assert_eq!(
        view.delete(&Value::Float(1.1), &[FieldValue::new(1, 9.9f64)]).unwrap(),
        0
    );
    assert_eq!(
        view.update(
            &Value::Float(1.1),
            &[FieldValue::new(1, 2.2f64)],
            &[FieldValue::new(1, 3.3f64)],
        )
        .unwrap(),
        1
    );
    assert_eq!(view.search(1, &Value::Float(3.3)).unwrap().len(), 1);
    assert_eq!(
        view.delete(&Value::Float(1.1), &[FieldValue::new(1, 3.3f64)]).unwrap(),
        1
    );
    assert!(view.rows().unwrap().is_empty());
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_char_clustered_table_across_pages() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    storage
        .create_table(
            "words",
            &["word", "n"],
            RowMeta::new(
                vec![FieldMeta::fixed_char(6).primary_key(), FieldMeta::int(4)],
                0,
            ),
        )
        .unwrap();
    let mut view = storage.open_table("words").unwrap();

    let total = view.row_meta().rows_per_page() * 3 + 11;
    for n in 0..total {
        let n = (n * 577) % total;
        view.insert(Row::new(vec![
            Value::from(format!("w{}", n).as_str()),
            Value::Integer(n as i64),
        ]))
        .unwrap();
    }
    assert!(view.data_pages().unwrap().len() >= 3);
    assert_one_index_entry_per_page(&mut view);

    let scanned = drain_cursor(&mut view);
    assert_eq!(scanned.len(), total);
    assert_scan_sorted(&scanned, 0);

    for n in [0, 1, total / 2, total - 1] {
        let word = Value::from(format!("w{}", n).as_str());
        let rows = view.search(0, &word).unwrap();
        assert_eq!(rows, vec![Row::new(vec![word.clone(), Value::Integer(n as i64)])]);
        assert_eq!(view.search(1, &Value::Integer(n as i64)).unwrap(), rows);
    }

    for n in (0..total).step_by(3) {
        let word = Value::from(format!("w{}", n).as_str());
        assert_eq!(view.delete(&word, &[]).unwrap(), 1);
    }
    assert!(view.search(0, &Value::from("w3")).unwrap().is_empty());
    assert_eq!(view.search(0, &Value::from("w4")).unwrap().len(), 1);
    assert_eq!(view.rows().unwrap().len(), total - total.div_ceil(3));
    assert_one_index_entry_per_page(&mut view);

    view.insert(Row::new(vec![Value::from("overlong"), Value::Integer(-1)]))
        .unwrap();
    assert_eq!(
        view.search(0, &Value::from("overlong")).unwrap(),
        vec![Row::new(vec![Value::from("overlo"), Value::Integer(-1)])]
    );
    assert!(matches!(
        view.insert(Row::new(vec![Value::from("overloaded"), Value::Integer(-2)])),
        Err(DatabaseError::Overlapped)
    ));
    view.update(&Value::from("overlong"), &[], &[FieldValue::new(1, -3i64)])
        .unwrap();
    assert_eq!(view.search(1, &Value::Integer(-3)).unwrap().len(), 1);
    assert_eq!(view.delete(&Value::from("overlong"), &[]).unwrap(), 1);
    assert!(view.search(1, &Value::Integer(-3)).unwrap().is_empty());
    drop(view);
    storage.commit().unwrap();
}

#[test]
fn test_float_clustered_table_across_pages() {
    let db = TempDatabase::new().unwrap();
    let mut storage = db.open().unwrap();
    storage
        .create_table(
            "samples",
            &["x", "label"],
            RowMeta::new(vec![FieldMeta::float(4).not_null(), FieldMeta::int(8)], 0),
        )
        .unwrap();
    let mut view = storage.open_table("samples").unwrap();

    let total = view.row_meta().rows_per_page() * 3 + 5;
    let x_of = |i: usize| i as f64 * 0.1 - 50.0;
    for step in 0..total {
        let i = (step * 577) % total;
        view.insert(Row::new(vec![Value::Float(x_of(i)), Value::Integer(i as i64)]))
            .unwrap();
    }
    assert!(view.data_pages().unwrap().len() >= 3);
    assert_one_index_entry_per_page(&mut view);

    let scanned = drain_cursor(&mut view);
    assert_eq!(scanned.len(), total);
    assert_scan_sorted(&scanned, 0);
    let labels: Vec<Value> = scanned.iter().map(|row| row.values[1].clone()).collect();
    assert_eq!(
        labels,
        (0..total as i64).map(Value::Integer).collect::<Vec<_>>()
    );

    for i in [0, 1, 500, total - 1] {
        let rows = view.search(0, &Value::Float(x_of(i))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[1], Value::Integer(i as i64));
        assert_eq!(view.search(1, &Value::Integer(i as i64)).unwrap(), rows);
    }

    for i in (0..total).filter(|i| i % 2 == 1) {
        assert_eq!(view.delete(&Value::Float(x_of(i)), &[]).unwrap(), 1);
    }
    assert!(view.search(0, &Value::Float(x_of(1))).unwrap().is_empty());
    assert_eq!(view.rows().unwrap().len(), total.div_ceil(2));
    assert_one_index_entry_per_page(&mut view);

    assert_eq!(
        view.update(
            &Value::Float(x_of(2)),
            &[FieldValue::new(1, 2i64)],
            &[FieldValue::new(1, 7000i64)],
        )
        .unwrap(),
        1
    );
    assert_eq!(view.search(1, &Value::Integer(7000)).unwrap().len(), 1);
    drop(view);
    storage.commit().unwrap();
}

fn score_rows() -> impl Strategy<Value = Vec<(Option<i64>, Option<i64>)>> {
    prop::collection::vec(
        (prop::option::of(-5i64..5), prop::option::of(0i64..4)),
        1..120,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn secondary_search_agrees_with_scan(rows in score_rows(), deletes in prop::collection::vec(-5i64..5, 0..4)) {
        let db = TempDatabase::new().unwrap();
        let mut storage = db.open().unwrap();
        storage
            .create_table(
                "events",
                &["seq", "kind", "level"],
                RowMeta::new(
                    vec![FieldMeta::int(4).not_null(), FieldMeta::int(8), FieldMeta::int(2)],
                    1,
                ),
            )
            .unwrap();
        let mut view = storage.open_table("events").unwrap();

        for (seq, (kind, level)) in rows.iter().enumerate() {
            view.insert(Row::new(vec![
                Value::Integer(seq as i64),
                kind.map_or(Value::Null, Value::Integer),
                level.map_or(Value::Null, Value::Integer),
            ]))
            .unwrap();
        }
        for kind in &deletes {
            view.delete(&Value::Integer(*kind), &[]).unwrap();
        }

        view.reset().unwrap();
        let mut scanned = Vec::new();
        while view.has_next().unwrap() {
            scanned.push(view.next().unwrap());
        }
        for pair in scanned.windows(2) {
            prop_assert!(pair[0].values[1].compare(&pair[1].values[1]).is_le());
        }
        let expected = rows
            .iter()
            .filter(|(kind, _)| kind.is_none_or(|k| !deletes.contains(&k)))
            .count();
        prop_assert_eq!(scanned.len(), expected);

        let mut by_level: BTreeMap<Option<i64>, Vec<Value>> = BTreeMap::new();
        for row in &scanned {
            let level = match row.values[2] {
                Value::Integer(l) => Some(l),
                _ => None,
            };
            by_level.entry(level).or_default().push(row.values[0].clone());
        }
        for level in [None, Some(0), Some(1), Some(2), Some(3)] {
            let key = level.map_or(Value::Null, Value::Integer);
            let mut found: Vec<Value> = view
                .search(2, &key)
                .unwrap()
                .into_iter()
                .map(|row| row.values[0].clone())
                .collect();
            found.sort_by(|a, b| a.compare(b));
            let mut want = by_level.remove(&level).unwrap_or_default();
            want.sort_by(|a, b| a.compare(b));
            prop_assert_eq!(found, want);
        }

        for row in &scanned {
            let seq = &row.values[0];
            let hits = view.search(0, seq).unwrap();
            prop_assert_eq!(hits, vec![row.clone()]);
        }
        drop(view);
        storage.commit().unwrap();
    }
}
