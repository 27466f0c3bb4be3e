//! Property Tests
//!
//! Random insert/delete sequences checked against a plain list model.

use crate::common::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert(i64),
    /// Delete the n-th visible row (modulo the row count)
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-1000i64..1000).prop_map(Op::Insert),
        2 => any::<usize>().prop_map(Op::Delete),
    ]
}

fn table_type() -> impl Strategy<Value = TableType> {
    prop_oneof![Just(TableType::Memory), Just(TableType::Cached)]
}

/// Apply `op` through `conn` and to `model`
fn apply(conn: &Connection, model: &mut Vec<(RowKey, i64)>, op: &Op) {
    match op {
        Op::Insert(v) => {
            let key = conn.insert("t", vec![Value::Int(*v)]).unwrap();
            model.push((key, *v));
        }
        Op::Delete(n) => {
            if model.is_empty() {
                return;
            }
            let (key, _) = model.remove(n % model.len());
            assert!(conn.delete("t", key).unwrap());
        }
    }
}

fn values(model: &[(RowKey, i64)]) -> Vec<i64> {
    model.iter().map(|(_, v)| *v).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn autocommit_sequence_matches_model(
        table_type in table_type(),
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let db = db_with_table(table_type);
        let conn = db.connect();
        let mut model = Vec::new();

        for op in &ops {
            apply(&conn, &mut model, op);
            prop_assert_eq!(ints(&conn, "t"), values(&model));
        }
        prop_assert_eq!(stored_rows(&db, "t"), model.len());
        prop_assert_eq!(db.manager().row_version_count(), 0);
        prop_assert_eq!(db.metrics().queued_commits, 0);
    }

    #[test]
    fn repeatable_read_sees_exactly_its_snapshot(
        table_type in table_type(),
        before in prop::collection::vec(op(), 0..20),
        after in prop::collection::vec(op(), 0..20),
    ) {
        let db = db_with_table(table_type);
        let writer = db.connect();
        let mut model = Vec::new();
        for op in &before {
            apply(&writer, &mut model, op);
        }
        let snapshot = values(&model);

        let reader = manual(&db, IsolationLevel::RepeatableRead);
        prop_assert_eq!(ints(&reader, "t"), snapshot.clone());

        for op in &after {
            apply(&writer, &mut model, op);
        }
        prop_assert_eq!(ints(&reader, "t"), snapshot);

        reader.commit().unwrap();
        prop_assert_eq!(ints(&reader, "t"), values(&model));
        prop_assert_eq!(stored_rows(&db, "t"), model.len());
    }

    #[test]
    fn rollback_restores_committed_state(
        table_type in table_type(),
        setup in prop::collection::vec(op(), 0..15),
        discarded in prop::collection::vec(op(), 1..15),
    ) {
        let db = db_with_table(table_type);
        let mut model = Vec::new();
        apply_all(&db.connect(), &mut model, &setup);
        let committed = values(&model);

        let conn = manual(&db, IsolationLevel::ReadCommitted);
        let mut scratch = model.clone();
        apply_all(&conn, &mut scratch, &discarded);
        prop_assert_eq!(ints(&conn, "t"), values(&scratch));

        conn.rollback();
        prop_assert_eq!(ints(&conn, "t"), committed);
        prop_assert_eq!(stored_rows(&db, "t"), model.len());
        prop_assert_eq!(db.manager().row_version_count(), 0);
    }
}

fn apply_all(conn: &Connection, model: &mut Vec<(RowKey, i64)>, ops: &[Op]) {
    for op in ops {
        apply(conn, model, op);
    }
}
