//! Rollback Tests
//!
//! Full, statement-level and savepoint rollback.

use crate::common::*;

#[test]
fn rollback_discards_inserts_and_deletes() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1, 2]);

    let conn = manual(&db, IsolationLevel::ReadCommitted);
    conn.insert("t", vec![Value::Int(3)]).unwrap();
    assert!(conn.delete("t", keys[0]).unwrap());
    assert_eq!(ints(&conn, "t"), vec![2, 3]);

    conn.rollback();
    assert!(!conn.in_transaction());
    assert_eq!(ints(&conn, "t"), vec![1, 2]);
    assert_eq!(stored_rows(&db, "t"), 2);
    assert_eq!(db.metrics().transactions_rolled_back, 1);
}

#[test]
fn savepoint_rollback_keeps_earlier_work() {
    let db = db_with_table(TableType::Cached);
    let conn = manual(&db, IsolationLevel::RepeatableRead);

    conn.insert("t", vec![Value::Int(1)]).unwrap();
    conn.savepoint("one");
    conn.insert("t", vec![Value::Int(2)]).unwrap();
    conn.savepoint("two");
    conn.insert("t", vec![Value::Int(3)]).unwrap();

    conn.rollback_to_savepoint("two").unwrap();
    assert_eq!(ints(&conn, "t"), vec![1, 2]);

    conn.rollback_to_savepoint("one").unwrap();
    assert_eq!(ints(&conn, "t"), vec![1]);
    // savepoints taken after the target are gone
    assert!(conn.rollback_to_savepoint("two").is_err());

    conn.commit().unwrap();
    assert_eq!(ints(&db.connect(), "t"), vec![1]);
}

#[test]
fn savepoint_rollback_restores_deleted_row() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1]);

    let conn = manual(&db, IsolationLevel::ReadCommitted);
    conn.savepoint("before");
    assert!(conn.delete("t", keys[0]).unwrap());
    assert!(ints(&conn, "t").is_empty());

    conn.rollback_to_savepoint("before").unwrap();
    assert_eq!(ints(&conn, "t"), vec![1]);

    // the row can be deleted again afterwards
    assert!(conn.delete("t", keys[0]).unwrap());
    conn.commit().unwrap();
    assert!(ints(&db.connect(), "t").is_empty());
}

#[test]
fn savepoint_rollback_keeps_own_insert_deleted_after_it() {
    let db = db_with_table(TableType::Memory);
    let conn = manual(&db, IsolationLevel::ReadCommitted);

    let key = conn.insert("t", vec![Value::Int(1)]).unwrap();
    conn.savepoint("sp");
    assert!(conn.delete("t", key).unwrap());
    assert!(ints(&conn, "t").is_empty());

    conn.rollback_to_savepoint("sp").unwrap();
    assert_eq!(ints(&conn, "t"), vec![1]);
    assert_eq!(stored_rows(&db, "t"), 1);

    conn.commit().unwrap();
    assert_eq!(ints(&db.connect(), "t"), vec![1]);
}

#[test]
fn unknown_savepoint_is_rejected() {
    let db = db_with_table(TableType::Memory);
    let conn = manual(&db, IsolationLevel::ReadCommitted);
    let err = conn.rollback_to_savepoint("nope").unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
    assert!(conn.release_savepoint("nope").is_err());
}

#[test]
fn release_savepoint_keeps_changes() {
    let db = db_with_table(TableType::Memory);
    let conn = manual(&db, IsolationLevel::ReadCommitted);
    conn.savepoint("sp");
    conn.insert("t", vec![Value::Int(1)]).unwrap();
    conn.release_savepoint("sp").unwrap();
    assert!(conn.rollback_to_savepoint("sp").is_err());

    conn.commit().unwrap();
    assert_eq!(ints(&db.connect(), "t"), vec![1]);
}

#[test]
fn aborted_transaction_loses_all_work_at_commit() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1]);

    let a = manual(&db, IsolationLevel::RepeatableRead);
    assert_eq!(ints(&a, "t"), vec![1]);
    a.insert("t", vec![Value::Int(2)]).unwrap();

    let b = db.connect();
    assert!(b.delete("t", keys[0]).unwrap());

    // a's delete conflicts; the failed statement is undone and the
    // transaction is marked for abort
    assert!(a.delete("t", keys[0]).unwrap_err().is_serialization_failure());
    assert!(a.commit().unwrap_err().is_serialization_failure());
    assert!(ints(&db.connect(), "t").is_empty());
}

#[test]
fn dropped_connection_rolls_back() {
    let db = db_with_table(TableType::Memory);
    {
        let conn = manual(&db, IsolationLevel::ReadCommitted);
        conn.insert("t", vec![Value::Int(1)]).unwrap();
        assert_eq!(db.metrics().transactions_active, 1);
    }
    assert_eq!(db.metrics().transactions_active, 0);
    assert_eq!(stored_rows(&db, "t"), 0);
}

#[test]
fn failed_autocommit_statement_rolls_back() {
    let db = db_with_table(TableType::Memory);
    let conn = db.connect();
    assert!(conn.create_table("t", TableType::Memory).is_err());
    assert!(!conn.in_transaction());
    assert_eq!(db.metrics().transactions_active, 0);
}
