//! Conflict Resolution Tests
//!
//! Concurrent writers to the same row: the first to commit wins, the other
//! fails (snapshot isolation) or redoes its statement (READ COMMITTED).

use crate::common::*;
use std::thread;
use std::time::Duration;

#[test]
fn repeatable_read_second_deleter_fails() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1]);

    let a = manual(&db, IsolationLevel::RepeatableRead);
    let b = manual(&db, IsolationLevel::RepeatableRead);
    assert_eq!(ints(&a, "t"), vec![1]);
    assert_eq!(ints(&b, "t"), vec![1]);

    assert!(a.delete("t", keys[0]).unwrap());
    a.commit().unwrap();

    // b still sees the row in its snapshot but cannot change it
    assert_eq!(ints(&b, "t"), vec![1]);
    let err = b.delete("t", keys[0]).unwrap_err();
    assert!(err.is_serialization_failure());
    assert!(err.is_retryable());

    let err = b.commit().unwrap_err();
    assert!(err.is_serialization_failure());
    assert!(!b.in_transaction());
    assert!(ints(&b, "t").is_empty());
}

#[test]
fn snapshot_delete_of_pending_row_fails_immediately() {
    let db = db_with_table(TableType::Cached);
    let keys = seed(&db.connect(), "t", &[1]);

    let a = manual(&db, IsolationLevel::ReadCommitted);
    assert!(a.delete("t", keys[0]).unwrap());

    let b = manual(&db, IsolationLevel::Serializable);
    let err = b.delete("t", keys[0]).unwrap_err();
    assert!(err.is_serialization_failure());

    a.rollback();
    b.rollback();
    assert_eq!(ints(&db.connect(), "t"), vec![1]);
}

#[test]
fn read_committed_delete_waits_then_skips_committed_delete() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1]);

    let a = manual(&db, IsolationLevel::ReadCommitted);
    assert!(a.delete("t", keys[0]).unwrap());

    let b = db.connect();
    let key = keys[0];
    let waiter = thread::spawn(move || b.delete("t", key));

    thread::sleep(Duration::from_millis(30));
    a.commit().unwrap();

    // redone after the owner committed: the row is gone
    assert!(!waiter.join().unwrap().unwrap());
    assert!(ints(&db.connect(), "t").is_empty());
}

#[test]
fn read_committed_delete_waits_then_succeeds_after_rollback() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1]);

    let a = manual(&db, IsolationLevel::ReadCommitted);
    assert!(a.delete("t", keys[0]).unwrap());

    let b = db.connect();
    let key = keys[0];
    let waiter = thread::spawn(move || b.delete("t", key));

    thread::sleep(Duration::from_millis(30));
    a.rollback();

    assert!(waiter.join().unwrap().unwrap());
    assert!(ints(&db.connect(), "t").is_empty());
}

#[test]
fn serializable_reader_invalidated_by_writer_commit() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1, 2]);

    let reader = manual(&db, IsolationLevel::Serializable);
    assert_eq!(reader.get("t", keys[0]).unwrap(), Some(vec![Value::Int(1)]));

    let writer = db.connect();
    assert!(writer.delete("t", keys[0]).unwrap());

    // the stale reader learns at its next write
    let err = reader.insert("t", vec![Value::Int(3)]).unwrap_err();
    assert!(err.is_serialization_failure());
    let err = reader.commit().unwrap_err();
    assert!(err.is_serialization_failure());
    assert_eq!(ints(&db.connect(), "t"), vec![2]);
}

#[test]
fn serializable_read_after_concurrent_delete_fails_at_commit() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1, 2]);

    let reader = manual(&db, IsolationLevel::Serializable);
    assert!(reader.get("t", keys[1]).unwrap().is_some());

    let writer = db.connect();
    assert!(writer.delete("t", keys[0]).unwrap());

    // the snapshot still shows the deleted row
    assert_eq!(reader.get("t", keys[0]).unwrap(), Some(vec![Value::Int(1)]));
    reader.insert("t", vec![Value::Int(3)]).unwrap();

    let err = reader.commit().unwrap_err();
    assert!(err.is_serialization_failure());
    assert!(!reader.in_transaction());
    assert_eq!(ints(&db.connect(), "t"), vec![2]);
}

#[test]
fn serializable_reader_of_untouched_row_commits() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[1, 2]);

    let reader = manual(&db, IsolationLevel::Serializable);
    assert!(reader.get("t", keys[0]).unwrap().is_some());

    let writer = db.connect();
    assert!(writer.delete("t", keys[1]).unwrap());

    reader.insert("t", vec![Value::Int(3)]).unwrap();
    reader.commit().unwrap();
    assert_eq!(ints(&db.connect(), "t"), vec![1, 3]);
}

#[test]
fn retry_after_serialization_failure_succeeds() {
    let db = db_with_table(TableType::Memory);
    let keys = seed(&db.connect(), "t", &[100]);

    let a = manual(&db, IsolationLevel::RepeatableRead);
    let b = manual(&db, IsolationLevel::RepeatableRead);
    assert_eq!(ints(&a, "t"), vec![100]);
    assert_eq!(ints(&b, "t"), vec![100]);

    // a: 100 -> 90
    assert!(a.delete("t", keys[0]).unwrap());
    a.insert("t", vec![Value::Int(90)]).unwrap();
    a.commit().unwrap();

    // b: 100 -> 80 fails, then retries on fresh data
    assert!(b.delete("t", keys[0]).is_err());
    assert!(b.commit().is_err());

    let rows = b.scan("t").unwrap();
    assert_eq!(rows.len(), 1);
    let (key, values) = &rows[0];
    assert_eq!(values[0], Value::Int(90));
    assert!(b.delete("t", *key).unwrap());
    b.insert("t", vec![Value::Int(70)]).unwrap();
    b.commit().unwrap();

    assert_eq!(ints(&db.connect(), "t"), vec![70]);
    assert!(db.metrics().serialization_failures >= 1);
}
