//! Snapshot Visibility Tests
//!
//! What each isolation level lets a session see of other sessions' work.

use crate::common::*;

#[test]
fn repeatable_read_keeps_transaction_snapshot() {
    let db = db_with_table(TableType::Memory);
    let writer = db.connect();
    seed(&writer, "t", &[1]);

    let reader = manual(&db, IsolationLevel::RepeatableRead);
    assert_eq!(ints(&reader, "t"), vec![1]);

    seed(&writer, "t", &[2]);
    assert_eq!(ints(&reader, "t"), vec![1]);

    reader.commit().unwrap();
    assert_eq!(ints(&reader, "t"), vec![1, 2]);
}

#[test]
fn read_committed_sees_commits_between_statements() {
    let db = db_with_table(TableType::Memory);
    let writer = db.connect();
    let reader = manual(&db, IsolationLevel::ReadCommitted);

    assert!(ints(&reader, "t").is_empty());
    seed(&writer, "t", &[5]);
    assert_eq!(ints(&reader, "t"), vec![5]);
    assert!(reader.in_transaction());
}

#[test]
fn uncommitted_insert_visible_only_to_owner() {
    let db = db_with_table(TableType::Cached);
    let owner = manual(&db, IsolationLevel::ReadCommitted);
    let other = db.connect();

    let key = owner.insert("t", vec![Value::Int(9)]).unwrap();
    assert_eq!(owner.get("t", key).unwrap(), Some(vec![Value::Int(9)]));
    assert_eq!(other.get("t", key).unwrap(), None);
    assert!(ints(&other, "t").is_empty());
}

#[test]
fn uncommitted_delete_invisible_to_others() {
    let db = db_with_table(TableType::Memory);
    let setup = db.connect();
    let keys = seed(&setup, "t", &[1, 2]);

    let deleter = manual(&db, IsolationLevel::ReadCommitted);
    assert!(deleter.delete("t", keys[0]).unwrap());
    assert_eq!(ints(&deleter, "t"), vec![2]);
    assert_eq!(ints(&setup, "t"), vec![1, 2]);

    deleter.commit().unwrap();
    assert_eq!(ints(&setup, "t"), vec![2]);
}

#[test]
fn insert_then_delete_in_one_transaction_leaves_nothing() {
    let db = db_with_table(TableType::Memory);
    let conn = manual(&db, IsolationLevel::RepeatableRead);

    let key = conn.insert("t", vec![Value::Int(1)]).unwrap();
    assert!(conn.delete("t", key).unwrap());
    assert!(ints(&conn, "t").is_empty());
    conn.commit().unwrap();

    assert!(ints(&db.connect(), "t").is_empty());
    assert_eq!(stored_rows(&db, "t"), 0);
}

#[test]
fn serializable_reads_register_references() {
    let db = db_with_table(TableType::Memory);
    let setup = db.connect();
    seed(&setup, "t", &[1, 2, 3]);

    let reader = manual(&db, IsolationLevel::Serializable);
    assert_eq!(ints(&reader, "t"), vec![1, 2, 3]);
    assert_eq!(reader.session().action_count(), 3);

    // plain isolation levels read without registering
    let plain = manual(&db, IsolationLevel::RepeatableRead);
    assert_eq!(ints(&plain, "t"), vec![1, 2, 3]);
    assert_eq!(plain.session().action_count(), 0);
}
