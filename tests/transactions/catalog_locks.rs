//! Lock Coordination Tests
//!
//! Catalog changes wait for open transactions, LOCKS mode takes table locks,
//! and waits that would close a cycle are refused.

use crate::common::*;
use std::thread;
use std::time::Duration;

fn locks_db(tables: &[&str]) -> Database {
    init_tracing();
    let db = Database::builder()
        .transaction_control(TransactionControl::Locks)
        .open();
    let setup = db.connect();
    for table in tables {
        setup.create_table(table, TableType::Memory).unwrap();
    }
    db
}

#[test]
fn catalog_change_waits_for_open_transaction() {
    let db = db_with_table(TableType::Memory);
    let reader = manual(&db, IsolationLevel::ReadCommitted);
    assert!(ints(&reader, "t").is_empty());

    let ddl = db.connect();
    let ddl_id = ddl.session_id();
    let handle = thread::spawn(move || ddl.create_table("u", TableType::Memory));

    wait_until("ddl to wait", || {
        db.manager().blockers_of(ddl_id) == vec![reader.session_id()]
    });
    assert_eq!(db.table_count(), 1);

    reader.commit().unwrap();
    handle.join().unwrap().unwrap();
    assert_eq!(db.table_count(), 2);
}

#[test]
fn mvcc_ordinary_statements_do_not_wait() {
    let db = db_with_table(TableType::Memory);
    let a = manual(&db, IsolationLevel::ReadCommitted);
    let b = manual(&db, IsolationLevel::ReadCommitted);

    a.insert("t", vec![Value::Int(1)]).unwrap();
    b.insert("t", vec![Value::Int(2)]).unwrap();
    assert_eq!(ints(&a, "t"), vec![1]);
    assert_eq!(ints(&b, "t"), vec![2]);
    a.commit().unwrap();
    b.commit().unwrap();
    assert_eq!(ints(&db.connect(), "t"), vec![1, 2]);
}

#[test]
fn catalog_wait_cycle_is_refused() {
    let db = db_with_table(TableType::Memory);
    let a = manual(&db, IsolationLevel::ReadCommitted);
    let b = manual(&db, IsolationLevel::ReadCommitted);
    let c = manual(&db, IsolationLevel::ReadCommitted);
    for conn in [&a, &b, &c] {
        assert!(ints(conn, "t").is_empty());
    }
    let (a_id, b_id, c_id) = (a.session_id(), b.session_id(), c.session_id());

    let handle = thread::spawn(move || {
        let created = a.create_table("u", TableType::Memory);
        a.commit().unwrap();
        created
    });
    wait_until("a to wait for b and c", || {
        db.manager().blockers_of(a_id) == vec![b_id, c_id]
    });

    // b would wait for a, which already waits for b
    let err = b.create_table("v", TableType::Memory).unwrap_err();
    assert!(matches!(err, Error::Deadlock(_)));
    assert!(err.is_retryable());
    assert!(db.manager().blockers_of(b_id).is_empty());

    b.rollback();
    c.rollback();
    handle.join().unwrap().unwrap();
    assert_eq!(db.table_count(), 2);
}

#[test]
fn locks_mode_writer_waits_for_reader() {
    let db = locks_db(&["t"]);
    let reader = manual(&db, IsolationLevel::ReadCommitted);
    assert!(ints(&reader, "t").is_empty());

    let writer = db.connect();
    let writer_id = writer.session_id();
    let handle = thread::spawn(move || writer.insert("t", vec![Value::Int(1)]));

    wait_until("writer to wait", || {
        db.manager().blockers_of(writer_id) == vec![reader.session_id()]
    });
    // read locks are held until the transaction ends
    assert!(ints(&reader, "t").is_empty());

    reader.commit().unwrap();
    handle.join().unwrap().unwrap();
    assert_eq!(ints(&db.connect(), "t"), vec![1]);
}

#[test]
fn locks_mode_three_table_cycle_is_refused() {
    let db = locks_db(&["t1", "t2", "t3"]);
    let a = manual(&db, IsolationLevel::ReadCommitted);
    let b = manual(&db, IsolationLevel::ReadCommitted);
    let c = manual(&db, IsolationLevel::ReadCommitted);
    assert!(ints(&a, "t1").is_empty());
    assert!(ints(&b, "t2").is_empty());
    assert!(ints(&c, "t3").is_empty());
    let (a_id, b_id, c_id) = (a.session_id(), b.session_id(), c.session_id());

    let a_handle = thread::spawn(move || {
        let result = a.insert("t2", vec![Value::Int(1)]);
        (a, result)
    });
    wait_until("a to wait for b", || db.manager().blockers_of(a_id) == vec![b_id]);

    let b_handle = thread::spawn(move || {
        let result = b.insert("t3", vec![Value::Int(2)]);
        (b, result)
    });
    wait_until("b to wait for c", || db.manager().blockers_of(b_id) == vec![c_id]);

    let err = c.insert("t1", vec![Value::Int(3)]).unwrap_err();
    assert!(matches!(err, Error::Deadlock(_)));
    c.rollback();

    let (b, inserted) = b_handle.join().unwrap();
    inserted.unwrap();
    b.commit().unwrap();

    let (a, inserted) = a_handle.join().unwrap();
    inserted.unwrap();
    a.commit().unwrap();

    let check = db.connect();
    assert_eq!(ints(&check, "t1"), Vec::<i64>::new());
    assert_eq!(ints(&check, "t2"), vec![1]);
    assert_eq!(ints(&check, "t3"), vec![2]);
}

#[test]
fn lock_wait_times_out() {
    init_tracing();
    let db = Database::builder()
        .transaction_control(TransactionControl::Locks)
        .lock_wait_timeout(Duration::from_millis(50))
        .open();
    db.connect().create_table("t", TableType::Memory).unwrap();

    let holder = manual(&db, IsolationLevel::ReadCommitted);
    holder.insert("t", vec![Value::Int(1)]).unwrap();

    let other = db.connect();
    let err = other.insert("t", vec![Value::Int(2)]).unwrap_err();
    assert!(matches!(err, Error::LockTimeout(_)));
    assert!(!other.in_transaction());
    assert!(db.manager().blockers_of(other.session_id()).is_empty());

    holder.commit().unwrap();
    other.insert("t", vec![Value::Int(2)]).unwrap();
    assert_eq!(ints(&other, "t"), vec![1, 2]);
}

#[test]
fn transaction_control_change_needs_quiet_database() {
    let db = db_with_table(TableType::Memory);
    let open = manual(&db, IsolationLevel::ReadCommitted);
    open.insert("t", vec![Value::Int(1)]).unwrap();

    let admin = db.connect();
    let err = admin
        .set_transaction_control(TransactionControl::Locks)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    // the open session may switch its own database
    open.set_transaction_control(TransactionControl::Locks).unwrap();
    open.commit().unwrap();
    admin
        .set_transaction_control(TransactionControl::Mvcc)
        .unwrap();
    assert_eq!(db.transaction_control(), TransactionControl::Mvcc);
}
