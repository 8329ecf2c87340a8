use coldb_core::ops::{self, AggKind};
use coldb_core::{BatchContext, Database, IndexType, Session};

fn open(dir: &tempfile::TempDir) -> Database {
    let mut db = Database::launch(dir.path(), None).unwrap();
    ops::create_database(&mut db, "shop").unwrap();
    ops::create_table(&mut db, "orders", 2).unwrap();
    ops::create_column(&mut db, "orders", "id").unwrap();
    ops::create_column(&mut db, "orders", "amount").unwrap();
    ops::create_index(&mut db, "orders", "id", IndexType::ClusteredSorted).unwrap();
    db
}

#[test]
fn insert_select_aggregate_and_relaunch_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open(&dir);
    let batch = BatchContext::new();
    let mut session = Session::new(&db.cfg);

    for i in 0..50 {
        ops::insert(&mut db, &batch, "orders", &[50 - i, i * 10]).unwrap();
    }

    ops::select(&mut db, &mut session, &mut BatchContext::new(), "orders.id", None, Some(10), Some(20), "mid_ids").unwrap();
    let mid = session.get_positions("mid_ids").unwrap().to_index_array();
    assert_eq!(mid.len(), 10);

    ops::aggregate(&mut db, &mut session, &mut BatchContext::new(), "orders.amount", None, AggKind::Sum, "total").unwrap();
    let total = *session.get_numeric("total").unwrap();
    assert_eq!(total, coldb_core::NumericValue::I64((0..50).map(|i| i * 10).sum()));

    db.close().unwrap();

    let mut reopened = Database::launch(dir.path(), Some(coldb_core::Config::default())).unwrap();
    let stats = reopened.describe_table("orders").unwrap();
    assert_eq!(stats.n_rows, 50);
    assert_eq!(stats.columns.iter().find(|c| c.name == "id").unwrap().index_type, IndexType::ClusteredSorted);
    reopened.close().unwrap();
}

#[test]
fn batched_select_and_aggregate_share_one_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open(&dir);
    let mut session = Session::new(&db.cfg);
    let mut batch = BatchContext::new();

    for i in 0..20 {
        ops::insert(&mut db, &batch, "orders", &[i, i * 2]).unwrap();
    }

    ops::batch_open(&mut batch).unwrap();
    ops::select(&mut db, &mut session, &mut batch, "orders.amount", None, Some(0), Some(10), "low").unwrap();
    ops::aggregate(&mut db, &mut session, &mut batch, "orders.amount", None, AggKind::Max, "max_amount").unwrap();
    ops::batch_close(&mut db, &mut session, &mut batch).unwrap();

    assert!(!batch.is_active());
    let low = session.get_positions("low").unwrap().to_index_array();
    assert_eq!(low.len(), 5);
    assert_eq!(*session.get_numeric("max_amount").unwrap(), coldb_core::NumericValue::I64(38));

    db.close_and_delete().unwrap();
}

#[test]
fn delete_then_update_repairs_clustered_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open(&dir);
    let batch = BatchContext::new();

    for i in 0..10 {
        ops::insert(&mut db, &batch, "orders", &[i, i]).unwrap();
    }

    ops::delete(&mut db, &batch, "orders", &[0, 1, 2]).unwrap();
    ops::update(&mut db, &batch, "orders", "amount", &[0], &[999]).unwrap();

    let stats = db.describe_table("orders").unwrap();
    assert_eq!(stats.n_rows, 7);

    let mut session = Session::new(&db.cfg);
    ops::select(&mut db, &mut session, &mut BatchContext::new(), "orders.id", None, None, None, "all_ids").unwrap();
    let all = session.get_positions("all_ids").unwrap().to_index_array();
    assert_eq!(all.len(), 7);

    db.close_and_delete().unwrap();
}
