//! Concurrency tests against a file-backed database with a real pool.
//!
//! In-memory databases have one connection, so these use a temp file to get
//! several writers racing for SQLite's lock.

use std::collections::HashSet;

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use kosh_core::{
    Caller, CustomerSnapshot, LineRequest, MovementKind, MovementMetadata, PaymentMethod, Product,
    Role,
};
use kosh_db::{Database, DbConfig, MovementFilter, NewOrder, PaymentUpdate};

async fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("kosh.db")).max_connections(8);
    let db = Database::new(config).await.unwrap();
    (dir, db)
}

async fn add_product(db: &Database, sku: &str, opening: i64) -> String {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        category: None,
        unit: "pcs".to_string(),
        price_paise: 2_500,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();
    if opening > 0 {
        db.stock()
            .record(
                "seed",
                &product.id,
                MovementKind::StockIn,
                opening,
                &MovementMetadata::default(),
            )
            .await
            .unwrap();
    }
    product.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_orders_get_distinct_numbers() {
    let (_dir, db) = file_db().await;
    let pid = add_product(&db, "CON-01", 1_000).await;

    let mut handles = Vec::new();
    for n in 0..20 {
        let db = db.clone();
        let pid = pid.clone();
        handles.push(tokio::spawn(async move {
            let caller = Caller::new(format!("clerk-{n}"), Role::Staff);
            let request = NewOrder {
                customer: CustomerSnapshot {
                    name: format!("Customer {n}"),
                    ..Default::default()
                },
                items: vec![LineRequest::new(pid, 1)],
                payment_method: PaymentMethod::Cash,
                amount_paid_paise: None,
                notes: None,
            };
            db.create_order(&caller, &request).await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        assert!(numbers.insert(order.order_number));
    }

    assert_eq!(numbers.len(), 20);
    assert_eq!(db.stock().on_hand(&pid).await.unwrap(), 980);
    db.stock().reconcile(&pid).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_stock_outs_never_go_negative() {
    let (_dir, db) = file_db().await;
    let pid = add_product(&db, "CON-02", 100).await;

    let mut handles = Vec::new();
    for _ in 0..30 {
        let db = db.clone();
        let pid = pid.clone();
        handles.push(tokio::spawn(async move {
            db.stock()
                .record(
                    "picker",
                    &pid,
                    MovementKind::StockOut,
                    5,
                    &MovementMetadata::default(),
                )
                .await
        }));
    }

    for handle in handles {
        let movement = handle.await.unwrap().unwrap();
        assert!(movement.new_stock >= 0);
    }

    assert_eq!(db.stock().on_hand(&pid).await.unwrap(), 0);

    let rec = db.stock().reconcile(&pid).await.unwrap();
    assert_eq!(rec.on_hand, 0);
    assert_eq!(rec.movement_count, 31);

    let filter = MovementFilter {
        product_id: Some(pid.clone()),
        kind: Some(MovementKind::StockOut),
        ..Default::default()
    };
    let outs = db.stock().movements(&filter, None, Some(100)).await.unwrap();
    assert_eq!(outs.total, 30);
    let effective = outs
        .items
        .iter()
        .filter(|m| m.applied_delta() == -5)
        .count();
    assert_eq!(effective, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_payment_updates_serialize() {
    let (_dir, db) = file_db().await;
    let pid = add_product(&db, "CON-03", 10).await;
    let manager = Caller::new("manager-1", Role::Manager);

    let order = db
        .create_order(
            &manager,
            &NewOrder {
                customer: CustomerSnapshot {
                    name: "Counter sale".to_string(),
                    ..Default::default()
                },
                items: vec![LineRequest::new(&pid, 1)],
                payment_method: PaymentMethod::Cash,
                amount_paid_paise: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 1..=10i64 {
        let db = db.clone();
        let caller = manager.clone();
        let order_id = order.id.clone();
        handles.push(tokio::spawn(async move {
            let update = PaymentUpdate {
                amount_paid_paise: Some(n * 100),
                ..Default::default()
            };
            db.update_order_payment(&caller, &order_id, &update).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let finished = db.get_order(&manager, &order.id).await.unwrap();
    assert_eq!(finished.version, 11);
    assert_eq!(
        finished.amount_due_paise,
        finished.grand_total_paise - finished.amount_paid_paise
    );
}
