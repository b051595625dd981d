//! # Stock Repository
//!
//! The append-only stock ledger and everything derived from it.
//!
//! ## Appending a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE products SET stock_version = stock_version + 1   ← write lock │
//! │        (0 rows → ProductNotFound)                                       │
//! │    SELECT ledger_seq, new_stock ... ORDER BY ledger_seq DESC LIMIT 1    │
//! │        (none → position 0, stock 0)                                     │
//! │    apply_movement(previous, kind, quantity)   ← kosh-core, clamps at 0  │
//! │    INSERT stock_movements (ledger_seq = last + 1, ...)                  │
//! │        UNIQUE(product_id, ledger_seq) → retry from BEGIN                │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On-hand stock is the `new_stock` of the latest row. Nothing else stores
//! it, so there is no second write to keep in sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;
use kosh_core::ledger::{apply_movement, verify_chain};
use kosh_core::validation::{validate_movement_metadata, validate_page, validate_quantity};
use kosh_core::{
    CoreError, MovementKind, MovementMetadata, Page, ProductStock, StockMovement, StockSummary,
    ValidationError,
};

const MOVEMENT_COLUMNS: &str = "id, product_id, ledger_seq, kind, quantity, previous_stock, \
     new_stock, unit_price_paise, total_value_paise, supplier_name, supplier_contact, \
     supplier_reference, note, reference_id, created_by, created_at";

// =============================================================================
// Rows and Filters
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: String,
    product_id: String,
    ledger_seq: i64,
    kind: MovementKind,
    quantity: i64,
    previous_stock: i64,
    new_stock: i64,
    unit_price_paise: Option<i64>,
    total_value_paise: Option<i64>,
    supplier_name: Option<String>,
    supplier_contact: Option<String>,
    supplier_reference: Option<String>,
    note: Option<String>,
    reference_id: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: row.id,
            product_id: row.product_id,
            ledger_seq: row.ledger_seq,
            kind: row.kind,
            quantity: row.quantity,
            previous_stock: row.previous_stock,
            new_stock: row.new_stock,
            unit_price_paise: row.unit_price_paise,
            total_value_paise: row.total_value_paise,
            supplier_name: row.supplier_name,
            supplier_contact: row.supplier_contact,
            supplier_reference: row.supplier_reference,
            note: row.note,
            reference_id: row.reference_id,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: String,
    sku: String,
    name: String,
    on_hand: i64,
    movement_count: i64,
    last_movement_at: Option<String>,
}

/// Which movements to list. Every field narrows the result; `from` is
/// inclusive and `to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub kind: Option<MovementKind>,
    pub reference_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(product_id) = &self.product_id {
            qb.push(" AND product_id = ").push_bind(product_id.clone());
        }
        if let Some(kind) = self.kind {
            qb.push(" AND kind = ").push_bind(kind);
        }
        if let Some(reference_id) = &self.reference_id {
            qb.push(" AND reference_id = ").push_bind(reference_id.clone());
        }
        if let Some(from) = self.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
    }
}

/// Outcome of replaying a product's full ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub product_id: String,
    pub on_hand: i64,
    pub available: bool,
    pub movement_count: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl StockRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        StockRepository { pool, retry }
    }

    /// Records one movement and returns it.
    ///
    /// Decreases past zero are clamped and still recorded; compare
    /// `quantity` with `previous_stock - new_stock` to see the clamp.
    pub async fn record(
        &self,
        created_by: &str,
        product_id: &str,
        kind: MovementKind,
        quantity: i64,
        metadata: &MovementMetadata,
    ) -> DbResult<StockMovement> {
        validate_quantity(quantity)?;
        validate_movement_metadata(metadata)?;

        let movement = self
            .retry
            .run("record_stock_movement", move || {
                self.record_once(created_by, product_id, kind, quantity, metadata)
            })
            .await?;

        info!(
            product_id = %movement.product_id,
            kind = %movement.kind,
            quantity = movement.quantity,
            previous_stock = movement.previous_stock,
            new_stock = movement.new_stock,
            "Stock movement recorded"
        );

        Ok(movement)
    }

    async fn record_once(
        &self,
        created_by: &str,
        product_id: &str,
        kind: MovementKind,
        quantity: i64,
        metadata: &MovementMetadata,
    ) -> DbResult<StockMovement> {
        let mut tx = self.pool.begin().await?;
        let movement = apply_in_tx(
            &mut tx,
            product_id,
            kind,
            quantity,
            metadata,
            None,
            created_by,
            Utc::now(),
        )
        .await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Current quantity on hand.
    pub async fn on_hand(&self, product_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        ensure_product(&mut conn, product_id).await?;
        let (_, on_hand) = latest_position(&mut conn, product_id).await?;
        Ok(on_hand)
    }

    /// A product's full ledger in order.
    pub async fn history(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = ?1 ORDER BY ledger_seq"
        );
        let rows: Vec<MovementRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Lists movements matching `filter`, newest first.
    pub async fn movements(
        &self,
        filter: &MovementFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> DbResult<Page<StockMovement>> {
        let (page, page_size) = validate_page(page, page_size)?;

        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ValidationError::InvalidFormat {
                    field: "from".to_string(),
                    reason: "must not be after `to`".to_string(),
                }
                .into());
            }
        }

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM stock_movements");
        filter.push_where(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let offset = (page as i64 - 1) * page_size as i64;
        let mut qb = QueryBuilder::new(format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC, product_id, ledger_seq DESC LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<MovementRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        debug!(total, page, page_size, returned = rows.len(), "Listed stock movements");

        Ok(Page {
            items: rows.into_iter().map(StockMovement::from).collect(),
            page,
            page_size,
            total,
        })
    }

    /// On-hand stock of every active product, derived from the ledger.
    pub async fn summary(&self) -> DbResult<StockSummary> {
        let rows: Vec<StockRow> = sqlx::query_as(
            r#"
            SELECT
                p.id,
                p.sku,
                p.name,
                COALESCE((SELECT m.new_stock FROM stock_movements m
                          WHERE m.product_id = p.id
                          ORDER BY m.ledger_seq DESC LIMIT 1), 0) AS on_hand,
                (SELECT COUNT(*) FROM stock_movements m
                 WHERE m.product_id = p.id) AS movement_count,
                (SELECT MAX(m.created_at) FROM stock_movements m
                 WHERE m.product_id = p.id) AS last_movement_at
            FROM products p
            WHERE p.is_active = 1
            ORDER BY p.sku
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let products: Vec<ProductStock> = rows
            .into_iter()
            .map(|row| ProductStock {
                available: row.on_hand > 0,
                last_movement_at: row
                    .last_movement_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                product_id: row.id,
                sku: row.sku,
                name: row.name,
                on_hand: row.on_hand,
                movement_count: row.movement_count,
            })
            .collect();

        let total_units = products
            .iter()
            .fold(0i64, |total, p| total.saturating_add(p.on_hand));
        let out_of_stock = products.iter().filter(|p| !p.available).count() as i64;

        Ok(StockSummary {
            products,
            total_units,
            out_of_stock,
        })
    }

    /// Replays a product's ledger and checks every link of the chain.
    ///
    /// ## Errors
    /// - unknown product → `ProductNotFound`
    /// - broken chain → `LedgerInconsistent` naming the first bad position
    pub async fn reconcile(&self, product_id: &str) -> DbResult<Reconciliation> {
        {
            let mut conn = self.pool.acquire().await?;
            ensure_product(&mut conn, product_id).await?;
        }

        let history = self.history(product_id).await?;
        let on_hand = verify_chain(product_id, &history).map_err(|err| {
            warn!(product_id, error = %err, "Stock ledger failed reconciliation");
            err
        })?;

        Ok(Reconciliation {
            product_id: product_id.to_string(),
            on_hand,
            available: on_hand > 0,
            movement_count: history.len() as i64,
        })
    }
}

// =============================================================================
// In-Transaction Helpers
// =============================================================================

async fn ensure_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
    }
}

/// `(ledger_seq, new_stock)` of the latest movement, `(0, 0)` for none.
async fn latest_position(conn: &mut SqliteConnection, product_id: &str) -> DbResult<(i64, i64)> {
    let last: Option<(i64, i64)> = sqlx::query_as(
        "SELECT ledger_seq, new_stock FROM stock_movements \
         WHERE product_id = ?1 ORDER BY ledger_seq DESC LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(last.unwrap_or((0, 0)))
}

/// Appends one movement inside the caller's transaction.
///
/// `order_id` is set only by order creation and cancellation.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn apply_in_tx(
    conn: &mut SqliteConnection,
    product_id: &str,
    kind: MovementKind,
    quantity: i64,
    metadata: &MovementMetadata,
    order_id: Option<&str>,
    created_by: &str,
    at: DateTime<Utc>,
) -> DbResult<StockMovement> {
    // Serializes appends for this product and proves it exists.
    let bumped = sqlx::query("UPDATE products SET stock_version = stock_version + 1 WHERE id = ?1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    if bumped.rows_affected() == 0 {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    }

    let (last_seq, previous) = latest_position(conn, product_id).await?;
    let effect = apply_movement(previous, kind, quantity)?;

    if effect.clamped() {
        warn!(
            product_id,
            %kind,
            requested = quantity,
            previous_stock = previous,
            "Stock decrease clamped at zero"
        );
    }

    let total_value_paise = match metadata.unit_price_paise {
        Some(price) => Some(price.checked_mul(quantity).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "unit_price".to_string(),
                min: 0,
                max: i64::MAX / quantity,
            }
        })?),
        None => None,
    };

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        ledger_seq: last_seq + 1,
        kind,
        quantity,
        previous_stock: effect.previous_stock,
        new_stock: effect.new_stock,
        unit_price_paise: metadata.unit_price_paise,
        total_value_paise,
        supplier_name: metadata.supplier_name.clone(),
        supplier_contact: metadata.supplier_contact.clone(),
        supplier_reference: metadata.supplier_reference.clone(),
        note: metadata.note.clone(),
        reference_id: metadata.reference_id.clone(),
        created_by: created_by.to_string(),
        created_at: at,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, ledger_seq, kind, quantity, previous_stock, new_stock,
            unit_price_paise, total_value_paise,
            supplier_name, supplier_contact, supplier_reference,
            note, reference_id, order_id, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.ledger_seq)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.previous_stock)
    .bind(movement.new_stock)
    .bind(movement.unit_price_paise)
    .bind(movement.total_value_paise)
    .bind(&movement.supplier_name)
    .bind(&movement.supplier_contact)
    .bind(&movement.supplier_reference)
    .bind(&movement.note)
    .bind(&movement.reference_id)
    .bind(order_id)
    .bind(&movement.created_by)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id,
        ledger_seq = movement.ledger_seq,
        new_stock = movement.new_stock,
        "Appended stock movement"
    );

    Ok(movement)
}

/// Movements caused by one entity (an order), oldest first.
/// Movements written on behalf of an order. Manual movements never carry
/// an `order_id`, whatever their `reference_id` says.
pub(crate) async fn movements_for_order(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<StockMovement>> {
    let sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
         WHERE order_id = ?1 ORDER BY created_at, product_id, ledger_seq"
    );
    let rows: Vec<MovementRow> = sqlx::query_as(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(StockMovement::from).collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use kosh_core::Product;

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: "CEM-50".to_string(),
            name: "Cement 50kg".to_string(),
            category: Some("building".to_string()),
            unit: "bag".to_string(),
            price_paise: 38_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        (db, product.id)
    }

    fn note(text: &str) -> MovementMetadata {
        MovementMetadata {
            note: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stock_in_then_out() {
        let (db, pid) = setup().await;
        let stock = db.stock();

        let first = stock
            .record("u1", &pid, MovementKind::StockIn, 10, &note("opening"))
            .await
            .unwrap();
        assert_eq!((first.ledger_seq, first.previous_stock, first.new_stock), (1, 0, 10));

        let second = stock
            .record("u1", &pid, MovementKind::StockOut, 3, &MovementMetadata::default())
            .await
            .unwrap();
        assert_eq!((second.ledger_seq, second.previous_stock, second.new_stock), (2, 10, 7));

        assert_eq!(stock.on_hand(&pid).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_stock_out_beyond_on_hand_is_clamped() {
        let (db, pid) = setup().await;
        let stock = db.stock();

        stock
            .record("u1", &pid, MovementKind::StockIn, 4, &MovementMetadata::default())
            .await
            .unwrap();
        let out = stock
            .record("u1", &pid, MovementKind::StockOut, 10, &MovementMetadata::default())
            .await
            .unwrap();

        assert_eq!(out.previous_stock, 4);
        assert_eq!(out.new_stock, 0);
        assert_eq!(out.quantity, 10);
        assert!(out.was_clamped());
        assert_eq!(stock.on_hand(&pid).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_total_value_from_unit_price() {
        let (db, pid) = setup().await;
        let meta = MovementMetadata {
            unit_price_paise: Some(36_500),
            supplier_name: Some("Shree Cements".to_string()),
            supplier_reference: Some("DN-4471".to_string()),
            ..Default::default()
        };

        let m = db
            .stock()
            .record("u1", &pid, MovementKind::StockIn, 20, &meta)
            .await
            .unwrap();
        assert_eq!(m.total_value_paise, Some(730_000));
        assert_eq!(m.supplier_reference.as_deref(), Some("DN-4471"));
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let (db, _) = setup().await;
        let err = db
            .stock()
            .record("u1", "missing", MovementKind::StockIn, 1, &MovementMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let (db, pid) = setup().await;
        let err = db
            .stock()
            .record("u1", &pid, MovementKind::StockIn, 0, &MovementMetadata::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kosh_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_ledger_is_immutable() {
        let (db, pid) = setup().await;
        db.stock()
            .record("u1", &pid, MovementKind::StockIn, 5, &MovementMetadata::default())
            .await
            .unwrap();

        let err = sqlx::query("UPDATE stock_movements SET new_stock = 500")
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let err = sqlx::query("DELETE FROM stock_movements")
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reconcile_replays_history() {
        let (db, pid) = setup().await;
        let stock = db.stock();
        let none = MovementMetadata::default();

        stock.record("u1", &pid, MovementKind::StockIn, 10, &none).await.unwrap();
        stock.record("u1", &pid, MovementKind::Damage, 2, &none).await.unwrap();
        stock.record("u1", &pid, MovementKind::StockOut, 20, &none).await.unwrap();
        stock.record("u1", &pid, MovementKind::Return, 3, &none).await.unwrap();

        let rec = stock.reconcile(&pid).await.unwrap();
        assert_eq!(rec.on_hand, 3);
        assert_eq!(rec.movement_count, 4);
        assert!(rec.available);
        assert_eq!(rec.on_hand, stock.on_hand(&pid).await.unwrap());
    }

    #[tokio::test]
    async fn test_summary_total_saturates() {
        let (db, pid) = setup().await;
        let now = Utc::now();
        let second = Product {
            id: Uuid::new_v4().to_string(),
            sku: "STL-12".to_string(),
            name: "Steel rod 12mm".to_string(),
            category: Some("building".to_string()),
            unit: "pcs".to_string(),
            price_paise: 72_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&second).await.unwrap();

        let stock = db.stock();
        let none = MovementMetadata::default();
        let huge = i64::MAX / 2 + 1;
        stock.record("u1", &pid, MovementKind::StockIn, huge, &none).await.unwrap();
        stock.record("u1", &second.id, MovementKind::StockIn, huge, &none).await.unwrap();

        let summary = stock.summary().await.unwrap();
        assert_eq!(summary.products.len(), 2);
        assert_eq!(summary.total_units, i64::MAX);
    }

    #[tokio::test]
    async fn test_summary_and_paged_listing() {
        let (db, pid) = setup().await;
        let stock = db.stock();
        let none = MovementMetadata::default();

        for _ in 0..5 {
            stock.record("u1", &pid, MovementKind::StockIn, 2, &none).await.unwrap();
        }
        stock.record("u1", &pid, MovementKind::StockOut, 3, &none).await.unwrap();

        let summary = stock.summary().await.unwrap();
        assert_eq!(summary.products.len(), 1);
        assert_eq!(summary.products[0].on_hand, 7);
        assert_eq!(summary.products[0].movement_count, 6);
        assert!(summary.products[0].last_movement_at.is_some());
        assert_eq!(summary.total_units, 7);
        assert_eq!(summary.out_of_stock, 0);

        let filter = MovementFilter {
            product_id: Some(pid.clone()),
            kind: Some(MovementKind::StockIn),
            ..Default::default()
        };
        let page = stock.movements(&filter, Some(2), Some(2)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
        assert!(page.items.iter().all(|m| m.kind == MovementKind::StockIn));

        let outs = MovementFilter {
            kind: Some(MovementKind::StockOut),
            ..Default::default()
        };
        let page = stock.movements(&outs, None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].new_stock, 7);
    }

    #[tokio::test]
    async fn test_inverted_time_range_rejected() {
        let (db, _) = setup().await;
        let now = Utc::now();
        let filter = MovementFilter {
            from: Some(now),
            to: Some(now - chrono::Duration::hours(1)),
            ..Default::default()
        };
        let err = db.stock().movements(&filter, None, None).await.unwrap_err();
        assert_eq!(err.kind(), kosh_core::ErrorKind::Validation);
    }
}
