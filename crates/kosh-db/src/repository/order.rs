//! # Order Repository
//!
//! Order creation, payment updates and invoice issuance. Every write is one
//! transaction run under the [`RetryPolicy`].
//!
//! ## Create Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_order                                     │
//! │                                                                         │
//! │  validate customer / notes / amount_paid      (no transaction yet)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    1. next_in(Order, month)          ← first statement, takes the lock  │
//! │    2. load_catalog(item ids)         ← current price + active flag      │
//! │    3. price_order(items, GST 18%)    ← kosh-core, then totals.verify()  │
//! │    4. INSERT orders                  (status confirmed)                 │
//! │    5. INSERT order_items             (frozen snapshots)                 │
//! │    6. apply_in_tx(stock_out) × lines (order_id = order id)              │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       └── UNIQUE(order_number) lost → retry with a fresh ordinal        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payment and invoice updates start with
//! `UPDATE orders SET version = version + 1`, so a concurrent writer waits
//! for the lock instead of reading stale state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::load_catalog;
use crate::repository::sequence::next_in;
use crate::repository::stock::{apply_in_tx, movements_for_order};
use crate::retry::RetryPolicy;
use kosh_core::lifecycle::{ensure_invoiceable, ensure_manual_transition, ensure_payable};
use kosh_core::validation::{
    validate_amount_paid, validate_customer, validate_note, validate_page,
};
use kosh_core::{
    price_order, CoreError, CustomerSnapshot, LineRequest, MovementKind, MovementMetadata, Order,
    OrderItem, OrderStatus, Page, PaymentMethod, PaymentStatus, Period, SequenceScope, TaxRate,
    ValidationError,
};

const ORDER_COLUMNS: &str = "id, order_number, invoice_number, customer_name, customer_phone, \
     customer_email, customer_address, customer_tax_id, subtotal_paise, total_discount_paise, \
     total_gst_paise, grand_total_paise, payment_method, payment_status, amount_paid_paise, \
     amount_due_paise, status, notes, created_by, processed_by, version, created_at, updated_at, \
     invoiced_at";

const ITEM_COLUMNS: &str = "id, order_id, line_no, product_id, product_name, sku, unit, quantity, \
     unit_price_paise, discount_paise, tax_rate_bps, gst_paise, total_paise";

// =============================================================================
// Requests
// =============================================================================

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: CustomerSnapshot,
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Amount paid up front. Defaults to nothing paid.
    #[serde(default)]
    pub amount_paid_paise: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Changes to an existing order. At least one field must be set.
///
/// `amount_paid_paise` replaces the recorded total; it is not added to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentUpdate {
    pub amount_paid_paise: Option<i64>,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

impl PaymentUpdate {
    fn is_empty(&self) -> bool {
        self.amount_paid_paise.is_none() && self.status.is_none() && self.notes.is_none()
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    invoice_number: Option<String>,
    customer_name: String,
    customer_phone: Option<String>,
    customer_email: Option<String>,
    customer_address: Option<String>,
    customer_tax_id: Option<String>,
    subtotal_paise: i64,
    total_discount_paise: i64,
    total_gst_paise: i64,
    grand_total_paise: i64,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    amount_paid_paise: i64,
    amount_due_paise: i64,
    status: OrderStatus,
    notes: Option<String>,
    created_by: String,
    processed_by: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    invoiced_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            invoice_number: self.invoice_number,
            customer: CustomerSnapshot {
                name: self.customer_name,
                phone: self.customer_phone,
                email: self.customer_email,
                address: self.customer_address,
                tax_id: self.customer_tax_id,
            },
            items,
            subtotal_paise: self.subtotal_paise,
            total_discount_paise: self.total_discount_paise,
            total_gst_paise: self.total_gst_paise,
            grand_total_paise: self.grand_total_paise,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            amount_paid_paise: self.amount_paid_paise,
            amount_due_paise: self.amount_due_paise,
            status: self.status,
            notes: self.notes,
            created_by: self.created_by,
            processed_by: self.processed_by,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            invoiced_at: self.invoiced_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    order_id: String,
    line_no: i64,
    product_id: String,
    product_name: String,
    sku: String,
    unit: String,
    quantity: i64,
    unit_price_paise: i64,
    discount_paise: i64,
    tax_rate_bps: i64,
    gst_paise: i64,
    total_paise: i64,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            line_no: row.line_no,
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            unit: row.unit,
            quantity: row.quantity,
            unit_price_paise: row.unit_price_paise,
            discount_paise: row.discount_paise,
            tax_rate_bps: row.tax_rate_bps as u32,
            gst_paise: row.gst_paise,
            total_paise: row.total_paise,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
///
/// ## Usage
/// ```rust,ignore
/// let orders = db.orders();
/// let order = orders.create("u1", &new_order).await?;
/// let order = orders.issue_invoice("u2", &order.id).await?;
/// assert!(order.invoice_number.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        OrderRepository { pool, retry }
    }

    /// Creates a confirmed order, mints its number and deducts stock.
    ///
    /// ## Errors
    /// - empty items, bad customer, negative payment → validation error
    /// - unknown or inactive product → `ProductNotFound`
    /// - no unique number within the retry budget → `SequenceExhausted`
    pub async fn create(&self, created_by: &str, new_order: &NewOrder) -> DbResult<Order> {
        validate_customer(&new_order.customer)?;
        validate_note(new_order.notes.as_deref())?;
        if let Some(paid) = new_order.amount_paid_paise {
            validate_amount_paid(paid)?;
        }

        let order_id = self
            .retry
            .run("create_order", move || self.create_once(created_by, new_order))
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation { ref field, .. } if field.contains("order_number") => {
                    let period = Period::from_datetime(Utc::now());
                    DbError::SequenceExhausted {
                        scope: SequenceScope::Order.to_string(),
                        period: period.to_string(),
                    }
                }
                other => other,
            })?;

        let order = self.require(&order_id).await?;

        info!(
            order_number = %order.order_number,
            grand_total = %order.grand_total(),
            lines = order.items.len(),
            payment_status = %order.payment_status,
            "Order created"
        );

        Ok(order)
    }

    async fn create_once(&self, created_by: &str, new_order: &NewOrder) -> DbResult<String> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let order_number = next_in(&mut tx, SequenceScope::Order, Period::from_datetime(now)).await?;

        let ids: Vec<&str> = new_order.items.iter().map(|i| i.product_id.as_str()).collect();
        let catalog = load_catalog(&mut tx, &ids).await?;

        let priced = price_order(&new_order.items, &catalog, TaxRate::GST_STANDARD)?;
        priced.totals.verify(&priced.lines)?;

        let order_id = Uuid::new_v4().to_string();
        let grand_total = priced.totals.grand_total.paise();
        let amount_paid = new_order.amount_paid_paise.unwrap_or(0);
        let payment_status = PaymentStatus::from_amounts(amount_paid, grand_total);

        debug!(order_number = %order_number, grand_total, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, invoice_number,
                customer_name, customer_phone, customer_email, customer_address, customer_tax_id,
                subtotal_paise, total_discount_paise, total_gst_paise, grand_total_paise,
                payment_method, payment_status, amount_paid_paise, amount_due_paise,
                status, notes, created_by, processed_by, version,
                created_at, updated_at, invoiced_at
            ) VALUES (
                ?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, NULL, 1, ?19, ?19, NULL
            )
            "#,
        )
        .bind(&order_id)
        .bind(&order_number)
        .bind(new_order.customer.name.trim())
        .bind(&new_order.customer.phone)
        .bind(&new_order.customer.email)
        .bind(&new_order.customer.address)
        .bind(&new_order.customer.tax_id)
        .bind(priced.totals.subtotal.paise())
        .bind(priced.totals.total_discount.paise())
        .bind(priced.totals.total_gst.paise())
        .bind(grand_total)
        .bind(new_order.payment_method)
        .bind(payment_status)
        .bind(amount_paid)
        .bind(grand_total - amount_paid)
        .bind(OrderStatus::Confirmed)
        .bind(&new_order.notes)
        .bind(created_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (index, line) in priced.lines.iter().enumerate() {
            let item = OrderItem::from_priced(
                Uuid::new_v4().to_string(),
                order_id.as_str(),
                index as i64 + 1,
                line,
            );
            insert_item(&mut tx, &item).await?;

            let metadata = MovementMetadata {
                unit_price_paise: Some(item.unit_price_paise),
                note: Some(format!("order {order_number}")),
                reference_id: Some(order_id.clone()),
                ..Default::default()
            };
            apply_in_tx(
                &mut tx,
                &item.product_id,
                MovementKind::StockOut,
                item.quantity,
                &metadata,
                Some(order_id.as_str()),
                created_by,
                now,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(order_id)
    }

    /// Records a payment, a status change and/or new notes.
    ///
    /// ## Rules
    /// - cancelled orders accept no further updates
    /// - status changes follow the state machine; `completed` is refused
    /// - payment status and amount due are recomputed, never taken as input
    /// - moving to `cancelled` returns the stock the order deducted
    pub async fn update_payment(
        &self,
        processed_by: &str,
        order_id: &str,
        update: &PaymentUpdate,
    ) -> DbResult<Order> {
        if update.is_empty() {
            return Err(ValidationError::Required {
                field: "amount_paid_paise, status or notes".to_string(),
            }
            .into());
        }
        if let Some(paid) = update.amount_paid_paise {
            validate_amount_paid(paid)?;
        }
        validate_note(update.notes.as_deref())?;

        self.retry
            .run("update_order_payment", move || {
                self.update_payment_once(processed_by, order_id, update)
            })
            .await?;

        let order = self.require(order_id).await?;

        info!(
            order_number = %order.order_number,
            status = %order.status,
            payment_status = %order.payment_status,
            amount_due = %order.amount_due(),
            "Order updated"
        );

        Ok(order)
    }

    async fn update_payment_once(
        &self,
        processed_by: &str,
        order_id: &str,
        update: &PaymentUpdate,
    ) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        bump_version(&mut tx, order_id).await?;
        let order = fetch_order_in(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        ensure_payable(&order)?;

        let next_status = match update.status {
            Some(status) if status != order.status => {
                ensure_manual_transition(&order, status)?;
                status
            }
            _ => order.status,
        };

        let amount_paid = update.amount_paid_paise.unwrap_or(order.amount_paid_paise);
        let payment_status = PaymentStatus::from_amounts(amount_paid, order.grand_total_paise);
        let notes = update.notes.clone().or_else(|| order.notes.clone());

        sqlx::query(
            r#"
            UPDATE orders SET
                amount_paid_paise = ?2,
                amount_due_paise = grand_total_paise - ?2,
                payment_status = ?3,
                status = ?4,
                notes = ?5,
                processed_by = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(amount_paid)
        .bind(payment_status)
        .bind(next_status)
        .bind(&notes)
        .bind(processed_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if next_status == OrderStatus::Cancelled {
            return_stock(&mut tx, &order, processed_by, now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Assigns an invoice number and completes the order.
    ///
    /// A second call fails with `InvoiceAlreadyIssued` and changes nothing.
    pub async fn issue_invoice(&self, processed_by: &str, order_id: &str) -> DbResult<Order> {
        self.retry
            .run("issue_invoice", move || self.issue_invoice_once(processed_by, order_id))
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation { ref field, .. } if field.contains("invoice_number") => {
                    DbError::SequenceExhausted {
                        scope: SequenceScope::Invoice.to_string(),
                        period: Period::from_datetime(Utc::now()).to_string(),
                    }
                }
                other => other,
            })?;

        let order = self.require(order_id).await?;

        info!(
            order_number = %order.order_number,
            invoice_number = order.invoice_number.as_deref().unwrap_or_default(),
            "Invoice issued"
        );

        Ok(order)
    }

    async fn issue_invoice_once(&self, processed_by: &str, order_id: &str) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        bump_version(&mut tx, order_id).await?;
        let order = fetch_order_in(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        ensure_invoiceable(&order)?;

        let invoice_number =
            next_in(&mut tx, SequenceScope::Invoice, Period::from_datetime(now)).await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                invoice_number = ?2,
                status = ?3,
                invoiced_at = ?4,
                processed_by = ?5,
                updated_at = ?4
            WHERE id = ?1 AND invoice_number IS NULL
            "#,
        )
        .bind(order_id)
        .bind(&invoice_number)
        .bind(OrderStatus::Completed)
        .bind(now)
        .bind(processed_by)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "order {} was invoiced concurrently",
                order.order_number
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an order with its items.
    pub async fn get(&self, order_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_in(&mut conn, order_id).await
    }

    /// Gets an order by its order number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM orders WHERE order_number = ?1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    /// Lists orders newest first, optionally by status.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> DbResult<Page<Order>> {
        let (page, page_size) = validate_page(page, page_size)?;
        let offset = (page as i64 - 1) * page_size as i64;

        let mut conn = self.pool.acquire().await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ?1 IS NULL OR status = ?1")
                .bind(status)
                .fetch_one(&mut *conn)
                .await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE ?1 IS NULL OR status = ?1 \
             ORDER BY created_at DESC, order_number DESC LIMIT ?2 OFFSET ?3"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(status)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_items_in(&mut conn, &row.id).await?;
            items.push(row.into_order(lines));
        }

        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }

    async fn require(&self, order_id: &str) -> DbResult<Order> {
        self.get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

// =============================================================================
// In-Transaction Helpers
// =============================================================================

/// Write-first statement for order updates. 0 rows → `OrderNotFound`.
async fn bump_version(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    let result = sqlx::query("UPDATE orders SET version = version + 1 WHERE id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::OrderNotFound(order_id.to_string()).into());
    }
    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, line_no, product_id, product_name, sku, unit, quantity,
            unit_price_paise, discount_paise, tax_rate_bps, gst_paise, total_paise
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(item.line_no)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(&item.sku)
    .bind(&item.unit)
    .bind(item.quantity)
    .bind(item.unit_price_paise)
    .bind(item.discount_paise)
    .bind(item.tax_rate_bps as i64)
    .bind(item.gst_paise)
    .bind(item.total_paise)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// One `return` per `stock_out` the order caused, for what was actually taken.
async fn return_stock(
    conn: &mut SqliteConnection,
    order: &Order,
    processed_by: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let caused = movements_for_order(conn, &order.id).await?;

    for movement in caused.iter().filter(|m| m.kind == MovementKind::StockOut) {
        let deducted = movement.previous_stock - movement.new_stock;
        if deducted <= 0 {
            warn!(
                order_number = %order.order_number,
                product_id = %movement.product_id,
                "Nothing was deducted for this line; no stock to return"
            );
            continue;
        }

        let metadata = MovementMetadata {
            note: Some(format!("cancelled order {}", order.order_number)),
            reference_id: Some(order.id.clone()),
            ..Default::default()
        };
        apply_in_tx(
            conn,
            &movement.product_id,
            MovementKind::Return,
            deducted,
            &metadata,
            Some(order.id.as_str()),
            processed_by,
            at,
        )
        .await?;
    }

    Ok(())
}

async fn fetch_items_in(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY line_no");
    let rows: Vec<ItemRow> = sqlx::query_as(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Loads an order and its items on an existing connection.
pub(crate) async fn fetch_order_in(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let row: Option<OrderRow> = sqlx::query_as(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let items = fetch_items_in(conn, &row.id).await?;
            Ok(Some(row.into_order(items)))
        }
        None => Ok(None),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
