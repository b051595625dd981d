//! # Caller-Facing Operations
//!
//! The transaction core as the outside world sees it. Each operation checks
//! the caller's capability first and then delegates to a repository.
//!
//! ```text
//! ┌──────────────────────────┬──────────────────┬───────────────────────────┐
//! │ Operation                │ Capability       │ Repository                │
//! ├──────────────────────────┼──────────────────┼───────────────────────────┤
//! │ create_order             │ CreateOrder      │ OrderRepository::create   │
//! │ update_order_payment     │ UpdatePayment    │ ::update_payment          │
//! │ issue_invoice            │ IssueInvoice     │ ::issue_invoice           │
//! │ get_order / list_orders  │ ViewOrders       │ ::get / ::list            │
//! │ record_stock_movement    │ RecordStock      │ StockRepository::record   │
//! │ stock_summary            │ ViewStock        │ ::summary                 │
//! │ movements                │ ViewStock        │ ::movements               │
//! │ reconcile                │ ViewStock        │ ::reconcile               │
//! └──────────────────────────┴──────────────────┴───────────────────────────┘
//! ```
//!
//! The repositories themselves are not gated; the seed tool and tests use
//! them directly.

use tracing::debug;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::order::{NewOrder, PaymentUpdate};
use crate::repository::stock::{MovementFilter, Reconciliation};
use kosh_core::{
    Caller, Capability, CoreError, MovementKind, MovementMetadata, Order, OrderStatus, Page,
    StockMovement, StockSummary,
};

impl Database {
    /// Creates an order for `caller`.
    pub async fn create_order(&self, caller: &Caller, new_order: &NewOrder) -> DbResult<Order> {
        caller.require(Capability::CreateOrder)?;
        self.orders().create(&caller.user_id, new_order).await
    }

    /// Records a payment, status change or notes on an order.
    pub async fn update_order_payment(
        &self,
        caller: &Caller,
        order_id: &str,
        update: &PaymentUpdate,
    ) -> DbResult<Order> {
        caller.require(Capability::UpdatePayment)?;
        self.orders()
            .update_payment(&caller.user_id, order_id, update)
            .await
    }

    /// Issues the invoice for an order, completing it.
    pub async fn issue_invoice(&self, caller: &Caller, order_id: &str) -> DbResult<Order> {
        caller.require(Capability::IssueInvoice)?;
        self.orders().issue_invoice(&caller.user_id, order_id).await
    }

    /// Fetches one order. Absent orders are `OrderNotFound`.
    pub async fn get_order(&self, caller: &Caller, order_id: &str) -> DbResult<Order> {
        caller.require(Capability::ViewOrders)?;
        self.orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    /// Lists orders, newest first.
    pub async fn list_orders(
        &self,
        caller: &Caller,
        status: Option<OrderStatus>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> DbResult<Page<Order>> {
        caller.require(Capability::ViewOrders)?;
        self.orders().list(status, page, page_size).await
    }

    /// Appends a movement to a product's stock ledger.
    pub async fn record_stock_movement(
        &self,
        caller: &Caller,
        product_id: &str,
        kind: MovementKind,
        quantity: i64,
        metadata: MovementMetadata,
    ) -> DbResult<StockMovement> {
        caller.require(Capability::RecordStock)?;
        self.stock()
            .record(&caller.user_id, product_id, kind, quantity, &metadata)
            .await
    }

    pub async fn stock_summary(&self, caller: &Caller) -> DbResult<StockSummary> {
        caller.require(Capability::ViewStock)?;
        self.stock().summary().await
    }

    pub async fn movements(
        &self,
        caller: &Caller,
        filter: &MovementFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> DbResult<Page<StockMovement>> {
        caller.require(Capability::ViewStock)?;
        self.stock().movements(filter, page, page_size).await
    }

    /// Replays and checks a product's ledger.
    pub async fn reconcile(&self, caller: &Caller, product_id: &str) -> DbResult<Reconciliation> {
        caller.require(Capability::ViewStock)?;
        debug!(user_id = %caller.user_id, product_id, "Reconciling stock ledger");
        self.stock().reconcile(product_id).await
    }
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::DbConfig;
    use chrono::Utc;
    use kosh_core::{
        CustomerSnapshot, ErrorKind, LineRequest, PaymentMethod, PaymentStatus, Product, Role,
    };
    use uuid::Uuid;

    fn admin() -> Caller {
        Caller::new("admin-1", Role::Admin)
    }

    async fn add_product(db: &Database, sku: &str, price_paise: i64, opening: i64) -> String {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            category: None,
            unit: "pcs".to_string(),
            price_paise,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        if opening > 0 {
            db.record_stock_movement(
                &admin(),
                &product.id,
                MovementKind::StockIn,
                opening,
                MovementMetadata::default(),
            )
            .await
            .unwrap();
        }
        product.id
    }

    fn order_for(items: Vec<LineRequest>) -> NewOrder {
        NewOrder {
            customer: CustomerSnapshot {
                name: "Sharma Hardware".to_string(),
                phone: Some("+91 98765 43210".to_string()),
                tax_id: Some("27AAPFU0939F1ZV".to_string()),
                ..Default::default()
            },
            items,
            payment_method: PaymentMethod::Cash,
            amount_paid_paise: None,
            notes: None,
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_pricing_scenario() {
        let db = setup().await;
        let laptop = add_product(&db, "LAP-01", 6_500_000, 5).await;
        let cable = add_product(&db, "CAB-01", 5_800, 50).await;

        let order = db
            .create_order(
                &admin(),
                &order_for(vec![LineRequest::new(&laptop, 2), LineRequest::new(&cable, 10)]),
            )
            .await
            .unwrap();

        assert_eq!(order.subtotal_paise, 13_058_000);
        assert_eq!(order.total_gst_paise, 2_350_440);
        assert_eq!(order.grand_total_paise, 15_408_440);
        assert_eq!(order.grand_total().to_string(), "₹1,54,084.40");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].gst_paise, 2_340_000);
        assert_eq!(order.items[1].gst_paise, 10_440);
    }

    #[tokio::test]
    async fn test_persisted_grand_total_excludes_discount() {
        let db = setup().await;
        let pid = add_product(&db, "NUT-10", 999, 100).await;

        let order = db
            .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 7)]))
            .await
            .unwrap();

        assert_eq!(
            order.grand_total_paise,
            order.subtotal_paise + order.total_gst_paise
        );
        assert_eq!(order.total_discount_paise, 0);
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential() {
        let db = setup().await;
        let pid = add_product(&db, "BLT-08", 1_200, 100).await;

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let order = db
                .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 1)]))
                .await
                .unwrap();
            numbers.push(order.order_number);
        }

        let (_, _, first) = kosh_core::sequence::parse_identifier(&numbers[0]).unwrap();
        let (_, _, third) = kosh_core::sequence::parse_identifier(&numbers[2]).unwrap();
        assert_eq!(third, first + 2);
        assert_ne!(numbers[0], numbers[1]);
    }

    #[tokio::test]
    async fn test_stock_out_beyond_on_hand_clamps() {
        let db = setup().await;
        let pid = add_product(&db, "WIRE-2", 4_500, 4).await;

        let movement = db
            .record_stock_movement(
                &admin(),
                &pid,
                MovementKind::StockOut,
                10,
                MovementMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(movement.previous_stock, 4);
        assert_eq!(movement.new_stock, 0);
        assert_eq!(movement.quantity, 10);

        let summary = db.stock_summary(&admin()).await.unwrap();
        assert_eq!(summary.out_of_stock, 1);
        assert!(!summary.products[0].available);
    }

    #[tokio::test]
    async fn test_second_invoice_rejected_and_nothing_changes() {
        let db = setup().await;
        let pid = add_product(&db, "TAP-15", 45_000, 10).await;
        let order = db
            .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 1)]))
            .await
            .unwrap();

        let invoiced = db.issue_invoice(&admin(), &order.id).await.unwrap();
        let invoice_number = invoiced.invoice_number.clone().unwrap();
        assert!(invoice_number.starts_with("INV"));
        assert_eq!(invoiced.status, OrderStatus::Completed);
        assert!(invoiced.invoiced_at.is_some());

        let err = db.issue_invoice(&admin(), &order.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvoiceAlreadyIssued { ref invoice_number, .. })
                if invoice_number.starts_with("INV")
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after = db.get_order(&admin(), &order.id).await.unwrap();
        assert_eq!(after.invoice_number.as_deref(), Some(invoice_number.as_str()));
        assert_eq!(after.status, OrderStatus::Completed);
        assert_eq!(after.version, invoiced.version);
    }

    #[tokio::test]
    async fn test_payment_statuses_and_credit() {
        let db = setup().await;
        let pid = add_product(&db, "BULB-9", 10_000, 10).await;
        let order = db
            .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 1)]))
            .await
            .unwrap();
        assert_eq!(order.grand_total_paise, 11_800);
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let pay = |paise| PaymentUpdate {
            amount_paid_paise: Some(paise),
            ..Default::default()
        };

        let partial = db
            .update_order_payment(&admin(), &order.id, &pay(5_000))
            .await
            .unwrap();
        assert_eq!(partial.payment_status, PaymentStatus::Partial);
        assert_eq!(partial.amount_due_paise, 6_800);

        let paid = db
            .update_order_payment(&admin(), &order.id, &pay(11_800))
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.amount_due_paise, 0);
        assert_eq!(paid.credit(), None);

        let over = db
            .update_order_payment(&admin(), &order.id, &pay(15_000))
            .await
            .unwrap();
        assert_eq!(over.payment_status, PaymentStatus::Paid);
        assert_eq!(over.amount_due_paise, -3_200);
        assert_eq!(over.credit().map(|c| c.paise()), Some(3_200));

        let err = db
            .update_order_payment(&admin(), &order.id, &pay(-1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_price_edit_leaves_history_unchanged() {
        let db = setup().await;
        let pid = add_product(&db, "SW-1", 20_000, 10).await;
        let order = db
            .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 2)]))
            .await
            .unwrap();

        db.products().update_price(&pid, 99_000).await.unwrap();

        let stored = db.get_order(&admin(), &order.id).await.unwrap();
        assert_eq!(stored.items[0].unit_price_paise, 20_000);
        assert_eq!(stored.subtotal_paise, 40_000);
        assert_eq!(stored.grand_total_paise, order.grand_total_paise);
    }

    #[tokio::test]
    async fn test_cancel_returns_exactly_what_was_deducted() {
        let db = setup().await;
        let plenty = add_product(&db, "SCR-4", 300, 20).await;
        let scarce = add_product(&db, "HNG-2", 1_500, 3).await;

        let order = db
            .create_order(
                &admin(),
                &order_for(vec![LineRequest::new(&plenty, 5), LineRequest::new(&scarce, 8)]),
            )
            .await
            .unwrap();

        assert_eq!(db.stock().on_hand(&plenty).await.unwrap(), 15);
        assert_eq!(db.stock().on_hand(&scarce).await.unwrap(), 0);

        let cancel = PaymentUpdate {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        let cancelled = db
            .update_order_payment(&admin(), &order.id, &cancel)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        assert_eq!(db.stock().on_hand(&plenty).await.unwrap(), 20);
        assert_eq!(db.stock().on_hand(&scarce).await.unwrap(), 3);

        let filter = MovementFilter {
            reference_id: Some(order.id.clone()),
            kind: Some(MovementKind::Return),
            ..Default::default()
        };
        let returns = db.movements(&admin(), &filter, None, None).await.unwrap();
        assert_eq!(returns.total, 2);

        for pid in [&plenty, &scarce] {
            db.reconcile(&admin(), pid).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_order_total_overflow_is_validation_error() {
        let db = setup().await;
        let pid = add_product(&db, "LAP-09", 6_500_000, 10).await;

        let err = db
            .create_order(
                &admin(),
                &order_for(vec![LineRequest::new(&pid, 1_400_000_000_000)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(db.stock().on_hand(&pid).await.unwrap(), 10);
        let page = db.list_orders(&admin(), None, None, None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_cancel_ignores_manual_movements_tagged_with_order() {
        let db = setup().await;
        let staff = Caller::new("staff-1", Role::Staff);
        let pid = add_product(&db, "VLV-3", 2_000, 10).await;

        let order = db
            .create_order(&staff, &order_for(vec![LineRequest::new(&pid, 2)]))
            .await
            .unwrap();
        assert_eq!(db.stock().on_hand(&pid).await.unwrap(), 8);

        let tagged = MovementMetadata {
            reference_id: Some(order.id.clone()),
            note: Some("site delivery".to_string()),
            ..Default::default()
        };
        db.record_stock_movement(&staff, &pid, MovementKind::StockOut, 5, tagged)
            .await
            .unwrap();
        let before = db.stock().on_hand(&pid).await.unwrap();
        assert_eq!(before, 3);

        let cancel = PaymentUpdate {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        db.update_order_payment(&staff, &order.id, &cancel)
            .await
            .unwrap();

        let after = db.stock().on_hand(&pid).await.unwrap();
        assert_eq!(after - before, 2);
        assert_eq!(after, 5);
        db.reconcile(&staff, &pid).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_order_refuses_updates() {
        let db = setup().await;
        let pid = add_product(&db, "FAN-1", 250_000, 2).await;
        let order = db
            .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 1)]))
            .await
            .unwrap();

        let cancel = PaymentUpdate {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        db.update_order_payment(&admin(), &order.id, &cancel)
            .await
            .unwrap();

        let pay = PaymentUpdate {
            amount_paid_paise: Some(100),
            ..Default::default()
        };
        let err = db
            .update_order_payment(&admin(), &order.id, &pay)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = db.issue_invoice(&admin(), &order.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let db = setup().await;
        let pid = add_product(&db, "MCB-32", 32_000, 10).await;
        let order = db
            .create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 1)]))
            .await
            .unwrap();

        for status in [OrderStatus::Completed, OrderStatus::Draft] {
            let update = PaymentUpdate {
                status: Some(status),
                ..Default::default()
            };
            let err = db
                .update_order_payment(&admin(), &order.id, &update)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                DbError::Domain(CoreError::InvalidStatusTransition { .. })
            ));
        }

        let processing = PaymentUpdate {
            status: Some(OrderStatus::Processing),
            ..Default::default()
        };
        let order = db
            .update_order_payment(&admin(), &order.id, &processing)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        let invoiced = db.issue_invoice(&admin(), &order.id).await.unwrap();
        assert_eq!(invoiced.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_roles_are_enforced() {
        let db = setup().await;
        let pid = add_product(&db, "GLV-1", 8_000, 10).await;
        let staff = Caller::new("staff-1", Role::Staff);
        let auditor = Caller::new("audit-1", Role::Auditor);

        let order = db
            .create_order(&staff, &order_for(vec![LineRequest::new(&pid, 1)]))
            .await
            .unwrap();
        assert_eq!(order.created_by, "staff-1");

        let err = db.issue_invoice(&staff, &order.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = db
            .create_order(&auditor, &order_for(vec![LineRequest::new(&pid, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = db
            .record_stock_movement(
                &auditor,
                &pid,
                MovementKind::StockIn,
                1,
                MovementMetadata::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        assert_eq!(db.get_order(&auditor, &order.id).await.unwrap().id, order.id);
        assert!(db.stock_summary(&auditor).await.is_ok());

        // Forbidden calls must not have minted anything.
        let page = db.list_orders(&auditor, None, None, None).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let db = setup().await;
        let err = db.get_order(&admin(), "nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_order_paging() {
        let db = setup().await;
        let pid = add_product(&db, "TAPE-1", 2_000, 100).await;
        for _ in 0..5 {
            db.create_order(&admin(), &order_for(vec![LineRequest::new(&pid, 1)]))
                .await
                .unwrap();
        }

        let first = db.list_orders(&admin(), None, Some(1), Some(2)).await.unwrap();
        let last = db.list_orders(&admin(), None, Some(3), Some(2)).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 2);
        assert_eq!(last.items.len(), 1);
        assert_eq!(first.total_pages(), 3);

        let err = db
            .list_orders(&admin(), None, Some(0), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
