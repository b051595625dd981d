//! HTTP tests: the full router driven with `oneshot` over an in-memory
//! database.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use kosh_api::{router, AppState};
use kosh_core::{MovementKind, MovementMetadata, Product};
use kosh_db::{Database, DbConfig};

struct TestApp {
    app: Router,
    db: Database,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        TestApp {
            app: router(AppState::new(db.clone())),
            db,
        }
    }

    async fn product(&self, sku: &str, price_paise: i64, opening: i64) -> String {
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
        self.db.products().insert(&product).await.unwrap();
        if opening > 0 {
            self.db
                .stock()
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

    async fn call(
        &self,
        method: &str,
        uri: &str,
        role: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder
                .header("x-user-id", format!("{role}-user"))
                .header("x-user-role", role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

fn order_body(product_id: &str, quantity: i64) -> Value {
    json!({
        "customer": {"name": "Gupta Electricals", "phone": "9876543210"},
        "items": [{"product_id": product_id, "quantity": quantity}],
        "payment_method": "upi"
    })
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let t = TestApp::new().await;
    let (status, body) = t.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let t = TestApp::new().await;
    let pid = t.product("LAP-01", 6_500_000, 10).await;

    let (status, order) = t
        .call("POST", "/api/orders", Some("staff"), Some(order_body(&pid, 2)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["grand_total_paise"], 15_340_000);
    let id = order["id"].as_str().unwrap().to_string();

    let (status, fetched) = t
        .call("GET", &format!("/api/orders/{id}"), Some("auditor"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], order["order_number"]);

    let (status, paid) = t
        .call(
            "PATCH",
            &format!("/api/orders/{id}/payment"),
            Some("staff"),
            Some(json!({"amount_paid_paise": 15_340_000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["amount_due_paise"], 0);

    let (status, _) = t
        .call("POST", &format!("/api/orders/{id}/invoice"), Some("staff"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, invoiced) = t
        .call("POST", &format!("/api/orders/{id}/invoice"), Some("manager"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoiced["status"], "completed");
    assert!(invoiced["invoice_number"].as_str().unwrap().starts_with("INV"));

    let (status, err) = t
        .call("POST", &format!("/api/orders/{id}/invoice"), Some("manager"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "conflict");

    let (status, page) = t
        .call("GET", "/api/orders?status=completed&page=1&page_size=10", Some("admin"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_identity_is_required() {
    let t = TestApp::new().await;

    let (status, body) = t.call("GET", "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = t.call("GET", "/api/orders", Some("superuser"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auditor_cannot_write() {
    let t = TestApp::new().await;
    let pid = t.product("TAP-01", 45_000, 10).await;

    let (status, body) = t
        .call("POST", "/api/orders", Some("auditor"), Some(order_body(&pid, 1)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = t
        .call(
            "POST",
            "/api/stock/movements",
            Some("auditor"),
            Some(json!({"product_id": pid, "kind": "stock_in", "quantity": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_validation_errors_are_400() {
    let t = TestApp::new().await;
    let pid = t.product("NUT-01", 500, 10).await;

    let (status, body) = t
        .call("POST", "/api/orders", Some("staff"), Some(order_body(&pid, 0)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, _) = t
        .call(
            "POST",
            "/api/orders",
            Some("staff"),
            Some(json!({"customer": {"name": "X"}, "items": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .call(
            "POST",
            "/api/stock/movements",
            Some("staff"),
            Some(json!({"product_id": pid, "kind": "teleport", "quantity": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("stock_in"));

    let (status, _) = t
        .call("POST", "/api/orders", Some("staff"), Some(json!({"items": "nope"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let t = TestApp::new().await;

    let (status, _) = t
        .call("GET", "/api/orders/does-not-exist", Some("admin"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .call("POST", "/api/orders", Some("admin"), Some(order_body("missing", 1)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .call("GET", "/api/stock/missing/reconcile", Some("admin"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stock_endpoints() {
    let t = TestApp::new().await;
    let pid = t.product("WIRE-1", 4_500, 4).await;

    let (status, movement) = t
        .call(
            "POST",
            "/api/stock/movements",
            Some("staff"),
            Some(json!({
                "product_id": pid,
                "kind": "stock_out",
                "quantity": 10,
                "note": "site delivery"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(movement["previous_stock"], 4);
    assert_eq!(movement["new_stock"], 0);
    assert_eq!(movement["quantity"], 10);
    assert_eq!(movement["note"], "site delivery");

    let (status, summary) = t.call("GET", "/api/stock/summary", Some("auditor"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["out_of_stock"], 1);

    let (status, page) = t
        .call(
            "GET",
            &format!("/api/stock/movements?product_id={pid}&kind=stock_out"),
            Some("auditor"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let (status, rec) = t
        .call("GET", &format!("/api/stock/{pid}/reconcile"), Some("auditor"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rec["on_hand"], 0);
    assert_eq!(rec["movement_count"], 2);
}
