//! Stock ledger endpoints.
//!
//! | Method | Path                                  | Success |
//! |--------|---------------------------------------|---------|
//! | POST   | `/api/stock/movements`                | 201     |
//! | GET    | `/api/stock/movements`                | 200     |
//! | GET    | `/api/stock/summary`                  | 200     |
//! | GET    | `/api/stock/{product_id}/reconcile`   | 200     |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use kosh_core::{MovementKind, MovementMetadata, Page, StockMovement, StockSummary};
use kosh_db::{MovementFilter, Reconciliation};

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stock/movements", get(list_movements).post(record_movement))
        .route("/api/stock/summary", get(summary))
        .route("/api/stock/{product_id}/reconcile", get(reconcile))
}

/// Body of `POST /api/stock/movements`.
///
/// `kind` stays a string until parsed so an unknown kind reports the
/// allowed set instead of a generic body error.
#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub product_id: String,
    pub kind: String,
    pub quantity: i64,
    #[serde(flatten)]
    pub metadata: MovementMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MovementQuery {
    pub product_id: Option<String>,
    pub kind: Option<String>,
    pub reference_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn record_movement(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<RecordMovementRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StockMovement>)> {
    let Json(request) = payload?;
    let kind: MovementKind = request.kind.parse()?;

    let movement = state
        .db
        .record_stock_movement(
            &caller,
            &request.product_id,
            kind,
            request.quantity,
            request.metadata,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

async fn list_movements(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    query: Result<Query<MovementQuery>, QueryRejection>,
) -> ApiResult<Json<Page<StockMovement>>> {
    let Query(query) = query?;

    let filter = MovementFilter {
        product_id: query.product_id,
        kind: query
            .kind
            .as_deref()
            .map(str::parse::<MovementKind>)
            .transpose()?,
        reference_id: query.reference_id,
        from: query.from,
        to: query.to,
    };

    let page = state
        .db
        .movements(&caller, &filter, query.page, query.page_size)
        .await?;
    Ok(Json(page))
}

async fn summary(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<StockSummary>> {
    Ok(Json(state.db.stock_summary(&caller).await?))
}

async fn reconcile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Reconciliation>> {
    Ok(Json(state.db.reconcile(&caller, &product_id).await?))
}
