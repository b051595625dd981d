//! Order endpoints.
//!
//! | Method | Path                          | Success |
//! |--------|-------------------------------|---------|
//! | POST   | `/api/orders`                 | 201     |
//! | GET    | `/api/orders`                 | 200     |
//! | GET    | `/api/orders/{id}`            | 200     |
//! | PATCH  | `/api/orders/{id}/payment`    | 200     |
//! | POST   | `/api/orders/{id}/invoice`    | 200     |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use kosh_core::{Order, OrderStatus, Page};
use kosh_db::{NewOrder, PaymentUpdate};

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order).get(list_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/payment", patch(update_payment))
        .route("/api/orders/{id}/invoice", post(issue_invoice))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OrderListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn create_order(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let Json(request) = payload?;
    let order = state.db.create_order(&caller, &request).await?;

    info!(
        user_id = %caller.user_id,
        order_number = %order.order_number,
        "Order created via API"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    params: Result<Query<OrderListParams>, QueryRejection>,
) -> ApiResult<Json<Page<Order>>> {
    let Query(params) = params?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()?;

    let page = state
        .db
        .list_orders(&caller, status, params.page, params.page_size)
        .await?;
    Ok(Json(page))
}

async fn get_order(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.db.get_order(&caller, &id).await?;
    Ok(Json(order))
}

async fn update_payment(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    payload: Result<Json<PaymentUpdate>, JsonRejection>,
) -> ApiResult<Json<Order>> {
    let Json(update) = payload?;
    let order = state.db.update_order_payment(&caller, &id, &update).await?;
    Ok(Json(order))
}

async fn issue_invoice(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.db.issue_invoice(&caller, &id).await?;
    Ok(Json(order))
}
