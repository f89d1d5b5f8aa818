//! HTTP handlers for purchase order endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{OrderStatus, PurchaseOrder};
use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::services::order::{
    CreateOrderInput, OrderListFilter, OrderService, OrderWithItems, UpdateOrderInput,
};
use crate::AppState;

/// Query parameters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

fn order_service(state: AppState) -> OrderService {
    let prefix = state.config.orders.number_prefix.clone();
    OrderService::new(state.db, prefix)
}

/// List orders with optional status and date filters
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<PaginatedResponse<PurchaseOrder>>> {
    let pagination = Pagination {
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let filter = OrderListFilter {
        status: query.status,
        from: query.from,
        to: query.to,
    };

    let orders = order_service(state).list_orders(pagination, filter).await?;
    Ok(Json(orders))
}

/// Create a purchase order (runs an allocation pass)
pub async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<OrderWithItems>> {
    let order = order_service(state).create_order(input).await?;
    Ok(Json(order))
}

/// Get an order with its line items
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderWithItems>> {
    let order = order_service(state).get_order(order_id).await?;
    Ok(Json(order))
}

/// Replace an order's line items (runs an allocation pass)
pub async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<OrderWithItems>> {
    let order = order_service(state).update_order(order_id, input).await?;
    Ok(Json(order))
}

/// Cancel an order, releasing its allocation
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderWithItems>> {
    let order = order_service(state).cancel_order(order_id).await?;
    Ok(Json(order))
}

/// Confirm shipment of an order's allocated units
pub async fn confirm_shipment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderWithItems>> {
    let order = order_service(state).confirm_shipment(order_id).await?;
    Ok(Json(order))
}
