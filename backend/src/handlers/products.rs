//! HTTP handlers for product catalog endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{InventoryOption, Product};
use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::services::allocation::{AllocationService, AllocationSummary};
use crate::services::product::{
    CreateProductInput, InventoryOptionInput, InventoryUpdateResult, ProductService,
    ProductWithOptions, UpdateProductInput,
};
use crate::AppState;

/// Query parameters for listing products
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    let pagination = Pagination {
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let products = ProductService::new(state.db).list_products(pagination).await?;
    Ok(Json(products))
}

/// Create a product with its inventory options
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<ProductWithOptions>> {
    let product = ProductService::new(state.db).create_product(input).await?;
    Ok(Json(product))
}

/// Get a product with its inventory options
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductWithOptions>> {
    let product = ProductService::new(state.db).get_product(product_id).await?;
    Ok(Json(product))
}

/// Update a product's descriptive fields
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let product = ProductService::new(state.db)
        .update_product(product_id, input)
        .await?;
    Ok(Json(product))
}

/// Get a product's inventory options
pub async fn get_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryOption>>> {
    let options = ProductService::new(state.db).get_inventory(product_id).await?;
    Ok(Json(options))
}

/// Manually rerun the allocation pass for a product, e.g. after stock was
/// adjusted outside the API
pub async fn reallocate_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<AllocationSummary>> {
    ProductService::new(state.db.clone()).get_product(product_id).await?;
    let summary = AllocationService::new(state.db)
        .reallocate_products(&[product_id])
        .await?;
    Ok(Json(summary))
}

/// Replace a product's inventory options (runs an allocation pass)
pub async fn replace_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(options): Json<Vec<InventoryOptionInput>>,
) -> AppResult<Json<InventoryUpdateResult>> {
    let result = ProductService::new(state.db)
        .replace_inventory(product_id, options)
        .await?;
    Ok(Json(result))
}
