use axum::{extract::{Path, State}, http::StatusCode, Json};
use common::types::{Listing, Message};
use service::products::{Product, ProductInput};

use crate::errors::JsonApiError;
use crate::state::ServerState;

/// 列出全部商品（空列表同样返回 200）
pub async fn list_products(State(state): State<ServerState>) -> Json<Listing<Product>> {
    Json(state.products.find_all().await.into())
}

pub async fn get_product(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, JsonApiError> {
    state
        .products
        .find_one(&id)
        .await
        .map(Json)
        .ok_or_else(|| JsonApiError::not_found("Product does not exist"))
}

/// Every field is required on creation.
pub async fn create_product(
    State(state): State<ServerState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), JsonApiError> {
    input.validate()?;
    let created = state.products.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Full replace: fields missing from the body are blanked.
pub async fn update_product(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, JsonApiError> {
    state
        .products
        .update(&id, input)
        .await?
        .map(Json)
        .ok_or_else(|| JsonApiError::not_found("Product does not exist"))
}

pub async fn delete_product(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, JsonApiError> {
    if state.products.remove(&id).await? {
        Ok(Json(Message::new("Product deleted")))
    } else {
        Err(JsonApiError::not_found(format!("No product with ID {id}")))
    }
}
