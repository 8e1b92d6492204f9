use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{order_url, validate, AppState};
use crate::domain::aggregates::{Cart, Order};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(max = 1000))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub total: crate::domain::value_objects::Money,
    pub url: String,
}

pub async fn get_cart(State(state): State<AppState>, Path(session): Path<String>) -> Result<Json<Cart>> {
    Ok(Json(state.checkout.cart(&session).await?))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<Cart>> {
    validate(&request)?;
    Ok(Json(state.checkout.add_to_cart(&session, request.product_id, request.quantity).await?))
}

pub async fn clear_cart(State(state): State<AppState>, Path(session): Path<String>) -> Result<StatusCode> {
    state.checkout.clear_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_item(
    State(state): State<AppState>,
    Path((session, product_id)): Path<(String, Uuid)>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>> {
    validate(&request)?;
    Ok(Json(state.checkout.update_quantity(&session, product_id, request.quantity).await?))
}

pub async fn remove_item(State(state): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> Result<Json<Cart>> {
    Ok(Json(state.checkout.remove_item(&session, product_id).await?))
}

pub async fn place_order(State(state): State<AppState>, Json(request): Json<PlaceOrderRequest>) -> Result<(StatusCode, Json<PlacedOrder>)> {
    validate(&request)?;
    let order = state.checkout.place_order(&request.session_id).await?;
    let placed = PlacedOrder { total: order.total(), url: order_url(order.id()), order };
    Ok((StatusCode::CREATED, Json(placed)))
}
