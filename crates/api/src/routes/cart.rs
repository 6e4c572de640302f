//! Cart route handlers.
//!
//! The cart is a map of menu item id to quantity stored on the user row.
//! Every handler loads the user named by the verified token, applies one
//! change, and writes the whole map back.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use quickbite_core::{CartData, ItemId};

use crate::db::UserRepository;
use crate::error::{ApiJson, AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{CurrentUser, User};
use crate::state::AppState;

/// Body of add/remove requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[serde(default)]
    pub item_id: Option<String>,
}

impl CartItemRequest {
    fn item(&self) -> Result<ItemId> {
        self.item_id
            .as_deref()
            .and_then(ItemId::parse)
            .ok_or_else(|| AppError::BadRequest("Missing item id".to_string()))
    }
}

/// Reply carrying the cart after a change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub cart_data: CartData,
}

async fn load_user(state: &AppState, user: CurrentUser) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Add one unit of an item to the caller's cart.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<CartItemRequest>,
) -> Result<Json<CartResponse>> {
    let item = body.item()?;

    let result: Result<CartData> = async {
        let mut cart = load_user(&state, user).await?.cart;
        let quantity = cart.add(&item);
        UserRepository::new(state.pool())
            .save_cart(user.id, &cart)
            .await?;
        info!(item = %item, quantity, "Added to cart");
        Ok(cart)
    }
    .await;

    let cart = result.map_err(|e| e.context("Error adding to cart"))?;
    Ok(Json(CartResponse {
        success: true,
        message: Some("Added To Cart"),
        cart_data: cart,
    }))
}

/// Remove one unit of an item from the caller's cart.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<CartItemRequest>,
) -> Result<Json<CartResponse>> {
    let item = body.item()?;

    let result: Result<CartData> = async {
        let mut cart = load_user(&state, user).await?.cart;
        let remaining = cart.remove(&item);
        UserRepository::new(state.pool())
            .save_cart(user.id, &cart)
            .await?;
        info!(item = %item, remaining, "Removed from cart");
        Ok(cart)
    }
    .await;

    let cart = result.map_err(|e| e.context("Error removing from cart"))?;
    Ok(Json(CartResponse {
        success: true,
        message: Some("Removed From Cart"),
        cart_data: cart,
    }))
}

/// Return the caller's cart.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn get(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartResponse>> {
    let user = load_user(&state, user)
        .await
        .map_err(|e| e.context("Error fetching cart"))?;

    Ok(Json(CartResponse {
        success: true,
        message: None,
        cart_data: user.cart,
    }))
}
