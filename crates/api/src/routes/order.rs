//! Order route handlers.
//!
//! Customers place orders and list their own; the verify endpoint is called by
//! the frontend after Stripe redirects back; operators list all orders and
//! move them through their statuses.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use quickbite_core::{OrderId, OrderItem, OrderStatus};

use crate::db::{OrderRepository, RepositoryError};
use crate::error::{ApiJson, AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::Order;
use crate::services::checkout::{CheckoutError, PaymentOutcome};
use crate::state::AppState;

/// Body of `POST /api/order/place`.
///
/// A `userId` sent by older clients is ignored; the caller comes from the token.
/// Items stay raw JSON until validated so a malformed line reads as an invalid
/// item rather than a body error.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub address: serde_json::Value,
}

/// Reply to a successful placement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub success: bool,
    /// Hosted checkout page to redirect the customer to.
    #[serde(rename = "session_url")]
    pub session_url: Option<String>,
    pub order_id: OrderId,
    pub session_id: String,
}

/// Body of `POST /api/order/verify`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub order_id: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /api/order/status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[serde(default)]
    pub order_id: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Query of `GET /api/order/list`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// Plain `{ success, message }` reply.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// `{ success, data }` reply for order listings.
#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub data: Vec<Order>,
}

/// Read an order id sent as a JSON number or numeric string.
fn order_id_from_json(value: &serde_json::Value) -> Option<OrderId> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(OrderId::new),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn required_order_id(value: Option<&serde_json::Value>, missing: &str) -> Result<OrderId> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::BadRequest(missing.to_string()))?;
    order_id_from_json(value).ok_or_else(|| AppError::BadRequest("Invalid order id".to_string()))
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid status".to_string()))
}

/// Place an order and open a Stripe checkout session for it.
#[instrument(skip(state, body), fields(user_id = %user.id, items = body.items.len()))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<Json<PlaceOrderResponse>> {
    let items = OrderItem::from_json_list(body.items).map_err(CheckoutError::from)?;
    let placed = state
        .checkout()
        .place_order(user.id, &items, &body.address)
        .await
        .map_err(|e| AppError::from(e).context("Error placing order"))?;

    Ok(Json(PlaceOrderResponse {
        success: true,
        session_url: placed.session_url,
        order_id: placed.order_id,
        session_id: placed.session_id,
    }))
}

/// Reconcile an order with its checkout session after the redirect.
#[instrument(skip(state, body))]
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyRequest>,
) -> Result<Json<MessageResponse>> {
    let session_id = body
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing data".to_string()))?;
    let order_id = required_order_id(body.order_id.as_ref(), "Missing data")?;

    let outcome = state
        .checkout()
        .verify_payment(order_id, session_id)
        .await
        .map_err(|e| AppError::from(e).context("Error verifying payment"))?;

    Ok(Json(match outcome {
        PaymentOutcome::Confirmed => MessageResponse {
            success: true,
            message: "Payment verified and order confirmed",
        },
        PaymentOutcome::Cancelled => MessageResponse {
            success: false,
            message: "Payment not completed or cancelled",
        },
    }))
}

/// List the caller's orders, newest first.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn user_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<OrdersResponse>> {
    let data = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await
        .map_err(|e| AppError::from(e).context("Error fetching orders"))?;

    Ok(Json(OrdersResponse {
        success: true,
        data,
    }))
}

/// List every order, newest first, optionally filtered by `?status=`.
#[instrument(skip(state, _admin))]
pub async fn list(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrdersResponse>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .transpose()?;

    let data = OrderRepository::new(state.pool())
        .list_all(status)
        .await
        .map_err(|e| AppError::from(e).context("Error fetching orders"))?;

    Ok(Json(OrdersResponse {
        success: true,
        data,
    }))
}

/// Set an order's status.
#[instrument(skip(state, _admin, body))]
pub async fn update_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<MessageResponse>> {
    let order_id = required_order_id(body.order_id.as_ref(), "Missing order id")?;
    let status = parse_status(body.status.as_deref().unwrap_or_default())?;

    OrderRepository::new(state.pool())
        .update_status(order_id, status)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CheckoutError::OrderNotFound.into(),
            other => AppError::from(other).context("Error updating status"),
        })?;

    info!(order_id = %order_id, status = %status, "Order status updated");
    Ok(Json(MessageResponse {
        success: true,
        message: "Status Updated",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_from_number_or_string() {
        assert_eq!(
            order_id_from_json(&serde_json::json!(14)),
            Some(OrderId::new(14))
        );
        assert_eq!(
            order_id_from_json(&serde_json::json!("14")),
            Some(OrderId::new(14))
        );
        assert_eq!(order_id_from_json(&serde_json::json!("abc")), None);
        assert_eq!(order_id_from_json(&serde_json::json!(1.5)), None);
        assert_eq!(order_id_from_json(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_required_order_id_missing() {
        let err = required_order_id(None, "Missing data").unwrap_err();
        assert_eq!(err.client_message(), "Missing data");

        let null = serde_json::Value::Null;
        let err = required_order_id(Some(&null), "Missing data").unwrap_err();
        assert_eq!(err.client_message(), "Missing data");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            parse_status("out-for-delivery").unwrap(),
            OrderStatus::OutForDelivery
        );
        let err = parse_status("teleported").unwrap_err();
        assert_eq!(err.client_message(), "Invalid status");
    }

    #[test]
    fn test_place_request_ignores_user_id() {
        let body: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "userId": 99,
            "items": [{ "_id": "p1", "name": "Vada", "price": 40, "quantity": 2 }],
            "address": { "city": "Pune" }
        }))
        .unwrap();
        assert_eq!(body.items.len(), 1);
        assert!(body.address.is_object());
    }

    #[test]
    fn test_place_response_shape() {
        let value = serde_json::to_value(PlaceOrderResponse {
            success: true,
            session_url: Some("https://checkout.stripe.com/c/pay/cs_1".to_string()),
            order_id: OrderId::new(5),
            session_id: "cs_1".to_string(),
        })
        .unwrap();
        assert_eq!(value["session_url"], "https://checkout.stripe.com/c/pay/cs_1");
        assert_eq!(value["orderId"], 5);
        assert_eq!(value["sessionId"], "cs_1");
    }
}
