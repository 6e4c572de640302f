//! End-to-end cart, order and payment flow.
//!
//! These tests require a `PostgreSQL` database named by `TEST_DATABASE_URL`.
//! Stripe is replaced by an in-process stand-in.
//!
//! Run with: cargo test -p quickbite-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use quickbite_integration_tests::TestContext;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

fn order_body() -> Value {
    json!({
        "items": [
            { "_id": "m-101", "name": "Masala Dosa", "price": 89.5, "quantity": 2 },
            { "_id": "m-205", "price": 40, "quantity": 1 }
        ],
        "address": {
            "firstName": "Asha",
            "lastName": "Rao",
            "street": "12 MG Road",
            "city": "Pune"
        }
    })
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_cart_add_remove_get() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Cart Tester").await;

    let (status, body) = ctx
        .post_as(user, "/api/cart/add", &json!({ "itemId": "m-101" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Added To Cart");
    assert_eq!(body["cartData"], json!({ "m-101": 1 }));

    ctx.post_as(user, "/api/cart/add", &json!({ "itemId": "m-101" }))
        .await;
    ctx.post_as(user, "/api/cart/add", &json!({ "itemId": "m-205" }))
        .await;

    let (status, body) = ctx
        .post_as(user, "/api/cart/remove", &json!({ "itemId": "m-205" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Removed From Cart");

    let (status, body) = ctx.post_as(user, "/api/cart/get", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cartData"], json!({ "m-101": 2 }));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_cart_for_unknown_user() {
    let ctx = TestContext::start().await;
    let ghost = quickbite_core::UserId::new(i32::MAX);

    let (status, body) = ctx.post_as(ghost, "/api/cart/get", &json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

// ============================================================================
// Placement & Verification
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_paid_order_is_confirmed() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Paying Customer").await;
    ctx.post_as(user, "/api/cart/add", &json!({ "itemId": "m-101" }))
        .await;

    let (status, placed) = ctx.post_as(user, "/api/order/place", &order_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(placed["success"], true);
    let order_id = placed["orderId"].as_i64().unwrap();
    let session_id = placed["sessionId"].as_str().unwrap().to_string();
    assert!(placed["session_url"].as_str().unwrap().contains(&session_id));

    // Line items reached the processor in minor units, delivery last.
    let session = ctx.stripe.session(&session_id).unwrap();
    let form = |key: &str| {
        session
            .form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(form("line_items[0][price_data][unit_amount]").as_deref(), Some("8950"));
    assert_eq!(form("line_items[1][price_data][product_data][name]").as_deref(), Some("Item"));
    assert_eq!(form("line_items[2][price_data][product_data][name]").as_deref(), Some("Delivery Charges"));
    assert_eq!(form("client_reference_id"), Some(order_id.to_string()));

    // Cart was cleared by placement.
    let (_, cart) = ctx.post_as(user, "/api/cart/get", &json!({})).await;
    assert_eq!(cart["cartData"], json!({}));

    ctx.stripe.mark_paid(&session_id);
    let (status, body) = ctx
        .post(
            "/api/order/verify",
            &json!({ "orderId": order_id.to_string(), "sessionId": session_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Payment verified and order confirmed");

    let (status, orders) = ctx.post_as(user, "/api/order/userorders", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let order = &orders["data"][0];
    assert_eq!(order["id"], order_id);
    assert_eq!(order["payment"], true);
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["amount"], 249.0);
    assert_eq!(order["address"]["city"], "Pune");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_unpaid_order_is_cancelled() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Abandoning Customer").await;

    let (_, placed) = ctx.post_as(user, "/api/order/place", &order_body()).await;
    let order_id = placed["orderId"].clone();
    let session_id = placed["sessionId"].clone();

    let (status, body) = ctx
        .post(
            "/api/order/verify",
            &json!({ "orderId": order_id, "sessionId": session_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Payment not completed or cancelled");

    let (_, orders) = ctx.post_as(user, "/api/order/userorders", &json!({})).await;
    assert_eq!(orders["data"][0]["status"], "cancelled");
    assert_eq!(orders["data"][0]["payment"], false);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_verify_rejects_foreign_session() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Mismatch Customer").await;

    let (_, first) = ctx.post_as(user, "/api/order/place", &order_body()).await;
    let (_, second) = ctx.post_as(user, "/api/order/place", &order_body()).await;

    let (status, body) = ctx
        .post(
            "/api/order/verify",
            &json!({ "orderId": first["orderId"], "sessionId": second["sessionId"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Session does not match order");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_failed_session_creation_leaves_pending_order() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Declined Customer").await;
    ctx.post_as(user, "/api/cart/add", &json!({ "itemId": "m-101" }))
        .await;

    ctx.stripe.reject_session_creation(true);
    let (status, body) = ctx.post_as(user, "/api/order/place", &order_body()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Error placing order");

    let (_, orders) = ctx.post_as(user, "/api/order/userorders", &json!({})).await;
    let orders = orders["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["payment"], false);
    assert!(orders[0].get("paymentId").is_none());

    let (_, cart) = ctx.post_as(user, "/api/cart/get", &json!({})).await;
    assert_eq!(cart["cartData"], json!({}));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_order_without_session_cannot_borrow_paid_session() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Borrowing Customer").await;

    ctx.stripe.reject_session_creation(true);
    ctx.post_as(user, "/api/order/place", &order_body()).await;
    let (_, orders) = ctx.post_as(user, "/api/order/userorders", &json!({})).await;
    let orphan_id = orders["data"][0]["id"].as_i64().unwrap();

    ctx.stripe.reject_session_creation(false);
    let (_, paid) = ctx.post_as(user, "/api/order/place", &order_body()).await;
    let paid_session = paid["sessionId"].as_str().unwrap().to_string();
    ctx.stripe.mark_paid(&paid_session);

    let (status, body) = ctx
        .post(
            "/api/order/verify",
            &json!({ "orderId": orphan_id, "sessionId": paid_session }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Session does not match order");

    let (_, orders) = ctx.post_as(user, "/api/order/userorders", &json!({})).await;
    let orphan = orders["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["id"] == orphan_id)
        .unwrap()
        .clone();
    assert_eq!(orphan["status"], "pending");
    assert_eq!(orphan["payment"], false);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_verify_unknown_order() {
    let ctx = TestContext::start().await;

    let (status, body) = ctx
        .post(
            "/api/order/verify",
            &json!({ "orderId": i32::MAX, "sessionId": "cs_test_missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Order not found");
}

// ============================================================================
// Administration
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_admin_updates_and_filters_status() {
    let ctx = TestContext::start().await;
    let user = ctx.create_user("Admin Flow Customer").await;

    let (_, placed) = ctx.post_as(user, "/api/order/place", &order_body()).await;
    let order_id = placed["orderId"].as_i64().unwrap();

    let (status, body) = ctx
        .admin(
            Method::POST,
            "/api/order/status",
            Some(&json!({ "orderId": order_id, "status": "out-for-delivery" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Status Updated");

    let (status, body) = ctx
        .admin(Method::GET, "/api/order/list?status=out-for-delivery", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["id"].as_i64())
        .collect();
    assert!(ids.contains(&order_id));
    assert!(
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .all(|o| o["status"] == "out-for-delivery")
    );

    let (status, body) = ctx
        .admin(
            Method::POST,
            "/api/order/status",
            Some(&json!({ "orderId": i32::MAX, "status": "delivered" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Order not found");
}
