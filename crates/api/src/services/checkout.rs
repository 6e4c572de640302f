//! Order placement and payment reconciliation.
//!
//! Placing an order is three sequential remote calls: insert the pending
//! order, clear the cart, create the checkout session. Verification retrieves
//! the session and writes the outcome back to the order. Nothing here is
//! transactional: a failed step leaves earlier steps in place.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use quickbite_core::{
    MoneyError, OrderId, OrderItem, OrderStatus, OrderTotals, UserId, ValidationError,
    to_minor_units,
};

use super::payments::{
    CheckoutLine, CheckoutRequest, CheckoutSession, PaymentError, SESSION_ID_PLACEHOLDER,
    StripeClient,
};
use crate::config::PaymentsConfig;
use crate::db::{NewOrder, OrderRepository, RepositoryError, UserRepository};

/// Name of the extra checkout line carrying the delivery fee.
pub const DELIVERY_LINE_NAME: &str = "Delivery Charges";

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Order request failed validation.
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// An amount could not be converted for the processor.
    #[error("invalid amount: {0}")]
    Money(#[from] MoneyError),

    /// Delivery address missing or not an object.
    #[error("missing delivery address")]
    MissingAddress,

    /// User does not exist.
    #[error("user not found")]
    UserNotFound,

    /// Order does not exist.
    #[error("order not found")]
    OrderNotFound,

    /// Session id does not belong to the order.
    #[error("checkout session does not match order")]
    SessionMismatch,

    /// Database operation failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Payment processor call failed.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Result of a successful order placement.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub session_id: String,
    pub session_url: Option<String>,
}

/// Outcome of reconciling an order against its checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Session paid; order confirmed.
    Confirmed,
    /// Session unpaid or abandoned; order cancelled.
    Cancelled,
}

/// Checkout lines for `items` plus one delivery line.
///
/// # Errors
///
/// Returns `MoneyError` if a price cannot be expressed in minor units.
pub fn checkout_lines(
    items: &[OrderItem],
    delivery_fee: Decimal,
) -> Result<Vec<CheckoutLine>, MoneyError> {
    let mut lines = items
        .iter()
        .map(|item| {
            Ok(CheckoutLine {
                name: item.display_name().to_owned(),
                unit_amount: to_minor_units(item.price)?,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>, MoneyError>>()?;

    lines.push(CheckoutLine {
        name: DELIVERY_LINE_NAME.to_owned(),
        unit_amount: to_minor_units(delivery_fee)?,
        quantity: 1,
    });

    Ok(lines)
}

fn verify_page(frontend_url: &Url) -> String {
    format!("{}/verify", frontend_url.as_str().trim_end_matches('/'))
}

/// Redirect target after a successful payment.
#[must_use]
pub fn success_url(frontend_url: &Url, order_id: OrderId) -> String {
    format!(
        "{}?session_id={SESSION_ID_PLACEHOLDER}&orderId={order_id}",
        verify_page(frontend_url)
    )
}

/// Redirect target after the customer abandons checkout.
#[must_use]
pub fn cancel_url(frontend_url: &Url, order_id: OrderId) -> String {
    format!("{}?cancel=true&orderId={order_id}", verify_page(frontend_url))
}

/// Accept `session_id` only if it is the session recorded for the order.
///
/// An order without a recorded session never matches: its session creation
/// failed, so no session can pay for it.
fn check_recorded_session(recorded: Option<&str>, session_id: &str) -> Result<(), CheckoutError> {
    match recorded {
        Some(recorded) if recorded == session_id => Ok(()),
        _ => Err(CheckoutError::SessionMismatch),
    }
}

/// Accept a retrieved session only if it was opened for `order_id`.
fn check_session_reference(
    order_id: OrderId,
    session: &CheckoutSession,
) -> Result<(), CheckoutError> {
    match session.client_reference_id.as_deref() {
        Some(reference) if reference != order_id.to_string() => {
            Err(CheckoutError::SessionMismatch)
        }
        _ => Ok(()),
    }
}

/// Coordinates the database and the payment processor for one request.
pub struct CheckoutService<'a> {
    users: UserRepository<'a>,
    orders: OrderRepository<'a>,
    stripe: &'a StripeClient,
    payments: &'a PaymentsConfig,
    frontend_url: &'a Url,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        stripe: &'a StripeClient,
        payments: &'a PaymentsConfig,
        frontend_url: &'a Url,
    ) -> Self {
        Self {
            users: UserRepository::new(pool),
            orders: OrderRepository::new(pool),
            stripe,
            payments,
            frontend_url,
        }
    }

    /// Place an order and open a checkout session for it.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation`/`MissingAddress` for bad input,
    /// `UserNotFound` for an unknown user, and `Repository`/`Payment` when a
    /// remote call fails. A payment failure leaves the pending order behind.
    #[instrument(skip(self, items, address), fields(items = items.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        items: &[OrderItem],
        address: &serde_json::Value,
    ) -> Result<PlacedOrder, CheckoutError> {
        let totals = OrderTotals::compute(items, self.payments.delivery_fee)?;
        if !address.is_object() {
            return Err(CheckoutError::MissingAddress);
        }
        // Validate prices against the processor before anything is written.
        let lines = checkout_lines(items, totals.delivery_fee)?;

        if self.users.get_by_id(user_id).await?.is_none() {
            return Err(CheckoutError::UserNotFound);
        }

        let order = self
            .orders
            .create(NewOrder {
                user_id,
                items,
                amount: totals.amount,
                address,
            })
            .await?;

        self.users.clear_cart(user_id).await?;

        let request = CheckoutRequest {
            order_id: order.id,
            currency: self.payments.currency.clone(),
            lines,
            success_url: success_url(self.frontend_url, order.id),
            cancel_url: cancel_url(self.frontend_url, order.id),
        };

        let session = self
            .stripe
            .create_checkout_session(&request)
            .await
            .inspect_err(|e| {
                warn!(order_id = %order.id, error = %e, "Checkout session creation failed; order left pending");
            })?;

        self.orders.set_payment_id(order.id, &session.id).await?;

        info!(
            order_id = %order.id,
            session_id = %session.id,
            amount = %totals.amount,
            "Order placed"
        );

        Ok(PlacedOrder {
            order_id: order.id,
            amount: totals.amount,
            session_id: session.id,
            session_url: session.url,
        })
    }

    /// Reconcile an order with its checkout session.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` for an unknown order, `SessionMismatch` when the
    /// session id is not the one recorded at placement (or none was), and
    /// `Repository`/`Payment` when a remote call fails.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let order = self
            .orders
            .get_by_id(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        check_recorded_session(order.payment_id.as_deref(), session_id).inspect_err(|_| {
            warn!(order_id = %order_id, "Verification with a session not recorded for the order");
        })?;

        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        check_session_reference(order_id, &session)?;

        let outcome = if session.payment_status.confirms_order() {
            self.orders
                .record_payment(order_id, true, OrderStatus::Confirmed)
                .await?;
            PaymentOutcome::Confirmed
        } else {
            self.orders
                .record_payment(order_id, false, OrderStatus::Cancelled)
                .await?;
            PaymentOutcome::Cancelled
        };

        info!(
            order_id = %order_id,
            payment_status = ?session.payment_status,
            outcome = ?outcome,
            "Payment reconciled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn frontend() -> Url {
        Url::parse("https://quickbite.app/").unwrap()
    }

    #[test]
    fn test_success_url_keeps_session_placeholder() {
        let url = success_url(&frontend(), OrderId::new(31));
        assert_eq!(
            url,
            "https://quickbite.app/verify?session_id={CHECKOUT_SESSION_ID}&orderId=31"
        );
    }

    #[test]
    fn test_cancel_url() {
        let url = cancel_url(&frontend(), OrderId::new(31));
        assert_eq!(url, "https://quickbite.app/verify?cancel=true&orderId=31");
    }

    #[test]
    fn test_checkout_lines_append_delivery() {
        let items = vec![
            OrderItem::new("Masala Dosa", Decimal::from_str("89.90").unwrap(), 2),
            OrderItem::new("", Decimal::from(20), 1),
        ];

        let lines = checkout_lines(&items, Decimal::from(30)).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].unit_amount, 8990);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].name, "Item");
        assert_eq!(lines[2].name, DELIVERY_LINE_NAME);
        assert_eq!(lines[2].unit_amount, 3000);
        assert_eq!(lines[2].quantity, 1);
    }

    #[test]
    fn test_charged_total_matches_order_amount() {
        let items = vec![
            OrderItem::new("Masala Dosa", Decimal::from_str("89.95").unwrap(), 3),
            OrderItem::new("Filter Coffee", Decimal::from_str("24.5").unwrap(), 2),
            OrderItem::new("Gulab Jamun", Decimal::from_str("0.05").unwrap(), 7),
        ];
        let fee = Decimal::from_str("29.99").unwrap();

        let totals = OrderTotals::compute(&items, fee).unwrap();
        let charged: i64 = checkout_lines(&items, fee)
            .unwrap()
            .iter()
            .map(|line| line.unit_amount * i64::from(line.quantity))
            .sum();
        assert_eq!(to_minor_units(totals.amount).unwrap(), charged);
    }

    #[test]
    fn test_recorded_session_must_match() {
        assert!(check_recorded_session(Some("cs_test_a"), "cs_test_a").is_ok());
        assert!(matches!(
            check_recorded_session(Some("cs_test_a"), "cs_test_b"),
            Err(CheckoutError::SessionMismatch)
        ));
    }

    #[test]
    fn test_order_without_session_never_matches() {
        assert!(matches!(
            check_recorded_session(None, "cs_test_paid_elsewhere"),
            Err(CheckoutError::SessionMismatch)
        ));
    }

    #[test]
    fn test_session_reference_must_name_order() {
        let session = |reference: Option<&str>| CheckoutSession {
            id: "cs_test_a".to_owned(),
            url: None,
            payment_status: quickbite_core::PaymentStatus::Paid,
            status: Some("complete".to_owned()),
            client_reference_id: reference.map(str::to_owned),
        };

        assert!(check_session_reference(OrderId::new(8), &session(Some("8"))).is_ok());
        assert!(check_session_reference(OrderId::new(8), &session(None)).is_ok());
        assert!(matches!(
            check_session_reference(OrderId::new(8), &session(Some("9"))),
            Err(CheckoutError::SessionMismatch)
        ));
    }

    #[test]
    fn test_checkout_lines_reject_negative_price() {
        let items = vec![OrderItem::new("Broken", Decimal::from(-3), 1)];
        assert!(checkout_lines(&items, Decimal::ZERO).is_err());
    }
}
