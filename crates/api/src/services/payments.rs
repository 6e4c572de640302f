//! Stripe Checkout client.
//!
//! Only the two calls the order flow needs are implemented: creating a hosted
//! checkout session and retrieving it again after the customer is redirected
//! back. Stripe's API takes form-encoded bodies with bracketed keys for
//! nested values (`line_items[0][price_data][currency]=inr`).

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use quickbite_core::{OrderId, PaymentStatus};

use crate::config::PaymentsConfig;

/// Placeholder Stripe substitutes with the session id in redirect URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// One line on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    /// Product name shown to the customer.
    pub name: String,
    /// Unit price in minor units.
    pub unit_amount: i64,
    /// Number of units.
    pub quantity: u32,
}

/// Parameters for a new checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Order the session pays for.
    pub order_id: OrderId,
    /// Lowercase ISO currency code.
    pub currency: String,
    /// Lines to charge.
    pub lines: Vec<CheckoutLine>,
    /// Where Stripe sends the customer after paying.
    pub success_url: String,
    /// Where Stripe sends the customer after cancelling.
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Encode as Stripe form parameters.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_owned(), "payment".to_owned()),
            ("payment_method_types[0]".to_owned(), "card".to_owned()),
            ("success_url".to_owned(), self.success_url.clone()),
            ("cancel_url".to_owned(), self.cancel_url.clone()),
            ("client_reference_id".to_owned(), self.order_id.to_string()),
            ("metadata[order_id]".to_owned(), self.order_id.to_string()),
        ];

        for (i, line) in self.lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }

        form
    }
}

/// The parts of a Stripe checkout session this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session id (`cs_...`).
    pub id: String,
    /// Hosted checkout page; absent once the session is complete or expired.
    #[serde(default)]
    pub url: Option<String>,
    /// Whether the session has been paid.
    pub payment_status: PaymentStatus,
    /// `open`, `complete`, or `expired`.
    #[serde(default)]
    pub status: Option<String>,
    /// Order id the session was opened for.
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: Url,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.stripe_secret_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::InvalidRequest(format!("Invalid API key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        // Endpoints are joined as relative paths, so the base must end in `/`
        // for a path prefix (e.g. a proxy at `/stripe`) to survive.
        let mut base_url = config.stripe_api_base.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| PaymentError::InvalidRequest(e.to_string()))
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, lines = request.lines.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = self.endpoint("v1/checkout/sessions")?;
        let response = self.client.post(url).form(&request.to_form()).send().await?;
        let session: CheckoutSession = parse_response(response).await?;

        debug!(session_id = %session.id, "Created checkout session");
        Ok(session)
    }

    /// Retrieve a checkout session by id.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the session does not exist.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PaymentError::InvalidRequest(
                "session id contains unexpected characters".to_owned(),
            ));
        }

        let url = self.endpoint(&format!("v1/checkout/sessions/{session_id}"))?;
        let response = self.client.get(url).send().await?;
        parse_response(response).await
    }
}

/// Turn a Stripe response into `T`, or an `Api` error carrying Stripe's message.
async fn parse_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or(body);
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            order_id: OrderId::new(12),
            currency: "inr".to_owned(),
            lines: vec![
                CheckoutLine {
                    name: "Butter Chicken".to_owned(),
                    unit_amount: 25000,
                    quantity: 2,
                },
                CheckoutLine {
                    name: "Delivery Charges".to_owned(),
                    unit_amount: 3000,
                    quantity: 1,
                },
            ],
            success_url: "http://localhost:5173/verify?session_id={CHECKOUT_SESSION_ID}&orderId=12"
                .to_owned(),
            cancel_url: "http://localhost:5173/verify?cancel=true&orderId=12".to_owned(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_has_session_parameters() {
        let form = request().to_form();
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "payment_method_types[0]"), Some("card"));
        assert_eq!(value(&form, "client_reference_id"), Some("12"));
        assert_eq!(value(&form, "metadata[order_id]"), Some("12"));
        assert!(value(&form, "success_url").unwrap().contains(SESSION_ID_PLACEHOLDER));
    }

    #[test]
    fn test_form_encodes_line_items_by_index() {
        let form = request().to_form();
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("inr"));
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][name]"),
            Some("Butter Chicken")
        );
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("25000"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            value(&form, "line_items[1][price_data][product_data][name]"),
            Some("Delivery Charges")
        );
        assert_eq!(value(&form, "line_items[1][quantity]"), Some("1"));
        assert!(value(&form, "line_items[2][quantity]").is_none());
    }

    #[test]
    fn test_session_deserializes_stripe_payload() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_a1b2",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_a1b2",
            "payment_status": "unpaid",
            "status": "open",
            "client_reference_id": "12"
        }))
        .unwrap();

        assert_eq!(session.id, "cs_test_a1b2");
        assert_eq!(session.client_reference_id.as_deref(), Some("12"));
        assert_eq!(session.payment_status, PaymentStatus::Unpaid);
        assert!(session.url.is_some());
    }

    #[test]
    fn test_client_joins_endpoint_onto_base() {
        let config = crate::config::tests::test_config();
        let client = StripeClient::new(&config.payments).unwrap();
        let url = client.endpoint("v1/checkout/sessions/cs_test_1").unwrap();
        assert_eq!(url.as_str(), "https://api.stripe.com/v1/checkout/sessions/cs_test_1");
    }

    #[test]
    fn test_client_keeps_base_path_prefix() {
        let mut config = crate::config::tests::test_config();
        config.payments.stripe_api_base = Url::parse("https://gateway.internal/stripe").unwrap();
        let client = StripeClient::new(&config.payments).unwrap();
        let url = client.endpoint("v1/checkout/sessions").unwrap();
        assert_eq!(url.as_str(), "https://gateway.internal/stripe/v1/checkout/sessions");
    }

    #[tokio::test]
    async fn test_retrieve_rejects_path_characters() {
        let config = crate::config::tests::test_config();
        let client = StripeClient::new(&config.payments).unwrap();
        let err = client
            .retrieve_checkout_session("../v1/customers")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }
}
