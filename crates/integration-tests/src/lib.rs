//! Integration test harness for QuickBite.
//!
//! # Running Tests
//!
//! ```bash
//! # Pure tests (no services needed)
//! cargo test -p quickbite-integration-tests
//!
//! # Database-backed flow tests
//! TEST_DATABASE_URL=postgres://localhost/quickbite_test \
//!     cargo test -p quickbite-integration-tests -- --ignored
//! ```
//!
//! [`TestContext::start`] migrates the test database, starts a local stand-in
//! for Stripe's checkout session endpoints, and serves the API on an
//! ephemeral port.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Duration;
use quickbite_api::config::{ApiConfig, AuthConfig, PaymentsConfig};
use quickbite_api::db::{UserRepository, run_migrations};
use quickbite_api::services::auth::TokenVerifier;
use quickbite_api::state::AppState;
use quickbite_core::UserId;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use url::Url;

/// Signing secret shared by the test server and [`TestContext::token_for`].
pub const TEST_JWT_SECRET: &str = "t7#Gm2$wQ9!xB4@kN6&zR1*pL8^vD3%j";

/// Operator token accepted by the test server.
pub const TEST_ADMIN_TOKEN: &str = "adm-Q4!r8Z#m2Xp7";

/// A checkout session held by [`MockStripe`].
#[derive(Debug, Clone)]
pub struct MockSession {
    pub id: String,
    pub payment_status: String,
    /// Form parameters the session was created with.
    pub form: Vec<(String, String)>,
}

/// In-process stand-in for Stripe's checkout session API.
#[derive(Debug, Clone, Default)]
pub struct MockStripe {
    sessions: Arc<Mutex<HashMap<String, MockSession>>>,
    reject_creates: Arc<AtomicBool>,
}

impl MockStripe {
    /// Make session creation fail (or succeed again).
    pub fn reject_session_creation(&self, reject: bool) {
        self.reject_creates.store(reject, Ordering::SeqCst);
    }

    /// Mark a session as paid.
    pub fn mark_paid(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.payment_status = "paid".to_string();
        }
    }

    /// Look up a session.
    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<MockSession> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/v1/checkout/sessions", post(create_session))
            .route("/v1/checkout/sessions/{id}", get(retrieve_session))
            .with_state(self.clone())
    }
}

fn session_json(session: &MockSession) -> Value {
    json!({
        "id": session.id,
        "object": "checkout.session",
        "url": format!("https://checkout.stripe.test/pay/{}", session.id),
        "payment_status": session.payment_status,
        "status": if session.payment_status == "paid" { "complete" } else { "open" },
        "client_reference_id": session
            .form
            .iter()
            .find(|(k, _)| k == "client_reference_id")
            .map(|(_, v)| v.clone()),
    })
}

async fn create_session(
    State(mock): State<MockStripe>,
    Form(form): Form<Vec<(String, String)>>,
) -> (StatusCode, Json<Value>) {
    if mock.reject_creates.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "message": "This value must be less than or equal to 99999999." } })),
        );
    }

    let id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
    let session = MockSession {
        id: id.clone(),
        payment_status: "unpaid".to_string(),
        form,
    };
    let body = session_json(&session);
    mock.sessions.lock().unwrap().insert(id, session);
    (StatusCode::OK, Json(body))
}

async fn retrieve_session(
    State(mock): State<MockStripe>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match mock.session(&id) {
        Some(session) => (StatusCode::OK, Json(session_json(&session))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": format!("No such checkout.session: '{id}'") } })),
        ),
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// A running API backed by the test database and [`MockStripe`].
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub pool: PgPool,
    pub stripe: MockStripe,
    tokens: TokenVerifier,
}

impl TestContext {
    /// Migrate the test database and start the API and Stripe stand-in.
    pub async fn start() -> Self {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("QUICKBITE_DATABASE_URL"))
            .expect("TEST_DATABASE_URL must be set for database-backed tests");

        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let stripe = MockStripe::default();
        let stripe_addr = serve(stripe.router()).await;

        let config = ApiConfig {
            database_url: SecretString::from(database_url),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            frontend_url: Url::parse("http://localhost:5173").unwrap(),
            auth: AuthConfig {
                jwt_secret: SecretString::from(TEST_JWT_SECRET),
                admin_token: Some(SecretString::from(TEST_ADMIN_TOKEN)),
            },
            payments: PaymentsConfig {
                stripe_secret_key: SecretString::from("sk_test_51QbT2mLocalStandIn"),
                stripe_api_base: Url::parse(&format!("http://{stripe_addr}")).unwrap(),
                currency: "inr".to_string(),
                delivery_fee: Decimal::from(30),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let state = AppState::new(config, pool.clone()).expect("Failed to build app state");
        let api_addr = serve(quickbite_api::app(state)).await;

        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{api_addr}"),
            pool,
            stripe,
            tokens: TokenVerifier::new(SecretString::from(TEST_JWT_SECRET)),
        }
    }

    /// Full URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Insert a customer with a unique email.
    pub async fn create_user(&self, name: &str) -> UserId {
        let email = format!("{}@quickbite.test", uuid::Uuid::new_v4().simple());
        UserRepository::new(&self.pool)
            .create(name, &email)
            .await
            .expect("Failed to create test user")
            .id
    }

    /// Bearer header value for `user_id`.
    #[must_use]
    pub fn token_for(&self, user_id: UserId) -> String {
        let token = self
            .tokens
            .issue(user_id, Duration::hours(1))
            .expect("Failed to sign test token");
        format!("Bearer {token}")
    }

    /// POST a JSON body as `user_id`.
    pub async fn post_as(&self, user_id: UserId, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .header("authorization", self.token_for(user_id))
            .json(body)
            .send()
            .await
            .expect("Request failed");
        read(response).await
    }

    /// POST a JSON body with no credentials.
    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed");
        read(response).await
    }

    /// Call an admin route.
    pub async fn admin(&self, method: reqwest::Method, path: &str, body: Option<&Value>) -> (StatusCode, Value) {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("x-admin-token", TEST_ADMIN_TOKEN);
        if let Some(body) = body {
            request = request.json(body);
        }
        read(request.send().await.expect("Request failed")).await
    }
}

async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}
