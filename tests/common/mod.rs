//! Test utilities and fixtures for boxoffice integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use rusqlite::Connection;
use serde_json::Value;

pub use boxoffice::db::{create_pool, init_db, queries, AppState, DbPool};
pub use boxoffice::error::AppError;
pub use boxoffice::handlers;
pub use boxoffice::handlers::payments::reconcile::{finalize_payment, Finalized, Transition};
pub use boxoffice::models::*;
pub use boxoffice::payments::{ChargeStatus, CheckoutSession, GatewayCharge, PaymentGateway};
pub use boxoffice::scan::ScanKey;

/// Create a test scan key (deterministic for testing)
pub fn test_scan_key() -> ScanKey {
    ScanKey::from_bytes(&[0u8; 32])
}

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a pool over a fresh temp-file database so multiple connections see
/// the same data (needed for concurrency tests; `::memory()` pools give every
/// connection its own database).
pub fn create_test_pool() -> DbPool {
    let path: PathBuf = std::env::temp_dir().join(format!(
        "boxoffice-test-{}.db",
        uuid::Uuid::new_v4().as_simple()
    ));
    let pool = create_pool(path.to_str().unwrap()).expect("Failed to create test pool");
    {
        let conn = pool.get().unwrap();
        init_db(&conn).expect("Failed to initialize schema");
    }
    pool
}

/// Payment gateway double with programmable charge states.
pub struct MockGateway {
    charges: Mutex<HashMap<String, GatewayCharge>>,
    accept_signatures: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            charges: Mutex::new(HashMap::new()),
            accept_signatures: true,
        }
    }

    pub fn rejecting_signatures() -> Self {
        Self {
            charges: Mutex::new(HashMap::new()),
            accept_signatures: false,
        }
    }

    /// Program what `verify` will report for a reference.
    pub fn set_charge(&self, charge: GatewayCharge) {
        self.charges
            .lock()
            .unwrap()
            .insert(charge.reference.clone(), charge);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize(
        &self,
        reference: &str,
        _email: &str,
        _amount_cents: i64,
        _callback_url: &str,
    ) -> boxoffice::error::Result<CheckoutSession> {
        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.test/{}", reference),
            access_code: "ac_test".to_string(),
            reference: reference.to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> boxoffice::error::Result<GatewayCharge> {
        // Mirrors the production adapter: a reference the gateway has never
        // seen is a BadRequest, not a NotFound
        self.charges
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::BadRequest("Charge not found at gateway".to_string()))
    }

    fn verify_webhook_signature(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> boxoffice::error::Result<bool> {
        Ok(self.accept_signatures)
    }
}

/// AppState over a temp-file pool and a mock gateway. The gateway handle is
/// returned so tests can program charge states after requests are issued.
pub fn create_test_app_state() -> (AppState, Arc<MockGateway>) {
    let gateway = Arc::new(MockGateway::new());
    let state = AppState {
        db: create_test_pool(),
        base_url: "http://localhost:3000".to_string(),
        gateway: gateway.clone(),
        scan_key: test_scan_key(),
        cache: Default::default(),
        notify_webhook_url: None,
    };
    (state, gateway)
}

/// Full application router (public + authed routes).
pub fn test_app(state: AppState) -> Router {
    handlers::public_router()
        .merge(handlers::authed_router(state.clone()))
        .with_state(state)
}

pub fn create_test_user(conn: &Connection, email: &str) -> (User, String) {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Test {}", email),
        },
    )
    .expect("Failed to create test user")
}

pub fn create_test_event(
    conn: &Connection,
    organizer_id: &str,
    price_cents: i64,
    capacity: i64,
) -> Event {
    queries::create_event(
        conn,
        organizer_id,
        &CreateEvent {
            title: "Test Event".to_string(),
            price_cents,
            capacity,
            reminder_offset_mins: None,
            starts_at: now() + 7 * 86400,
        },
    )
    .expect("Failed to create test event")
}

pub fn create_test_tier(
    conn: &Connection,
    event_id: &str,
    name: &str,
    price_cents: i64,
    capacity: i64,
) -> TicketType {
    queries::create_ticket_type(
        conn,
        event_id,
        &CreateTicketType {
            name: name.to_string(),
            price_cents,
            capacity,
            sort_order: 0,
        },
    )
    .expect("Failed to create test ticket type")
}

pub fn create_test_promo(
    conn: &Connection,
    creator_id: &str,
    code: &str,
    discount_type: DiscountType,
    discount_value: i64,
    max_uses: Option<i64>,
) -> PromoCode {
    queries::create_promo_code(
        conn,
        creator_id,
        &CreatePromoCode {
            code: code.to_string(),
            discount_type,
            discount_value,
            event_id: None,
            max_uses,
            expires_at: None,
        },
    )
    .expect("Failed to create test promo code")
}

/// Insert a PENDING payment, as the initialize endpoint would before handing
/// the buyer to the gateway.
pub fn create_pending_payment(
    conn: &Connection,
    buyer_id: &str,
    event_id: &str,
    ticket_type_id: Option<&str>,
    amount_cents: i64,
) -> Payment {
    queries::create_payment(
        conn,
        &CreatePayment {
            buyer_id: buyer_id.to_string(),
            event_id: event_id.to_string(),
            ticket_type_id: ticket_type_id.map(|s| s.to_string()),
            promo_code_id: None,
            amount_cents,
            discount_cents: 0,
            status: PaymentStatus::Pending,
            paid_at: None,
        },
    )
    .expect("Failed to create test payment")
}

pub fn success_charge(reference: &str, amount_cents: i64) -> GatewayCharge {
    GatewayCharge {
        reference: reference.to_string(),
        status: ChargeStatus::Success,
        amount_cents,
        paid_at: Some(now()),
    }
}

pub fn failed_charge(reference: &str, amount_cents: i64) -> GatewayCharge {
    GatewayCharge {
        reference: reference.to_string(),
        status: ChargeStatus::Failed,
        amount_cents,
        paid_at: None,
    }
}

pub fn pending_charge(reference: &str, amount_cents: i64) -> GatewayCharge {
    GatewayCharge {
        reference: reference.to_string(),
        status: ChargeStatus::Pending,
        amount_cents,
        paid_at: None,
    }
}

/// Get the current timestamp
pub fn now() -> i64 {
    queries::now()
}

/// Build a request, optionally with a Bearer API key and a JSON body.
pub fn request(
    method: &str,
    uri: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("authorization", format!("Bearer {}", key));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Response should be valid JSON")
}
