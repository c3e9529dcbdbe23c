//! Common test utilities for invoicing-service integration tests.

use axum::{
    body::Body,
    http::{header::HeaderMap, Method, Request, StatusCode},
    Router,
};
use invoicing_service::config::InvoiceDefaults;
use invoicing_service::services::{init_metrics, Database, InvoiceService, MockPdfRenderer};
use invoicing_service::{build_router, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use tower::util::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Router backed by the test database and a mock PDF renderer.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub db: Arc<Database>,
    pub pdf: Arc<MockPdfRenderer>,
    /// Invoice prefix unique to this app, so generated numbers start at 001.
    pub prefix: String,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn spawn() -> Self {
        init_tracing();
        init_metrics();

        let database_url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set to run database tests");

        let db = Database::new(&database_url, 2, 1)
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");
        let db = Arc::new(db);

        let prefix = format!("T{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase();
        let defaults = InvoiceDefaults {
            invoice_prefix: prefix.clone(),
            email_signature: "Accounts Team".to_string(),
            ..InvoiceDefaults::default()
        };

        let pdf = Arc::new(MockPdfRenderer::new());
        let invoices = InvoiceService::new(db.clone(), defaults, pdf.clone());
        let router = build_router(AppState { db: db.clone(), invoices }, &[]);

        Self {
            router,
            db,
            pdf,
            prefix,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");

        (status, headers, bytes.to_vec())
    }

    /// Send a request and decode the JSON response. Empty bodies decode to `null`.
    pub async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, bytes) = self.send(method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response is not JSON")
        };
        (status, value)
    }

    pub async fn create_company(&self, name: &str) -> Value {
        let (status, company) = self
            .json(
                Method::POST,
                "/companies",
                Some(json!({
                    "name": name,
                    "email": "billing@helios.example",
                    "phone": "+254700000000",
                    "website": "https://helios.example",
                    "address": "1 Ngong Road, Nairobi",
                    "pin_number": "P051234567X",
                    "vat_registered": true,
                    "employee_count": 12
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create company: {}", company);
        company
    }

    pub async fn create_client(&self, company_id: &str, name: &str) -> Value {
        let (status, client) = self
            .json(
                Method::POST,
                "/clients",
                Some(json!({
                    "name": name,
                    "email": "jane@example.com",
                    "phone": "+254700000001",
                    "company_id": company_id
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create client: {}", client);
        client
    }

    /// Company and client to bill, returned as `(company_id, client_id)`.
    pub async fn parties(&self) -> (String, String) {
        let company = self.create_company("Helios & Co").await;
        let company_id = id_of(&company);
        let client = self.create_client(&company_id, "Jane Doe").await;
        (company_id, id_of(&client))
    }

    pub async fn create_invoice(&self, body: Value) -> Value {
        let (status, invoice) = self.json(Method::POST, "/invoices", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create invoice: {}", invoice);
        invoice
    }
}

/// Draft with one discounted line, a fixed invoice discount and 16% VAT.
pub fn invoice_body(company_id: &str, client_id: &str) -> Value {
    json!({
        "client_id": client_id,
        "company_id": company_id,
        "issue_date": "2024-03-01",
        "due_date": "2024-03-31",
        "discount": {"kind": "fixed", "value": "20"},
        "tax_rate": "16",
        "notes": "Thank you for your business",
        "line_items": [
            {
                "description": "Design work",
                "quantity": "1",
                "rate": "100",
                "discount": {"kind": "percentage", "value": "10"}
            }
        ]
    })
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}

pub fn amount(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal")
}
