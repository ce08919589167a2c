//! Shared fixtures: in-process collaborators and a local content server

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use cognify::billing::{BillingProvider, CheckoutSessionRequest, SubscriptionInfo};
use cognify::{
    AppState, AuthUser, Authenticator, Config, Definition, Error, FlashcardDraft, QuizQuestion,
    Result, StudyGenerator, StudyStore, SummaryContent,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ALICE: &str = "alice-token";
pub const BOB: &str = "bob-token";

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts a fixed set of tokens
pub struct StaticAuth {
    users: HashMap<String, AuthUser>,
}

impl StaticAuth {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(
            ALICE.to_string(),
            AuthUser {
                id: "user-alice".to_string(),
                email: Some("alice@example.com".to_string()),
            },
        );
        users.insert(
            BOB.to_string(),
            AuthUser {
                id: "user-bob".to_string(),
                email: Some("bob@example.com".to_string()),
            },
        );
        Self { users }
    }
}

#[async_trait]
impl Authenticator for StaticAuth {
    async fn authenticate(&self, token: &str) -> Result<Option<AuthUser>> {
        Ok(self.users.get(token).cloned())
    }
}

/// Deterministic generator. Produces two valid questions and one malformed.
#[derive(Default)]
pub struct MockGenerator {
    pub fail_summary: AtomicBool,
    pub fail_narration: AtomicBool,
}

impl MockGenerator {
    pub fn question(text: &str, answer: usize) -> QuizQuestion {
        QuizQuestion {
            id: String::new(),
            question: text.to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: answer,
            explanation: Some("Because.".to_string()),
        }
    }
}

#[async_trait]
impl StudyGenerator for MockGenerator {
    async fn summarize(&self, _text: &str) -> Result<SummaryContent> {
        if self.fail_summary.load(Ordering::SeqCst) {
            return Err(Error::generation("model unavailable"));
        }
        Ok(SummaryContent {
            tldr: "Ownership keeps memory safe".to_string(),
            key_concepts: vec!["ownership".into(), "borrowing".into()],
            definitions: vec![Definition {
                term: "borrow".into(),
                definition: "a reference that does not own".into(),
            }],
            bullet_summary: vec!["Values have one owner".into()],
        })
    }

    async fn quiz(&self, _text: &str, _tldr: &str) -> Result<Vec<QuizQuestion>> {
        let mut broken = Self::question("Broken?", 7);
        broken.options.truncate(2);
        Ok(vec![
            Self::question("Who owns a value?", 0),
            Self::question("What does a borrow do?", 2),
            broken,
        ])
    }

    async fn flashcards(
        &self,
        _text: &str,
        definitions: &[Definition],
        key_concepts: &[String],
    ) -> Result<Vec<FlashcardDraft>> {
        let mut cards: Vec<FlashcardDraft> = definitions
            .iter()
            .map(|d| FlashcardDraft {
                front: d.term.clone(),
                back: d.definition.clone(),
            })
            .collect();
        cards.extend(key_concepts.iter().take(1).map(|c| FlashcardDraft {
            front: format!("What is {}?", c),
            back: format!("{} explained", c),
        }));
        Ok(cards)
    }

    async fn narrate(&self, _script: &str) -> Result<Vec<u8>> {
        if self.fail_narration.load(Ordering::SeqCst) {
            return Err(Error::generation("tts unavailable"));
        }
        Ok(b"ID3-fake-mp3".to_vec())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Records calls and returns canned Stripe answers
pub struct MockBilling {
    pub calls: Mutex<Vec<String>>,
    pub subscription_status: Mutex<String>,
}

pub const PERIOD_END: i64 = 1_900_000_000;

impl MockBilling {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            subscription_status: Mutex::new("active".to_string()),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillingProvider for MockBilling {
    async fn create_customer(
        &self,
        user_id: &str,
        _email: Option<&str>,
        _name: Option<&str>,
    ) -> Result<String> {
        self.record(format!("create_customer:{}", user_id));
        Ok(format!("cus_{}", user_id))
    }

    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<String> {
        self.record(format!(
            "checkout:{}:{}:{}",
            request.customer_id,
            request.price_id,
            request.period.as_str()
        ));
        Ok("https://checkout.stripe.test/session".to_string())
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        self.record(format!("portal:{}:{}", customer_id, return_url));
        Ok("https://billing.stripe.test/portal".to_string())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo> {
        self.record(format!("retrieve:{}", subscription_id));
        Ok(SubscriptionInfo {
            id: subscription_id.to_string(),
            status: self.subscription_status.lock().unwrap().clone(),
            current_period_end: Some(PERIOD_END),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub generator: Arc<MockGenerator>,
    pub billing: Arc<MockBilling>,
    // Keeps the data directory alive
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.data_dir = dir.path().to_string_lossy().into_owned();
    config.server.app_url = "http://app.test".to_string();
    config.server.public_base_url = "http://api.test".to_string();
    config.stripe.test.webhook_secret = WEBHOOK_SECRET.to_string();
    config.stripe.test.price_monthly = "price_monthly".to_string();
    config.stripe.test.price_yearly = "price_yearly".to_string();
    config.stripe.test.price_lifetime = "price_lifetime".to_string();
    config
}

pub fn test_app() -> TestApp {
    build_app(true)
}

/// App without a billing provider, as when no Stripe key is configured
pub fn test_app_without_billing() -> TestApp {
    build_app(false)
}

fn build_app(with_billing: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(&dir);
    let store = StudyStore::open(config.database_path()).expect("Failed to open store");

    let generator = Arc::new(MockGenerator::default());
    let billing = Arc::new(MockBilling::new());
    let provider = with_billing.then(|| billing.clone() as Arc<dyn BillingProvider>);
    let state = Arc::new(
        AppState::new(
            config,
            store,
            generator.clone(),
            Arc::new(StaticAuth::new()),
            provider,
        )
        .expect("Failed to build state"),
    );
    let router = cognify::create_router(Arc::clone(&state));

    TestApp {
        state,
        router,
        generator,
        billing,
        dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", path, token, body).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Run SQL against the app's database through a second connection
    pub fn execute_sql(&self, sql: &str) {
        let conn = rusqlite::Connection::open(self.state.config.database_path())
            .expect("Failed to open database");
        conn.execute_batch(sql).expect("Failed to run SQL");
    }
}

/// A `multipart/form-data` body with one file field
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "cognify-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

/// A small valid PDF with one Helvetica text line per page
pub fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_at = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    pdf
}

// ─────────────────────────────────────────────────────────────────────────────
// Content server
// ─────────────────────────────────────────────────────────────────────────────

pub fn article_html() -> String {
    let paragraphs: String = (0..5)
        .map(|n| {
            format!(
                "<p>Paragraph {} explains ownership, borrowing, and lifetimes in enough detail to count as real content for the reader.</p>",
                n
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Understanding Ownership</title></head>
        <body><nav><a href="/">Home</a></nav><article>{}</article></body></html>"#,
        paragraphs
    )
}

/// Serve fixture pages on an ephemeral port; returns the base URL
pub async fn spawn_content_server() -> String {
    let app = Router::new()
        .route("/articles/ownership", get(|| async { Html(article_html()) }))
        .route(
            "/files/broken.pdf",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    b"%PDF-1.4 this is not really a pdf".to_vec(),
                )
                    .into_response()
            }),
        )
        .route(
            "/files/huge.pdf",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    vec![0u8; 6 * 1024 * 1024],
                )
                    .into_response()
            }),
        )
        .route(
            "/data.json",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{}").into_response() }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind content server");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}
