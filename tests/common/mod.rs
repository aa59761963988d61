use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use sequencer::config::Config;
use sequencer::engine::EngineOptions;
use sequencer::gateway::{DeliveryGateway, GatewayError, SendRequest};
use sequencer::models::RecipientRef;
use sequencer::state::AppState;

pub const TEST_TOKEN_SECRET: &str = "test-token-secret";

/// A dedicated scratch database for one test.
pub struct TestDb {
    pub pool: PgPool,
    pub db_name: String,
}

/// Create a fresh database and run migrations. Returns None (and the
/// test is skipped) when DATABASE_URL is not set.
pub async fn try_spawn_db() -> Option<TestDb> {
    let _ = dotenvy::dotenv();

    let Ok(base_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database-backed test");
        return None;
    };

    let db_name = format!(
        "sequencer_test_{}",
        Uuid::now_v7().to_string().replace('-', "")
    );

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    Some(TestDb { pool, db_name })
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to a random port
        base_url: "http://localhost:0".to_string(),
        log_level: "warn".to_string(),
        batch_size: 50,
        stale_lock_minutes: 10,
        max_retries: 3,
        tick_seconds: 0,
        token_secret: TEST_TOKEN_SECRET.to_string(),
        smtp: None,
    }
}

pub fn test_opts() -> EngineOptions {
    EngineOptions {
        batch_size: 50,
        stale_lock: Duration::minutes(10),
        max_retries: 3,
        token_secret: TEST_TOKEN_SECRET.to_string(),
    }
}

impl TestDb {
    pub async fn create_sequence(&self, organization_id: Uuid, audience: &str) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO sequences (organization_id, name, audience)
             VALUES ($1, 'Test sequence', $2) RETURNING id",
        )
        .bind(organization_id)
        .bind(audience)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to create sequence")
    }

    pub async fn create_step(
        &self,
        sequence_id: Uuid,
        step_number: i32,
        delay_days: i32,
        template_key: &str,
        is_active: bool,
    ) {
        sqlx::query(
            "INSERT INTO sequence_steps (sequence_id, step_number, delay_days, template_key, is_active)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(sequence_id)
        .bind(step_number)
        .bind(delay_days)
        .bind(template_key)
        .bind(is_active)
        .execute(&self.pool)
        .await
        .expect("Failed to create step");
    }

    pub async fn create_template(&self, key: &str) {
        sqlx::query(
            "INSERT INTO email_templates (key, subject, body_html)
             VALUES ($1, 'Hi {{name}}', '<p>About {{property_address}}</p>')
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .execute(&self.pool)
        .await
        .expect("Failed to create template");
    }

    pub async fn create_seller(&self, organization_id: Uuid, email: &str, unsubscribed: bool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO seller_profiles (organization_id, email, name, property_address, bedrooms, email_unsubscribed)
             VALUES ($1, $2, 'Sam Seller', '12 High Street', 3, $3) RETURNING id",
        )
        .bind(organization_id)
        .bind(email)
        .bind(unsubscribed)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to create seller")
    }

    pub async fn create_buyer(&self, organization_id: Uuid, email: &str, unsubscribed: bool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO buyer_profiles (organization_id, email, name, budget, email_unsubscribed)
             VALUES ($1, $2, 'Bella Buyer', '500k-600k', $3) RETURNING id",
        )
        .bind(organization_id)
        .bind(email)
        .bind(unsubscribed)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to create buyer")
    }

    pub async fn enqueue(
        &self,
        recipient: RecipientRef,
        sequence_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Uuid {
        sequencer::db::queue::enqueue(&self.pool, recipient, sequence_id, scheduled_for)
            .await
            .expect("Failed to enqueue")
            .id
    }

    /// A one-step sequence with its template, plus a due queue item for a
    /// fresh seller. Returns (sequence_id, seller_id, item_id).
    pub async fn seed_seller_item(&self, due_at: DateTime<Utc>) -> (Uuid, Uuid, Uuid) {
        let org = Uuid::now_v7();
        let sequence_id = self.create_sequence(org, "seller").await;
        self.create_template("seller-intro").await;
        self.create_step(sequence_id, 1, 0, "seller-intro", true).await;
        let seller_id = self.create_seller(org, "seller@example.com", false).await;
        let item_id = self
            .enqueue(RecipientRef::Seller(seller_id), sequence_id, due_at)
            .await;
        (sequence_id, seller_id, item_id)
    }
}

/// Drop the test database after a test completes.
pub async fn cleanup(db: TestDb) {
    let db_name = db.db_name.clone();
    db.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    if let Ok(admin_pool) = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
    {
        let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
            .execute(&admin_pool)
            .await;
        admin_pool.close().await;
    }
}

/// Scripted delivery gateway: pops one outcome per send, then falls back
/// to the default. Records every request for assertions.
pub struct MockGateway {
    calls: Mutex<Vec<SendRequest>>,
    outcomes: Mutex<VecDeque<Result<(), String>>>,
    default: Result<(), String>,
}

impl MockGateway {
    pub fn always_ok() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
            default: Ok(()),
        }
    }

    pub fn always_fail(message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
            default: Err(message.to_string()),
        }
    }

    pub fn with_outcomes(outcomes: Vec<Result<(), String>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(outcomes.into()),
            default: Ok(()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<SendRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryGateway for MockGateway {
    async fn send(&self, request: &SendRequest) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(request.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        outcome.map_err(GatewayError::from)
    }
}

/// Spawn the HTTP app on a random port with the given gateway.
pub async fn spawn_app(
    db: &TestDb,
    gateway: Option<Arc<dyn DeliveryGateway>>,
) -> (SocketAddr, reqwest::Client) {
    let config = test_config("unused://for-tests");
    let state = Arc::new(AppState {
        pool: db.pool.clone(),
        config,
        gateway,
    });

    let app = sequencer::build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = reqwest::Client::new();
    (addr, client)
}
