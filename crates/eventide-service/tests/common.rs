//! Common test utilities for eventide integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use eventide_core::UserId;
use eventide_service::crypto::hmac_sha256_hex;
use eventide_service::{create_router, AppState, ServiceConfig};
use eventide_store::RocksStore;

/// Signing secret used by webhook tests.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Direct store handle for seeding state.
    pub store: Arc<RocksStore>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after tweaking the config (webhook secret, mock
    /// upstream URLs).
    pub fn with_config(configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_base_url: "http://localhost".into(),
            ..ServiceConfig::default()
        };
        configure(&mut config);

        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            store,
            test_user_id,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a valid `stripe-signature` header for a body, stamped now.
pub fn sign_webhook(secret: &str, body: &str) -> String {
    sign_webhook_at(secret, body, chrono::Utc::now().timestamp())
}

/// Build a `stripe-signature` header with an explicit timestamp.
pub fn sign_webhook_at(secret: &str, body: &str, timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret, &format!("{timestamp}.{body}"));
    format!("t={timestamp},v1={signature}")
}
