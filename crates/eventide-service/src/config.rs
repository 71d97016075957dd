//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/eventide").
    pub data_dir: String,

    /// JWT validation base URL for the identity provider.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "eventide").
    pub auth_audience: String,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe price for the premium subscription (optional).
    pub stripe_price_id: Option<String>,

    /// Stripe API base URL override (for testing against a mock).
    pub stripe_api_url: Option<String>,

    /// Grok API key for generative insights (optional).
    pub grok_api_key: Option<String>,

    /// Grok API base URL override (for testing against a mock).
    pub grok_api_url: Option<String>,

    /// Grok model used for insights.
    pub grok_model: String,

    /// Frontend URL for checkout/portal redirects.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    price_id: Option<String>,
}

/// Grok secrets file structure.
#[derive(Debug, Deserialize)]
struct GrokSecrets {
    api_key: String,
    #[serde(default)]
    model: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load secrets from files first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret, stripe_price_id) = load_stripe_secrets();
        let (grok_api_key, grok_model) = load_grok_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/eventide".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "https://auth.eventide.app".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "eventide".into()),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_price_id,
            stripe_api_url: std::env::var("STRIPE_API_URL").ok(),
            grok_api_key,
            grok_api_url: std::env::var("GROK_API_URL").ok(),
            grok_model: grok_model
                .or_else(|| std::env::var("GROK_MODEL").ok())
                .unwrap_or_else(|| "grok-2-1212".into()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "eventide/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (
                Some(secrets.api_key),
                secrets.webhook_secret,
                secrets.price_id,
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
        std::env::var("STRIPE_PRICE_ID").ok(),
    )
}

/// Load Grok secrets from file or environment.
fn load_grok_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/grok.json",
        "eventide/.secrets/grok.json",
        "../.secrets/grok.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<GrokSecrets>(path) {
            tracing::info!(path = %path, "Loaded Grok secrets from file");
            return (Some(secrets.api_key), secrets.model);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Grok secrets file not found, using environment variables");
    (std::env::var("GROK_API_KEY").ok(), None)
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/eventide".into(),
            auth_base_url: "https://auth.eventide.app".into(),
            auth_audience: "eventide".into(),
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_price_id: None,
            stripe_api_url: None,
            grok_api_key: None,
            grok_api_url: None,
            grok_model: "grok-2-1212".into(),
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
