//! Authentication extractors and session observation.
//!
//! This module provides:
//! - `AuthUser` - end-user authentication via identity-provider JWTs
//! - `SessionWatch` - an observable view of the most recent authenticated
//!   session, with subscribe/dispose semantics

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use eventide_core::UserId;
use eventide_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Constants
// ============================================================================

/// How long to cache JWKS keys before refreshing.
const JWKS_CACHE_DURATION: Duration = Duration::from_secs(3600); // 1 hour

/// Timeout for JWKS fetch requests.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated user extracted from an identity-provider JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// The raw subject claim from the JWT.
    pub subject: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // Extract the Authorization header
            let auth_header = parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            // Extract the Bearer token
            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Unauthorized)?;

            // Allow test tokens in testing only.
            // This bypass is gated behind #[cfg(test)] or the "test-auth" feature
            // to ensure it is never active in production builds.
            #[cfg(any(test, feature = "test-auth"))]
            if let Some(user_id_str) = token.strip_prefix("test-token:") {
                let user_id = user_id_str
                    .parse::<UserId>()
                    .map_err(|_| ApiError::Unauthorized)?;

                let user = AuthUser {
                    user_id,
                    subject: user_id_str.to_string(),
                };
                state.session_watch.publish(AuthSession::from(&user));
                return Ok(user);
            }

            // Validate JWT against JWKS
            let claims = validate_jwt(token, state).await?;

            let user_id = claims
                .sub
                .parse::<UserId>()
                .map_err(|_| ApiError::Unauthorized)?;

            let user = AuthUser {
                user_id,
                subject: claims.sub,
            };
            state.session_watch.publish(AuthSession::from(&user));

            Ok(user)
        })
    }
}

// ============================================================================
// Session Watch
// ============================================================================

/// Snapshot of an authenticated session, published to watchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// The authenticated user.
    pub user_id: UserId,
    /// The raw subject claim.
    pub subject: String,
}

impl From<&AuthUser> for AuthSession {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.user_id.clone(),
            subject: user.subject.clone(),
        }
    }
}

/// Observable authentication state.
///
/// Holds the most recently authenticated session. Consumers call
/// [`SessionWatch::subscribe`] to get a [`SessionSubscription`] that reads
/// the current session immediately and then resolves once per change;
/// dropping the subscription detaches it. Repeat authentications by the
/// same session do not wake subscribers.
#[derive(Clone)]
pub struct SessionWatch {
    tx: Arc<watch::Sender<Option<AuthSession>>>,
}

impl SessionWatch {
    /// Create a watch with no session yet.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The current session, if any request has authenticated yet.
    #[must_use]
    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    /// Publish a freshly authenticated session.
    pub fn publish(&self, session: AuthSession) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&session) {
                return false;
            }
            *current = Some(session);
            true
        });
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionWatch {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to [`SessionWatch`]. Dropping it unsubscribes.
pub struct SessionSubscription {
    rx: watch::Receiver<Option<AuthSession>>,
}

impl SessionSubscription {
    /// The session as of the last observation.
    #[must_use]
    pub fn current(&self) -> Option<AuthSession> {
        self.rx.borrow().clone()
    }

    /// Wait for the next session change.
    ///
    /// Returns `None` once the watch itself is gone (service shutdown).
    pub async fn changed(&mut self) -> Option<Option<AuthSession>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Ensure an account row exists for every session the watch reports.
///
/// Runs until the watch closes. The same lazy bootstrap also happens on
/// the gate and ledger paths, so a missed wakeup here only delays the row.
pub async fn bootstrap_accounts<S: Store + ?Sized>(
    store: Arc<S>,
    mut subscription: SessionSubscription,
) {
    // The subscription observes the current session immediately.
    let mut pending = subscription.current();

    loop {
        if let Some(session) = pending.take() {
            match store.ensure_account(&session.user_id) {
                Ok(_) => {
                    tracing::debug!(user_id = %session.user_id, "Session account verified");
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %session.user_id,
                        error = %e,
                        "Failed to bootstrap account for session"
                    );
                }
            }
        }

        match subscription.changed().await {
            Some(session) => pending = session,
            None => break,
        }
    }
}

// ============================================================================
// JWKS Client and JWT Validation
// ============================================================================

/// JWT claims structure for identity-provider tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Audience (can be string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Issuer.
    pub iss: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    pub iat: i64,
}

/// JWKS (JSON Web Key Set) response structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    /// List of JWK keys.
    pub keys: Vec<Jwk>,
}

/// Single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Key ID.
    pub kid: Option<String>,
    /// Algorithm (e.g., "RS256").
    pub alg: Option<String>,
    /// RSA public key modulus (base64url encoded).
    pub n: Option<String>,
    /// RSA public key exponent (base64url encoded).
    pub e: Option<String>,
    /// Key use (e.g., "sig" for signature).
    #[serde(rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS cache entry.
struct JwksCache {
    /// Reusable HTTP client for JWKS fetches.
    /// Creating a new client per request is expensive; reusing it allows
    /// connection pooling and reduces overhead.
    client: reqwest::Client,
    /// Cached keys mapped by kid.
    keys: HashMap<String, DecodingKey>,
    /// Default key (for tokens without kid).
    default_key: Option<DecodingKey>,
    /// When the cache was last updated.
    last_updated: Instant,
}

impl JwksCache {
    fn new() -> Self {
        // Build client once at initialization; this is called lazily on first use
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            keys: HashMap::new(),
            default_key: None,
            // Force initial fetch by setting last_updated as far back as possible
            last_updated: Instant::now()
                .checked_sub(JWKS_CACHE_DURATION)
                .unwrap_or_else(Instant::now),
        }
    }

    fn is_expired(&self) -> bool {
        self.last_updated.elapsed() >= JWKS_CACHE_DURATION
    }
}

/// Global JWKS cache (lazily initialized).
static JWKS_CACHE: std::sync::OnceLock<RwLock<JwksCache>> = std::sync::OnceLock::new();

fn get_jwks_cache() -> &'static RwLock<JwksCache> {
    JWKS_CACHE.get_or_init(|| RwLock::new(JwksCache::new()))
}

/// Validate a JWT token against the JWKS.
async fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    // Decode the header to get the key ID
    let header = decode_header(token).map_err(|e| {
        tracing::debug!(error = %e, "Failed to decode JWT header");
        ApiError::Unauthorized
    })?;

    let kid = header.kid.clone();

    // Get the decoding key from cache or fetch JWKS
    let decoding_key = get_decoding_key(kid.as_deref(), state).await?;

    // Set up validation
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[&state.config.auth_audience]);
    validation.set_issuer(&[&state.config.auth_base_url]);

    // Decode and validate the token
    let token_data = decode::<JwtClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}

/// Get a decoding key from cache or fetch from JWKS endpoint.
async fn get_decoding_key(kid: Option<&str>, state: &AppState) -> Result<DecodingKey, ApiError> {
    let cache = get_jwks_cache();

    // Check cache first
    {
        let cache_read = cache.read().await;
        if !cache_read.is_expired() {
            if let Some(kid) = kid {
                if let Some(key) = cache_read.keys.get(kid) {
                    return Ok(key.clone());
                }
            } else if let Some(key) = &cache_read.default_key {
                return Ok(key.clone());
            }
        }
    }

    // Cache miss or expired - fetch JWKS
    let jwks = fetch_jwks(state).await?;

    // Update cache
    let mut cache_write = cache.write().await;
    cache_write.keys.clear();
    cache_write.default_key = None;
    cache_write.last_updated = Instant::now();

    for jwk in &jwks.keys {
        if let Some(decoding_key) = jwk_to_decoding_key(jwk) {
            if let Some(ref key_kid) = jwk.kid {
                cache_write
                    .keys
                    .insert(key_kid.clone(), decoding_key.clone());
            }
            // Set first key as default
            if cache_write.default_key.is_none() {
                cache_write.default_key = Some(decoding_key);
            }
        }
    }

    // Return the requested key
    if let Some(kid) = kid {
        cache_write
            .keys
            .get(kid)
            .cloned()
            .ok_or(ApiError::Unauthorized)
    } else {
        cache_write.default_key.clone().ok_or(ApiError::Unauthorized)
    }
}

/// Fetch JWKS from the auth provider.
///
/// Uses the cached HTTP client from `JwksCache` to enable connection reuse.
async fn fetch_jwks(state: &AppState) -> Result<Jwks, ApiError> {
    let jwks_url = format!("{}/.well-known/jwks.json", state.config.auth_base_url);

    tracing::debug!(url = %jwks_url, "Fetching JWKS");

    // Get the cached client for connection reuse
    let cache = get_jwks_cache();
    let client = {
        let cache_read = cache.read().await;
        cache_read.client.clone()
    };

    let response = client.get(&jwks_url).send().await.map_err(|e| {
        tracing::error!(error = %e, url = %jwks_url, "Failed to fetch JWKS");
        ApiError::ExternalService("Failed to fetch authentication keys".into())
    })?;

    if !response.status().is_success() {
        tracing::error!(
            status = %response.status(),
            url = %jwks_url,
            "JWKS fetch returned non-success status"
        );
        return Err(ApiError::ExternalService(
            "Failed to fetch authentication keys".into(),
        ));
    }

    let jwks: Jwks = response.json().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to parse JWKS response");
        ApiError::ExternalService("Failed to parse authentication keys".into())
    })?;

    tracing::info!(keys_count = %jwks.keys.len(), "JWKS fetched successfully");

    Ok(jwks)
}

/// Convert a JWK to a `DecodingKey`.
fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    // Only support RSA keys for now
    if jwk.kty != "RSA" {
        tracing::debug!(kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }

    let n = jwk.n.as_ref()?;
    let e = jwk.e.as_ref()?;

    DecodingKey::from_rsa_components(n, e).ok()
}
