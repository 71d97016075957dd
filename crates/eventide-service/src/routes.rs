//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{billing, checkins, entitlements, health, insights, sessions, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for session endpoints.
/// The gate runs on every check-in open, so it gets its own headroom.
const SESSION_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Sessions (JWT auth, rate-limited)
/// - `GET /v1/sessions/gate` - May a session start right now
/// - `POST /v1/sessions/start` - Record a session start
///
/// ## Check-ins (JWT auth)
/// - `POST /v1/checkins` - Record an evening check-in
/// - `GET /v1/checkins` - List check-in history
/// - `POST /v1/checkins/follow-up` - Record a next-morning follow-up
///
/// ## Entitlements (JWT auth)
/// - `GET /v1/entitlements/me` - Resolve the caller's entitlements
///
/// ## Billing (JWT auth)
/// - `POST /v1/billing/checkout` - Create a subscription checkout session
/// - `POST /v1/billing/portal` - Create a customer portal session
///
/// ## Insights (JWT auth, premium)
/// - `POST /v1/insights` - Generate an insight, analysis, or activities
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Session endpoints sit on the hot path of every check-in, so they have
    // a higher concurrency limit but are still protected from overload.
    let session_routes = Router::new()
        .route("/gate", get(sessions::session_gate))
        .route("/start", post(sessions::start_session))
        .layer(ConcurrencyLimitLayer::new(SESSION_MAX_CONCURRENT_REQUESTS));

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Check-ins
        .route(
            "/checkins",
            post(checkins::create_check_in).get(checkins::list_check_ins),
        )
        .route("/checkins/follow-up", post(checkins::create_follow_up))
        // Entitlements
        .route("/entitlements/me", get(entitlements::get_entitlements))
        // Billing
        .route("/billing/checkout", post(billing::create_checkout))
        .route("/billing/portal", post(billing::create_portal))
        // Insights
        .route("/insights", post(insights::generate_insight))
        // Session routes (with their own concurrency limit)
        .nest("/sessions", session_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - delivery volume is controlled upstream)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
