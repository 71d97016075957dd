//! Eventide HTTP API Service.
//!
//! This crate provides the HTTP API for the eventide service, including:
//!
//! - Session gating and the weekly usage ledger
//! - Evening check-ins and next-morning follow-ups
//! - Entitlement resolution
//! - Subscription checkout, customer portal, and Stripe webhooks
//! - Generative insights with canned fallbacks
//!
//! # Authentication
//!
//! End-user requests carry a JWT from the identity provider; webhooks are
//! authenticated by HMAC signature instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async for routing consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod insights;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use insights::{InsightsClient, InsightsError};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
