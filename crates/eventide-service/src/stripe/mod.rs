//! Stripe integration for subscription billing.
//!
//! Stripe handles:
//! - Customer registration and lookup by email
//! - Premium subscriptions via Checkout
//! - Self-service management via the customer portal
//! - Webhook deliveries for subscription lifecycle events

pub mod client;
pub mod types;

pub use client::StripeClient;
pub use client::StripeError;
pub use types::*;
