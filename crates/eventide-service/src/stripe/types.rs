//! Stripe API types.

use serde::Deserialize;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Session status.
    #[serde(default)]
    pub status: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Stripe customer-portal session object.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    /// Session ID.
    pub id: String,
    /// Hosted portal URL to redirect the user to.
    pub url: String,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Object type (always "list").
    pub object: String,
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe error response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// The error payload.
    pub error: StripeErrorBody,
}

/// Stripe error payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    /// Error type (e.g., `invalid_request_error`).
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Machine-readable code.
    #[serde(default)]
    pub code: Option<String>,
}
