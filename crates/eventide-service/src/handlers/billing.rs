//! Checkout and customer portal handlers.
//!
//! Checkout creates or reuses the processor-side customer but never writes
//! the customer ref locally. The link is established only when the completed
//! checkout comes back through the webhook, so an abandoned checkout leaves
//! no trace on the account.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use eventide_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Email used to find or create the processor customer.
    pub email: String,
    /// Optional price override; defaults to the configured premium price.
    #[serde(default)]
    pub price_ref: Option<String>,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted checkout page URL.
    pub checkout_url: String,
    /// Checkout session ID.
    pub session_id: String,
}

/// Portal response.
#[derive(Debug, Serialize)]
pub struct PortalResponse {
    /// Hosted portal page URL.
    pub portal_url: String,
}

/// Create a subscription checkout session for the premium plan.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let stripe = state.stripe.as_ref().ok_or(ApiError::NotConfigured("Stripe"))?;
    let price_id = match body.price_ref.as_deref().map(str::trim) {
        Some(price) if !price.is_empty() => price,
        _ => state
            .config
            .stripe_price_id
            .as_deref()
            .ok_or(ApiError::NotConfigured("Stripe price"))?,
    };

    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".into()));
    }

    let account = state.store.ensure_account(&auth.user_id)?;

    // Reuse a linked customer; otherwise match by email so a returning
    // subscriber keeps their processor history. New customers and resolved
    // matches both carry our user id in metadata for webhook resolution.
    let customer_id = match account.billing_customer_ref {
        Some(ref customer) => customer.as_str().to_string(),
        None => match stripe.find_customer_by_email(email).await? {
            Some(customer) => {
                stripe
                    .set_customer_user_id(&customer.id, auth.user_id.as_str())
                    .await?;
                customer.id
            }
            None => {
                stripe
                    .create_customer(auth.user_id.as_str(), email)
                    .await?
                    .id
            }
        },
    };

    let success_url = format!(
        "{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}",
        state.config.frontend_url
    );
    let cancel_url = format!("{}/billing/cancelled", state.config.frontend_url);

    let session = stripe
        .create_subscription_checkout(
            &customer_id,
            auth.user_id.as_str(),
            price_id,
            &success_url,
            &cancel_url,
        )
        .await?;

    let checkout_url = session.url.ok_or_else(|| {
        ApiError::ExternalService("checkout session was created without a URL".into())
    })?;

    tracing::info!(
        user_id = %auth.user_id,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        checkout_url,
        session_id: session.id,
    }))
}

/// Create a customer portal session for subscription management.
pub async fn create_portal(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<PortalResponse>, ApiError> {
    let stripe = state.stripe.as_ref().ok_or(ApiError::NotConfigured("Stripe"))?;

    let account = state
        .store
        .get_account(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("account not found".into()))?;

    let customer = account.billing_customer_ref.as_ref().ok_or_else(|| {
        ApiError::NotFound("no billing profile; complete a checkout first".into())
    })?;

    let return_url = format!("{}/settings/billing", state.config.frontend_url);
    let session = stripe
        .create_portal_session(customer.as_str(), &return_url)
        .await?;

    Ok(Json(PortalResponse {
        portal_url: session.url,
    }))
}
