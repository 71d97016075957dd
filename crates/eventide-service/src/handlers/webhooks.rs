//! Stripe webhook handler.
//!
//! Deliveries are applied as idempotent patches, so replays and
//! out-of-order arrivals converge on the same account state. Responses
//! follow the processor's retry contract: 400 rejects a delivery that can
//! never verify, 200 acknowledges everything parseable (including events
//! this service ignores), and a storage failure surfaces as 500 so the
//! processor redelivers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use eventide_core::{parse_event, BillingEvent, ParsedEvent, Resolution};
use eventide_store::Store;

use crate::crypto::verify_signature_header;
use crate::error::ApiError;
use crate::state::AppState;

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the delivery was accepted.
    pub received: bool,
}

/// Handle Stripe webhook deliveries.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Verification fails closed: without a configured secret no delivery
    // can be trusted, so none is accepted.
    let Some(secret) = &state.config.stripe_webhook_secret else {
        tracing::error!("Webhook received but no signing secret is configured; rejecting");
        return Err(ApiError::BadRequest("webhook verification unavailable".into()));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing Stripe signature".into()))?;

    verify_signature_header(secret, signature, &body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook with invalid signature");
        ApiError::BadRequest("invalid webhook signature".into())
    })?;

    let event = match parse_event(body.as_bytes()) {
        Ok(ParsedEvent::Recognized(event)) => event,
        Ok(ParsedEvent::Ignored { event_type, reason }) => {
            tracing::info!(event_type = %event_type, reason = ?reason, "Ignoring webhook event");
            return Ok(Json(WebhookResponse { received: true }));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed webhook body");
            return Err(ApiError::BadRequest("malformed event payload".into()));
        }
    };

    apply_event(&state, &event)?;

    Ok(Json(WebhookResponse { received: true }))
}

/// Resolve the target account and apply the event's patch.
fn apply_event(state: &AppState, event: &BillingEvent) -> Result<(), ApiError> {
    let patch = event.to_patch(Utc::now());

    let user_id = match event.resolution() {
        // Checkout carries our own user id; the account may not exist yet
        // when the webhook outruns the user's first authenticated request.
        Resolution::ByUserHint(user_id) => {
            state.store.ensure_account(&user_id)?;
            user_id
        }
        Resolution::ByCustomerRef(customer) => {
            match state.store.find_account_by_customer(&customer)? {
                Some(account) => account.user_id,
                None => {
                    // Acknowledged anyway: redelivery cannot resolve a
                    // customer this service has never linked.
                    tracing::warn!(
                        event_type = event.event_name(),
                        customer = %customer,
                        "No account linked to webhook customer; skipping"
                    );
                    return Ok(());
                }
            }
        }
    };

    let account = state.store.apply_subscription_patch(&user_id, &patch)?;

    tracing::info!(
        event_type = event.event_name(),
        user_id = %account.user_id,
        tier = ?account.subscription_tier,
        status = ?account.subscription_status,
        "Applied billing event"
    );

    Ok(())
}
