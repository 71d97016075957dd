//! Entitlement resolution handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use eventide_core::{
    SessionAllowance, SubscriptionStatus, Tier, UserAccount, WEEKLY_FREE_SESSION_LIMIT,
};
use eventide_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Entitlement response.
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    /// User ID.
    pub user_id: String,
    /// Current feature-access level.
    pub tier: Tier,
    /// Processor lifecycle label.
    pub status: SubscriptionStatus,
    /// Whether premium features are available.
    pub is_premium: bool,
    /// Sessions available in the current window.
    pub remaining_sessions: SessionAllowance,
    /// Sessions consumed in the current window.
    pub sessions_this_week: u32,
    /// Whether a payment-processor customer is linked.
    pub customer_linked: bool,
    /// Whether an active subscription is linked.
    pub subscription_linked: bool,
    /// When subscription fields last changed.
    pub subscription_updated_at: Option<String>,
}

impl From<&UserAccount> for EntitlementResponse {
    fn from(account: &UserAccount) -> Self {
        let now = Utc::now();
        let expired = account.week_expired(now);

        let remaining_sessions = if account.is_premium() {
            SessionAllowance::Unlimited
        } else if expired {
            SessionAllowance::Remaining(WEEKLY_FREE_SESSION_LIMIT)
        } else {
            SessionAllowance::Remaining(account.remaining_free_sessions())
        };

        Self {
            user_id: account.user_id.to_string(),
            tier: account.subscription_tier,
            status: account.subscription_status,
            is_premium: account.is_premium(),
            remaining_sessions,
            sessions_this_week: if expired { 0 } else { account.weekly_session_count },
            customer_linked: account.billing_customer_ref.is_some(),
            subscription_linked: account.billing_subscription_ref.is_some(),
            subscription_updated_at: account
                .subscription_updated_at
                .map(|t| t.to_rfc3339()),
        }
    }
}

/// Resolve the caller's entitlements.
///
/// Pure read: an account that does not exist yet resolves to free-tier
/// defaults without writing anything.
pub async fn get_entitlements(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.user_id)?
        .unwrap_or_else(|| UserAccount::new(auth.user_id.clone()));

    Ok(Json(EntitlementResponse::from(&account)))
}
