//! Session gate and session start handlers.
//!
//! The gate is a read-only preflight: it reports whether a session may start
//! without consuming one. Starting a session is the write path and is the
//! only place a free-tier slot is consumed.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use eventide_core::{SessionAllowance, Tier, WEEKLY_FREE_SESSION_LIMIT};
use eventide_store::{Store, StoreError};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Gate decision response.
#[derive(Debug, Serialize)]
pub struct GateResponse {
    /// Whether a session may start right now.
    pub allowed: bool,
    /// Sessions left before the gate closes.
    pub remaining: SessionAllowance,
    /// Tier the decision was made under.
    pub tier: Tier,
    /// Why the gate is closed, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl GateResponse {
    fn denied(reason: &'static str) -> Self {
        Self {
            allowed: false,
            remaining: SessionAllowance::Remaining(0),
            tier: Tier::Free,
            reason: Some(reason),
        }
    }
}

/// Session start response.
#[derive(Debug, Serialize)]
pub struct SessionStartResponse {
    /// Always true; a refusal is an error response instead.
    pub recorded: bool,
    /// Sessions consumed in the current window.
    pub sessions_this_week: u32,
    /// Lifetime sessions started.
    pub session_count_total: u64,
    /// Sessions left after this one.
    pub remaining: SessionAllowance,
}

/// Check whether the caller may start a session, without consuming one.
///
/// A ledger that cannot be read must not admit a session, so storage
/// failures come back as a denial rather than a 500.
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Json<GateResponse> {
    match evaluate_gate(&state, &auth) {
        Ok(response) => Json(response),
        Err(e) => {
            tracing::error!(
                user_id = %auth.user_id,
                error = %e,
                "Gate evaluation failed; denying session"
            );
            Json(GateResponse::denied("ledger_unavailable"))
        }
    }
}

fn evaluate_gate(state: &AppState, auth: &AuthUser) -> Result<GateResponse, StoreError> {
    let account = state.store.ensure_account(&auth.user_id)?;

    if account.is_premium() {
        return Ok(GateResponse {
            allowed: true,
            remaining: SessionAllowance::Unlimited,
            tier: Tier::Premium,
            reason: None,
        });
    }

    let now = Utc::now();
    let account = if account.week_expired(now) {
        state.store.reset_week(&auth.user_id, now)?
    } else {
        account
    };

    let remaining = account.remaining_free_sessions();
    Ok(GateResponse {
        allowed: remaining > 0,
        remaining: SessionAllowance::Remaining(remaining),
        tier: Tier::Free,
        reason: (remaining == 0).then_some("weekly_limit_reached"),
    })
}

/// Start a session, consuming a weekly slot on the free tier.
///
/// Free-tier accounts go through an atomic check-and-increment, so two
/// concurrent starts cannot both take the last slot.
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SessionStartResponse>, ApiError> {
    let account = state.store.ensure_account(&auth.user_id)?;
    let now = Utc::now();

    let (account, remaining) = if account.is_premium() {
        let account = state.store.record_session(&auth.user_id, now)?;
        (account, SessionAllowance::Unlimited)
    } else {
        let account =
            state
                .store
                .record_session_within_limit(&auth.user_id, WEEKLY_FREE_SESSION_LIMIT, now)?;
        let remaining = SessionAllowance::Remaining(account.remaining_free_sessions());
        (account, remaining)
    };

    tracing::info!(
        user_id = %auth.user_id,
        sessions_this_week = account.weekly_session_count,
        tier = ?account.subscription_tier,
        "Session started"
    );

    Ok(Json(SessionStartResponse {
        recorded: true,
        sessions_this_week: account.weekly_session_count,
        session_count_total: account.session_count_total,
        remaining,
    }))
}
