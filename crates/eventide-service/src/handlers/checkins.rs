//! Check-in and follow-up handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use eventide_core::{CheckIn, CheckInId, FollowUp};
use eventide_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;

/// Create check-in request.
#[derive(Debug, Deserialize)]
pub struct CreateCheckInRequest {
    /// Timing of the last meal.
    pub last_meal_timing: String,
    /// Feelings selected during the check-in.
    pub feelings: Vec<String>,
    /// Emotional intensity on a 1-10 scale.
    pub emotional_intensity: u8,
    /// Hunger/fullness on a 1-10 scale.
    pub hunger_fullness_level: u8,
    /// Which flow route was chosen.
    pub route_chosen: String,
    /// Optional free-form reflection.
    #[serde(default)]
    pub reflection_notes: Option<String>,
}

/// Check-in response.
#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    /// Check-in ID.
    pub id: String,
    /// Timing of the last meal.
    pub last_meal_timing: String,
    /// Feelings selected.
    pub feelings: Vec<String>,
    /// Emotional intensity on a 1-10 scale.
    pub emotional_intensity: u8,
    /// Hunger/fullness on a 1-10 scale.
    pub hunger_fullness_level: u8,
    /// Which flow route was chosen.
    pub route_chosen: String,
    /// Free-form reflection, if written.
    pub reflection_notes: Option<String>,
    /// When the check-in was recorded.
    pub created_at: String,
}

impl From<&CheckIn> for CheckInResponse {
    fn from(check_in: &CheckIn) -> Self {
        Self {
            id: check_in.id.to_string(),
            last_meal_timing: check_in.last_meal_timing.clone(),
            feelings: check_in.feelings.clone(),
            emotional_intensity: check_in.emotional_intensity,
            hunger_fullness_level: check_in.hunger_fullness_level,
            route_chosen: check_in.route_chosen.clone(),
            reflection_notes: check_in.reflection_notes.clone(),
            created_at: check_in.created_at.to_rfc3339(),
        }
    }
}

/// History listing query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum entries to return.
    pub limit: Option<usize>,
}

/// History listing response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Check-ins, newest first.
    pub check_ins: Vec<CheckInResponse>,
}

/// Follow-up request.
#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    /// Check-in this follows up on, if the client links one.
    #[serde(default)]
    pub check_in_id: Option<String>,
    /// Rest quality on a 1-10 scale.
    #[serde(default)]
    pub rest_quality: Option<u8>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Follow-up response.
#[derive(Debug, Serialize)]
pub struct FollowUpResponse {
    /// Follow-up ID.
    pub id: String,
    /// Linked check-in ID, if any.
    pub check_in_id: Option<String>,
    /// Rest quality, if reported.
    pub rest_quality: Option<u8>,
    /// Notes, if written.
    pub notes: Option<String>,
    /// When the follow-up was recorded.
    pub created_at: String,
}

fn validate_scale(value: u8, field: &str) -> Result<(), ApiError> {
    if !(1..=10).contains(&value) {
        return Err(ApiError::BadRequest(format!("{field} must be between 1 and 10")));
    }
    Ok(())
}

/// Record a completed evening check-in.
pub async fn create_check_in(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateCheckInRequest>,
) -> Result<Json<CheckInResponse>, ApiError> {
    if body.last_meal_timing.trim().is_empty() {
        return Err(ApiError::BadRequest("last_meal_timing is required".into()));
    }
    if body.route_chosen.trim().is_empty() {
        return Err(ApiError::BadRequest("route_chosen is required".into()));
    }
    if body.feelings.is_empty() || body.feelings.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::BadRequest("at least one feeling is required".into()));
    }
    validate_scale(body.emotional_intensity, "emotional_intensity")?;
    validate_scale(body.hunger_fullness_level, "hunger_fullness_level")?;

    let check_in = CheckIn::new(
        auth.user_id.clone(),
        body.last_meal_timing,
        body.feelings,
        body.emotional_intensity,
        body.hunger_fullness_level,
        body.route_chosen,
        body.reflection_notes,
    );
    state.store.put_check_in(&check_in)?;

    tracing::info!(user_id = %auth.user_id, check_in_id = %check_in.id, "Check-in recorded");

    Ok(Json(CheckInResponse::from(&check_in)))
}

/// List the caller's check-in history, newest first.
pub async fn list_check_ins(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let check_ins = state.store.list_check_ins(&auth.user_id, limit)?;

    Ok(Json(HistoryResponse {
        check_ins: check_ins.iter().map(CheckInResponse::from).collect(),
    }))
}

/// Record a next-morning follow-up, optionally linked to a check-in.
pub async fn create_follow_up(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<FollowUpRequest>,
) -> Result<Json<FollowUpResponse>, ApiError> {
    if body.rest_quality.is_none() && body.notes.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "follow-up needs rest_quality or notes".into(),
        ));
    }
    if let Some(quality) = body.rest_quality {
        validate_scale(quality, "rest_quality")?;
    }

    // A linked check-in must exist and belong to the caller.
    let check_in_id = match body.check_in_id.as_deref() {
        Some(raw) => {
            let id: CheckInId = raw
                .parse()
                .map_err(|_| ApiError::BadRequest("check_in_id is not a valid ID".into()))?;
            if state.store.get_check_in(&auth.user_id, &id)?.is_none() {
                return Err(ApiError::NotFound("check-in not found".into()));
            }
            Some(id)
        }
        None => None,
    };

    let follow_up = FollowUp::new(
        auth.user_id.clone(),
        check_in_id,
        body.rest_quality,
        body.notes,
    );
    state.store.put_follow_up(&follow_up)?;

    tracing::info!(user_id = %auth.user_id, follow_up_id = %follow_up.id, "Follow-up recorded");

    Ok(Json(FollowUpResponse {
        id: follow_up.id.to_string(),
        check_in_id: follow_up.check_in_id.as_ref().map(ToString::to_string),
        rest_quality: follow_up.rest_quality,
        notes: follow_up.notes,
        created_at: follow_up.created_at.to_rfc3339(),
    }))
}
