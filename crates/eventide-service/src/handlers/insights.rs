//! Generative insight handlers.
//!
//! Responses degrade to canned fallbacks on any upstream failure. Once the
//! caller is authorized this endpoint answers 200: a model outage is not
//! the client's problem.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use eventide_core::UserAccount;
use eventide_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::insights::prompts::{
    self, fallback_activities, parse_activities, ActivitySuggestion, CheckInSnapshot, InsightType,
    FALLBACK_MESSAGE, PATTERN_HISTORY_LIMIT,
};
use crate::state::AppState;

/// Insight request.
#[derive(Debug, Deserialize)]
pub struct InsightRequest {
    /// What kind of response to generate.
    #[serde(default = "default_insight_type")]
    pub request_type: InsightType,
    /// The check-in to reflect on.
    #[serde(default)]
    pub check_in: Option<CheckInSnapshot>,
    /// Prior check-ins; loaded from stored history when absent.
    #[serde(default)]
    pub history: Option<Vec<CheckInSnapshot>>,
}

fn default_insight_type() -> InsightType {
    InsightType::Insights
}

/// Insight response. Either generated text or structured activities.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum InsightResponse {
    /// Free-text insight or pattern analysis.
    Text {
        /// The generated (or fallback) message.
        response: String,
    },
    /// Structured activity suggestions.
    Activities {
        /// Three suggestions, generated or canned.
        activities: Vec<ActivitySuggestion>,
    },
}

/// Generate an insight, pattern analysis, or activity suggestions.
pub async fn generate_insight(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<InsightRequest>,
) -> Result<Json<InsightResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.user_id)?
        .unwrap_or_else(|| UserAccount::new(auth.user_id.clone()));
    if !account.is_premium() {
        return Err(ApiError::PremiumRequired);
    }

    let response = match body.request_type {
        InsightType::Insights => {
            let check_in = require_check_in(body.check_in.as_ref())?;
            let history = resolve_history(&state, &auth, body.history)?;
            let (system_prompt, user_prompt) = prompts::insights_prompts(check_in, history.len());
            InsightResponse::Text {
                response: complete_or_fallback(&state, system_prompt, &user_prompt).await,
            }
        }
        InsightType::Patterns => {
            let history = resolve_history(&state, &auth, body.history)?;
            let (system_prompt, user_prompt) = prompts::patterns_prompts(&history);
            InsightResponse::Text {
                response: complete_or_fallback(&state, system_prompt, &user_prompt).await,
            }
        }
        InsightType::ActivitySuggestions => {
            let check_in = require_check_in(body.check_in.as_ref())?;
            let (system_prompt, user_prompt) = prompts::activity_prompts(check_in);
            let activities = match try_complete(&state, system_prompt, &user_prompt).await {
                Some(content) => parse_activities(&content).unwrap_or_else(|| {
                    tracing::warn!("Activity response was not a usable JSON array; serving fallback");
                    fallback_activities()
                }),
                None => fallback_activities(),
            };
            InsightResponse::Activities { activities }
        }
    };

    Ok(Json(response))
}

fn require_check_in(check_in: Option<&CheckInSnapshot>) -> Result<&CheckInSnapshot, ApiError> {
    check_in.ok_or_else(|| ApiError::BadRequest("check_in is required for this request type".into()))
}

fn resolve_history(
    state: &AppState,
    auth: &AuthUser,
    provided: Option<Vec<CheckInSnapshot>>,
) -> Result<Vec<CheckInSnapshot>, ApiError> {
    if let Some(history) = provided {
        return Ok(history);
    }

    let stored = state
        .store
        .list_check_ins(&auth.user_id, PATTERN_HISTORY_LIMIT)?;
    Ok(stored.iter().map(CheckInSnapshot::from).collect())
}

async fn complete_or_fallback(state: &AppState, system_prompt: &str, user_prompt: &str) -> String {
    try_complete(state, system_prompt, user_prompt)
        .await
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

/// Run a completion, returning `None` whenever the fallback should serve.
async fn try_complete(state: &AppState, system_prompt: &str, user_prompt: &str) -> Option<String> {
    let client = state.insights.as_ref()?;

    match client.complete(system_prompt, user_prompt).await {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::warn!(error = %e, "Insight generation failed; serving fallback");
            None
        }
    }
}
