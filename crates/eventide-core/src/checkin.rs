//! Evening check-in records.
//!
//! A check-in is the self-report a user completes at the end of the evening
//! flow; a follow-up is the optional next-morning addendum. Both are
//! append-only records keyed under the owning user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CheckInId, UserId};

/// A completed evening check-in.
///
/// IDs are ULIDs so history listings walk the store newest-first without a
/// secondary index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    /// Unique check-in ID (ULID for time-ordering).
    pub id: CheckInId,

    /// The user who completed the check-in.
    pub user_id: UserId,

    /// Self-reported timing of the last meal ("2 hours ago", "just now").
    pub last_meal_timing: String,

    /// Feelings selected during the check-in.
    pub feelings: Vec<String>,

    /// Emotional intensity on a 1-10 scale.
    pub emotional_intensity: u8,

    /// Hunger/fullness on a 1-10 scale.
    pub hunger_fullness_level: u8,

    /// Which flow route the user chose afterwards.
    pub route_chosen: String,

    /// Free-form reflection, if the user wrote one.
    pub reflection_notes: Option<String>,

    /// When the check-in was recorded.
    pub created_at: DateTime<Utc>,
}

impl CheckIn {
    /// Create a new check-in record stamped with the current time.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        last_meal_timing: String,
        feelings: Vec<String>,
        emotional_intensity: u8,
        hunger_fullness_level: u8,
        route_chosen: String,
        reflection_notes: Option<String>,
    ) -> Self {
        Self {
            id: CheckInId::generate(),
            user_id,
            last_meal_timing,
            feelings,
            emotional_intensity,
            hunger_fullness_level,
            route_chosen,
            reflection_notes,
            created_at: Utc::now(),
        }
    }
}

/// A next-morning follow-up to a check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    /// Unique follow-up ID (ULID for time-ordering).
    pub id: CheckInId,

    /// The user who recorded the follow-up.
    pub user_id: UserId,

    /// The check-in this follows up on, when the client links one.
    pub check_in_id: Option<CheckInId>,

    /// Rest quality on a 1-10 scale, if reported.
    pub rest_quality: Option<u8>,

    /// Free-form notes.
    pub notes: Option<String>,

    /// When the follow-up was recorded.
    pub created_at: DateTime<Utc>,
}

impl FollowUp {
    /// Create a new follow-up record stamped with the current time.
    #[must_use]
    pub fn new(
        user_id: UserId,
        check_in_id: Option<CheckInId>,
        rest_quality: Option<u8>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: CheckInId::generate(),
            user_id,
            check_in_id,
            rest_quality,
            notes,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_in_carries_payload() {
        let user_id = UserId::generate();
        let check_in = CheckIn::new(
            user_id.clone(),
            "2 hours ago".into(),
            vec!["tired".into(), "content".into()],
            4,
            6,
            "wind-down".into(),
            Some("long day".into()),
        );

        assert_eq!(check_in.user_id, user_id);
        assert_eq!(check_in.feelings.len(), 2);
        assert_eq!(check_in.emotional_intensity, 4);
        assert_eq!(check_in.hunger_fullness_level, 6);
    }

    #[test]
    fn follow_up_links_are_optional() {
        let follow_up = FollowUp::new(UserId::generate(), None, Some(7), None);
        assert!(follow_up.check_in_id.is_none());
        assert_eq!(follow_up.rest_quality, Some(7));
    }

    #[test]
    fn check_in_serde_roundtrip() {
        let check_in = CheckIn::new(
            UserId::generate(),
            "just now".into(),
            vec!["calm".into()],
            2,
            5,
            "reflection".into(),
            None,
        );
        let json = serde_json::to_string(&check_in).unwrap();
        let parsed: CheckIn = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, check_in.id);
        assert_eq!(parsed.route_chosen, "reflection");
    }
}
