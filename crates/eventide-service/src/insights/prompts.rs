//! Prompt construction and fallback payloads for the insights API.

use serde::{Deserialize, Serialize};

use eventide_core::CheckIn;

/// What kind of generative response the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightType {
    /// A short reflection on the current check-in.
    Insights,
    /// A pattern analysis over recent check-in history.
    Patterns,
    /// Three concrete evening activities as structured suggestions.
    ActivitySuggestions,
}

/// Check-in fields the prompt builders consume.
///
/// Carried inline in the insights request so a check-in can be analysed
/// before (or without) being persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInSnapshot {
    /// How long ago the last meal was.
    pub last_meal_timing: String,
    /// Reported feelings.
    pub feelings: Vec<String>,
    /// Emotional intensity on a 1-10 scale.
    pub emotional_intensity: u8,
    /// Hunger/fullness on a 1-10 scale.
    pub hunger_fullness_level: u8,
    /// Which check-in route the user chose.
    pub route_chosen: String,
    /// Free-form reflection, if written.
    #[serde(default)]
    pub reflection_notes: Option<String>,
}

impl From<&CheckIn> for CheckInSnapshot {
    fn from(check_in: &CheckIn) -> Self {
        Self {
            last_meal_timing: check_in.last_meal_timing.clone(),
            feelings: check_in.feelings.clone(),
            emotional_intensity: check_in.emotional_intensity,
            hunger_fullness_level: check_in.hunger_fullness_level,
            route_chosen: check_in.route_chosen.clone(),
            reflection_notes: check_in.reflection_notes.clone(),
        }
    }
}

/// A structured activity suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySuggestion {
    /// Short activity name.
    pub title: String,
    /// One or two sentences describing it.
    pub description: String,
    /// Why it suits the reported emotional state.
    pub why: String,
    /// Rough duration, e.g. "10-15 minutes".
    pub duration: String,
}

/// Canned response used whenever the model cannot be reached.
pub const FALLBACK_MESSAGE: &str =
    "AI insights are temporarily unavailable. Your check-in has been saved successfully!";

/// Fixed activity set used when structured suggestions cannot be produced.
#[must_use]
pub fn fallback_activities() -> Vec<ActivitySuggestion> {
    vec![
        ActivitySuggestion {
            title: "Gentle Breathing".into(),
            description: "Take slow, deep breaths to calm your nervous system".into(),
            why: "Helps reduce stress and anxiety".into(),
            duration: "5-10 minutes".into(),
        },
        ActivitySuggestion {
            title: "Progressive Relaxation".into(),
            description: "Tense and release each muscle group to release physical tension".into(),
            why: "Addresses both physical and emotional stress".into(),
            duration: "10-15 minutes".into(),
        },
        ActivitySuggestion {
            title: "Mindful Movement".into(),
            description: "Gentle stretches or slow walking to reconnect with your body".into(),
            why: "Helps process emotions through physical movement".into(),
            duration: "5-10 minutes".into(),
        },
    ]
}

/// How many history entries the pattern analysis looks at.
pub const PATTERN_HISTORY_LIMIT: usize = 10;

const INSIGHTS_SYSTEM_PROMPT: &str = "You are a compassionate AI assistant specializing in intuitive eating principles and mindful evening routines, specifically designed for GLP-1 medication users navigating the intersection of medication effects and emotional well-being.

CORE INTUITIVE EATING PRINCIPLES TO HONOR:
1. Reject diet mentality - Never suggest restriction or food rules
2. Honor hunger and fullness - Respect body signals, especially with GLP-1 effects
3. Make peace with food - No \"good\" or \"bad\" food language
4. Challenge the food police - Counter judgmental thoughts
5. Discover satisfaction in eating - Focus on pleasure and nourishment
6. Feel your feelings without using food - Offer non-food emotional support
7. Respect your body - Promote body acceptance and self-compassion
8. Movement for joy - Suggest gentle, enjoyable activities
9. Gentle nutrition - Health-focused without obsession
10. Honor your health with gentle nutrition - Balanced, sustainable approach

GLP-1 SPECIFIC CONSIDERATIONS:
- Acknowledge appetite changes and nausea as normal medication effects
- Respect that hunger cues may be different while on medication
- Support finding satisfaction even with smaller portions
- Address anxiety about eating less or differently
- Honor both physical and emotional needs during treatment

YOUR RESPONSES MUST:
- Use warm, non-judgmental language rooted in body trust
- Celebrate awareness and curiosity over \"perfect\" choices
- Offer emotional support that doesn't involve food restriction
- Acknowledge the complexity of eating while on GLP-1 medication
- Reinforce that all bodies and eating experiences are valid
- Keep responses supportive, practical, and under 100 words";

const PATTERNS_SYSTEM_PROMPT: &str = "You are an expert in analyzing emotional eating patterns through the lens of intuitive eating principles, specifically supporting GLP-1 medication users.

ANALYSIS FRAMEWORK:
- Focus on emotional awareness and self-compassion growth
- Identify patterns without shame or judgment
- Celebrate moments of body trust and intuitive choices
- Acknowledge GLP-1 medication effects on hunger/fullness
- Highlight successful non-food emotional coping strategies
- Reinforce that all eating experiences provide valuable information
- Avoid diet-culture language or suggestions for restriction";

const ACTIVITIES_SYSTEM_PROMPT: &str = "You are an expert in intuitive eating-aligned evening self-care activities for GLP-1 medication users. Your suggestions must honor both emotional needs and the principles of body trust and self-compassion.

ACTIVITY SELECTION PRINCIPLES:
- Support emotional processing without using food as comfort or restriction
- Honor the body's need for gentle care, especially with GLP-1 side effects
- Promote activities that increase body awareness and self-connection
- Suggest options that don't require \"earning\" or \"burning off\" anything
- Focus on pleasure, comfort, and emotional regulation
- Respect energy levels that may fluctuate with medication
- Avoid activities that could trigger diet mentality or body shame";

/// System and user prompts for a single-check-in reflection.
#[must_use]
pub fn insights_prompts(check_in: &CheckInSnapshot, history_len: usize) -> (&'static str, String) {
    let reflection = check_in
        .reflection_notes
        .as_ref()
        .map(|notes| format!("- Reflection: {notes}\n"))
        .unwrap_or_default();

    let user_prompt = format!(
        "Current check-in:\n\
         - Last meal: {}\n\
         - Feelings: {}\n\
         - Emotional intensity: {}/10\n\
         - Hunger/fullness: {}/10\n\
         - Route chosen: {}\n\
         {reflection}\n\
         Recent history: {history_len} previous check-ins\n\n\
         Based on this evening check-in, provide:\n\
         1. A brief insight about their emotional pattern (1-2 sentences)\n\
         2. One specific suggestion for tonight that honors their feelings\n\
         3. An encouraging affirmation that reinforces intuitive eating principles\n\n\
         Keep the total response under 100 words and make it feel personal and caring.",
        check_in.last_meal_timing,
        check_in.feelings.join(", "),
        check_in.emotional_intensity,
        check_in.hunger_fullness_level,
        check_in.route_chosen,
    );

    (INSIGHTS_SYSTEM_PROMPT, user_prompt)
}

/// System and user prompts for a history pattern analysis.
#[must_use]
pub fn patterns_prompts(history: &[CheckInSnapshot]) -> (&'static str, String) {
    let window = &history[..history.len().min(PATTERN_HISTORY_LIMIT)];
    let history_json = serde_json::to_string(window).unwrap_or_else(|_| "[]".into());

    let user_prompt = format!(
        "Analyze these evening check-ins and identify:\n\
         1. Most common emotional triggers\n\
         2. Times when hunger/fullness awareness was strongest\n\
         3. Successful non-food coping strategies used\n\
         4. One key pattern to be aware of\n\n\
         Check-ins: {history_json}\n\n\
         Provide a brief, actionable summary (under 150 words) that empowers rather than criticizes."
    );

    (PATTERNS_SYSTEM_PROMPT, user_prompt)
}

/// System and user prompts for structured activity suggestions.
#[must_use]
pub fn activity_prompts(check_in: &CheckInSnapshot) -> (&'static str, String) {
    let user_prompt = format!(
        "Someone is feeling {} (intensity {}/10) this evening. Their hunger/fullness level is {}/10.\n\n\
         Suggest 3 specific, actionable activities they could do right now. Each should be:\n\
         - 5-20 minutes long\n\
         - Accessible at home\n\
         - Directly addressing their emotional needs\n\
         - Not food-related\n\
         - Gentle and self-compassionate\n\n\
         For each activity, provide:\n\
         - Title (short and appealing)\n\
         - Brief description (1-2 sentences)\n\
         - Why it helps their specific emotional state\n\
         - Estimated duration\n\n\
         Return ONLY a valid JSON array (no other text) with exactly 3 objects in this format:\n\
         [{{\"title\": \"Activity Name\", \"description\": \"Brief description\", \"why\": \"Why it helps\", \"duration\": \"10-15 minutes\"}}]",
        check_in.feelings.join(", "),
        check_in.emotional_intensity,
        check_in.hunger_fullness_level,
    );

    (ACTIVITIES_SYSTEM_PROMPT, user_prompt)
}

/// Parse the model's activity output, salvaging a bracketed array from
/// surrounding prose if necessary.
#[must_use]
pub fn parse_activities(raw: &str) -> Option<Vec<ActivitySuggestion>> {
    if let Ok(activities) = serde_json::from_str::<Vec<ActivitySuggestion>>(raw) {
        return non_empty(activities);
    }

    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }

    serde_json::from_str(&raw[start..=end]).ok().and_then(non_empty)
}

fn non_empty(activities: Vec<ActivitySuggestion>) -> Option<Vec<ActivitySuggestion>> {
    (!activities.is_empty()).then_some(activities)
}
