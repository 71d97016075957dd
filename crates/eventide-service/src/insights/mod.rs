//! Generative insights via the Grok chat-completions API.
//!
//! Every request type degrades to a fixed fallback payload when the
//! upstream model is unconfigured, unreachable, or returns something
//! unusable. The check-in flow never fails because insights did.

pub mod client;
pub mod prompts;

pub use client::{InsightsClient, InsightsError};
pub use prompts::{ActivitySuggestion, CheckInSnapshot, InsightType};
