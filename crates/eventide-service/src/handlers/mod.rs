//! API handlers.

pub mod billing;
pub mod checkins;
pub mod entitlements;
pub mod health;
pub mod insights;
pub mod sessions;
pub mod webhooks;
