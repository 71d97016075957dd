//! Core types and logic for eventide.
//!
//! This crate provides the foundational types used throughout the eventide
//! check-in service:
//!
//! - **Identifiers**: `UserId`, `CustomerRef`, `SubscriptionRef`, `CheckInId`
//! - **Accounts**: `UserAccount`, `Tier`, `SubscriptionStatus`,
//!   `SubscriptionPatch`
//! - **Billing events**: `BillingEvent`, `ParsedEvent`, the event-to-patch
//!   reducer
//! - **Check-ins**: `CheckIn`, `FollowUp`
//!
//! # Weekly quota
//!
//! Free-tier accounts get **3 sessions per rolling 7-day window**. The window
//! is anchored at `week_start_date` and reset lazily at read time; premium
//! accounts are exempt and the counter is not consulted for them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod billing;
pub mod checkin;
pub mod ids;

pub use account::{
    RefPatch, SessionAllowance, SubscriptionPatch, SubscriptionStatus, Tier, UserAccount,
    SESSION_WINDOW_DAYS, UNLIMITED_ALLOWANCE, WEEKLY_FREE_SESSION_LIMIT,
};
pub use billing::{
    parse_event, BillingEvent, EventParseError, IgnoreReason, ParsedEvent, Resolution,
};
pub use checkin::{CheckIn, FollowUp};
pub use ids::{CheckInId, CustomerRef, IdError, SubscriptionRef, UserId, MAX_ID_LEN};
