//! Storage layer for eventide.
//!
//! Defines the [`Store`] trait that the service layer programs against,
//! plus the RocksDB implementation used in production and tests. All
//! values are CBOR-encoded; keys are built in [`keys`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use eventide_core::{
    CheckIn, CheckInId, CustomerRef, FollowUp, SubscriptionPatch, UserAccount, UserId,
};

/// Persistent storage operations for accounts, the session ledger,
/// subscription state, and check-in history.
pub trait Store: Send + Sync {
    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Stores an account record, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or serialization fails.
    fn put_account(&self, account: &UserAccount) -> Result<()>;

    /// Loads an account by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or deserialization fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>>;

    /// Loads an account, creating a default free-tier record if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the creating write fails.
    fn ensure_account(&self, user_id: &UserId) -> Result<UserAccount>;

    /// Resolves an account through the customer-ref index.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or deserialization fails.
    fn find_account_by_customer(&self, customer: &CustomerRef) -> Result<Option<UserAccount>>;

    // ========================================================================
    // Session Ledger Operations
    // ========================================================================

    /// Resets the weekly window: zeroes the weekly count and anchors the
    /// window start at `now`. Lifetime totals are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    fn reset_week(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<UserAccount>;

    /// Records a session start without a quota check. Used for accounts
    /// whose entitlement grants unlimited sessions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    fn record_session(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<UserAccount>;

    /// Records a session start only if the weekly count is below `limit`.
    /// The check and the increment happen under one lock, so concurrent
    /// calls cannot both consume the final slot.
    ///
    /// If the weekly window has lapsed the count is reset before the
    /// check, matching the read-time reset in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WeeklyLimitReached`] if the quota is spent,
    /// or [`StoreError::NotFound`] if the account does not exist.
    fn record_session_within_limit(
        &self,
        user_id: &UserId,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<UserAccount>;

    // ========================================================================
    // Billing Operations
    // ========================================================================

    /// Merges a subscription patch into an account and maintains the
    /// customer-ref index when a ref is linked for the first time.
    ///
    /// A patch that tries to repoint an already-linked ref, or to link a
    /// ref held by another account, has its `customer_ref` ignored; the
    /// rest of the patch still applies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    fn apply_subscription_patch(
        &self,
        user_id: &UserId,
        patch: &SubscriptionPatch,
    ) -> Result<UserAccount>;

    // ========================================================================
    // Check-in Operations
    // ========================================================================

    /// Stores a check-in record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or serialization fails.
    fn put_check_in(&self, check_in: &CheckIn) -> Result<()>;

    /// Loads a single check-in belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or deserialization fails.
    fn get_check_in(&self, user_id: &UserId, id: &CheckInId) -> Result<Option<CheckIn>>;

    /// Lists a user's check-ins, newest first, up to `limit` records.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or deserialization fails.
    fn list_check_ins(&self, user_id: &UserId, limit: usize) -> Result<Vec<CheckIn>>;

    /// Stores a follow-up record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or serialization fails.
    fn put_follow_up(&self, follow_up: &FollowUp) -> Result<()>;
}
