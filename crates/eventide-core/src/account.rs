//! Account types for eventide.
//!
//! This module defines the per-user account record: subscription tier and
//! status synchronized from the payment processor, plus the weekly session
//! counters consulted by the usage ledger.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{CustomerRef, SubscriptionRef, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Free-tier session allowance per rolling week.
pub const WEEKLY_FREE_SESSION_LIMIT: u32 = 3;

/// Length of the rolling usage window, in days.
pub const SESSION_WINDOW_DAYS: i64 = 7;

/// Wire representation of an uncapped allowance.
pub const UNLIMITED_ALLOWANCE: &str = "unlimited";

/// A user's account record.
///
/// One per identity, created lazily on first sight with free-tier defaults.
/// Mutated by the usage ledger (session counters) and by the billing event
/// processor (tier, status, refs); never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// The user ID (from the identity provider).
    pub user_id: UserId,

    /// Current feature-access level.
    pub subscription_tier: Tier,

    /// Processor lifecycle label, retained for audit/support.
    pub subscription_status: SubscriptionStatus,

    /// Payment-processor customer record. Set once at the first completed
    /// checkout and retained through cancellation so a re-subscribe resolves
    /// to the same account.
    pub billing_customer_ref: Option<CustomerRef>,

    /// Active subscription reference; cleared when the subscription is
    /// deleted.
    pub billing_subscription_ref: Option<SubscriptionRef>,

    /// Lifetime sessions started (monotonic).
    pub session_count_total: u64,

    /// Sessions started since `week_start_date`. Only consulted for
    /// free-tier accounts.
    pub weekly_session_count: u32,

    /// Anchor of the rolling 7-day window.
    pub week_start_date: DateTime<Utc>,

    /// When the user last started a session.
    pub last_session_date: Option<DateTime<Utc>>,

    /// When the last successful payment was recorded.
    pub last_payment_at: Option<DateTime<Utc>>,

    /// When subscription fields were last written.
    pub subscription_updated_at: Option<DateTime<Utc>>,

    /// When the last webhook-driven update landed. Forensic only; never used
    /// to reject stale deliveries.
    pub last_webhook_update: Option<DateTime<Utc>>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create a new free-tier account with fresh counters.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            subscription_tier: Tier::Free,
            subscription_status: SubscriptionStatus::Free,
            billing_customer_ref: None,
            billing_subscription_ref: None,
            session_count_total: 0,
            weekly_session_count: 0,
            week_start_date: now,
            last_session_date: None,
            last_payment_at: None,
            subscription_updated_at: None,
            last_webhook_update: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether this account has premium access.
    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.subscription_tier == Tier::Premium
    }

    /// Free sessions left in the current window, ignoring expiry.
    #[must_use]
    pub fn remaining_free_sessions(&self) -> u32 {
        WEEKLY_FREE_SESSION_LIMIT.saturating_sub(self.weekly_session_count)
    }

    /// Check whether the rolling window anchored at `week_start_date` has
    /// elapsed. Whole days only: 6 days 23 hours is still inside the window.
    #[must_use]
    pub fn week_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.week_start_date).num_days() >= SESSION_WINDOW_DAYS
    }

    /// Merge a partial billing update into this account.
    ///
    /// Only populated fields are written. `subscription_updated_at`,
    /// `last_webhook_update`, and `updated_at` are always stamped. The
    /// customer ref is set-once: a patch against an already-linked account
    /// leaves the stored ref untouched.
    ///
    /// Returns the customer ref when this patch linked it for the first
    /// time, so the caller can maintain its reverse lookup.
    pub fn apply_billing_patch(
        &mut self,
        patch: &SubscriptionPatch,
        now: DateTime<Utc>,
    ) -> Option<CustomerRef> {
        let mut newly_linked = None;

        if let Some(tier) = patch.tier {
            self.subscription_tier = tier;
        }
        if let Some(status) = patch.status {
            self.subscription_status = status;
        }
        if let Some(customer) = &patch.customer_ref {
            if self.billing_customer_ref.is_none() {
                self.billing_customer_ref = Some(customer.clone());
                newly_linked = Some(customer.clone());
            }
        }
        match &patch.subscription_ref {
            RefPatch::Keep => {}
            RefPatch::Set(subscription) => {
                self.billing_subscription_ref = Some(subscription.clone());
            }
            RefPatch::Clear => {
                self.billing_subscription_ref = None;
            }
        }
        if let Some(paid_at) = patch.last_payment_at {
            self.last_payment_at = Some(paid_at);
        }

        self.subscription_updated_at = Some(now);
        self.last_webhook_update = Some(now);
        self.updated_at = now;

        newly_linked
    }
}

/// Feature-access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free tier: 3 sessions per rolling week.
    Free,

    /// Premium tier: uncapped sessions, AI insights.
    Premium,
}

impl Tier {
    /// Derive the tier a processor status entitles.
    #[must_use]
    pub const fn for_status(status: SubscriptionStatus) -> Self {
        if status.grants_premium() {
            Self::Premium
        } else {
            Self::Free
        }
    }
}

/// Subscription lifecycle label, as reported by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscription has ever been linked.
    Free,

    /// Subscription is active and paid.
    Active,

    /// Subscription is inside a trial period.
    Trialing,

    /// A payment failed; premium access is revoked immediately.
    PastDue,

    /// Subscription was cancelled or ended.
    Cancelled,
}

impl SubscriptionStatus {
    /// Whether this status entitles the account to premium access.
    #[must_use]
    pub const fn grants_premium(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Map a processor-reported status string into the modeled vocabulary.
    ///
    /// Statuses outside the vocabulary (`incomplete`, `unpaid`, `paused`,
    /// future additions) map to `Cancelled`: not entitled, subscription not
    /// in good standing.
    #[must_use]
    pub fn from_processor(raw: &str) -> Self {
        match raw {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            _ => Self::Cancelled,
        }
    }
}

/// Remaining session allowance for a user.
///
/// Serialized as the string `"unlimited"` for premium accounts and as a
/// plain number for free accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAllowance {
    /// No weekly cap applies.
    Unlimited,

    /// Sessions left in the current window.
    Remaining(u32),
}

impl SessionAllowance {
    /// Whether this allowance permits starting another session.
    #[must_use]
    pub const fn permits_start(self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Remaining(n) => n > 0,
        }
    }
}

impl Serialize for SessionAllowance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unlimited => serializer.serialize_str(UNLIMITED_ALLOWANCE),
            Self::Remaining(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for SessionAllowance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AllowanceVisitor;

        impl Visitor<'_> for AllowanceVisitor {
            type Value = SessionAllowance;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\"{UNLIMITED_ALLOWANCE}\" or a non-negative count")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if v == UNLIMITED_ALLOWANCE {
                    Ok(SessionAllowance::Unlimited)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u32::try_from(v)
                    .map(SessionAllowance::Remaining)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u32::try_from(v)
                    .map(SessionAllowance::Remaining)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(AllowanceVisitor)
    }
}

/// Tri-state update for an optional reference field.
///
/// Distinguishes "this event does not know the value" (`Keep`) from an
/// explicit removal (`Clear`), so a payment event cannot null out a
/// subscription ref it never carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RefPatch<T> {
    /// Leave the stored value untouched.
    #[default]
    Keep,

    /// Overwrite the stored value.
    Set(T),

    /// Null the stored value out.
    Clear,
}

/// A partial update to the subscription fields of a [`UserAccount`].
///
/// Produced by the billing event reducer; applied through the store as the
/// processor's sole write path. Every field an event knows is a full
/// overwrite, so replaying the same event is idempotent.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    /// New feature-access level, if the event determines one.
    pub tier: Option<Tier>,

    /// New lifecycle status, if the event carries one.
    pub status: Option<SubscriptionStatus>,

    /// Customer ref to link (set-once; ignored if already linked).
    pub customer_ref: Option<CustomerRef>,

    /// Subscription ref update (set, clear, or keep).
    pub subscription_ref: RefPatch<SubscriptionRef>,

    /// Successful-payment stamp.
    pub last_payment_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_account() -> UserAccount {
        UserAccount::new(UserId::generate())
    }

    #[test]
    fn new_account_defaults_to_free() {
        let account = test_account();
        assert_eq!(account.subscription_tier, Tier::Free);
        assert_eq!(account.subscription_status, SubscriptionStatus::Free);
        assert_eq!(account.session_count_total, 0);
        assert_eq!(account.weekly_session_count, 0);
        assert!(account.billing_customer_ref.is_none());
        assert!(account.billing_subscription_ref.is_none());
    }

    #[test]
    fn remaining_free_sessions_saturates() {
        let mut account = test_account();
        assert_eq!(account.remaining_free_sessions(), 3);
        account.weekly_session_count = 2;
        assert_eq!(account.remaining_free_sessions(), 1);
        account.weekly_session_count = 5;
        assert_eq!(account.remaining_free_sessions(), 0);
    }

    #[test]
    fn week_expiry_uses_whole_days() {
        let mut account = test_account();
        let now = Utc::now();

        account.week_start_date = now - Duration::days(6) - Duration::hours(23);
        assert!(!account.week_expired(now));

        account.week_start_date = now - Duration::days(7);
        assert!(account.week_expired(now));

        account.week_start_date = now - Duration::days(8);
        assert!(account.week_expired(now));
    }

    #[test]
    fn status_premium_entitlement() {
        assert!(SubscriptionStatus::Active.grants_premium());
        assert!(SubscriptionStatus::Trialing.grants_premium());
        assert!(!SubscriptionStatus::Free.grants_premium());
        assert!(!SubscriptionStatus::PastDue.grants_premium());
        assert!(!SubscriptionStatus::Cancelled.grants_premium());

        assert_eq!(Tier::for_status(SubscriptionStatus::Trialing), Tier::Premium);
        assert_eq!(Tier::for_status(SubscriptionStatus::PastDue), Tier::Free);
    }

    #[test]
    fn processor_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_processor("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_processor("trialing"),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            SubscriptionStatus::from_processor("past_due"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_processor("canceled"),
            SubscriptionStatus::Cancelled
        );
        // Outside the modeled vocabulary: not entitled
        assert_eq!(
            SubscriptionStatus::from_processor("incomplete"),
            SubscriptionStatus::Cancelled
        );
    }

    #[test]
    fn patch_applies_only_provided_fields() {
        let mut account = test_account();
        let sub: SubscriptionRef = "sub_123".parse().unwrap();
        account.billing_subscription_ref = Some(sub.clone());

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Active),
            tier: Some(Tier::Premium),
            ..SubscriptionPatch::default()
        };
        let now = Utc::now();
        account.apply_billing_patch(&patch, now);

        assert_eq!(account.subscription_tier, Tier::Premium);
        assert_eq!(account.subscription_status, SubscriptionStatus::Active);
        // A patch that does not know the subscription ref must not null it
        assert_eq!(account.billing_subscription_ref, Some(sub));
        assert_eq!(account.subscription_updated_at, Some(now));
        assert_eq!(account.last_webhook_update, Some(now));
    }

    #[test]
    fn patch_clear_removes_subscription_ref() {
        let mut account = test_account();
        account.billing_subscription_ref = Some("sub_123".parse().unwrap());

        let patch = SubscriptionPatch {
            subscription_ref: RefPatch::Clear,
            ..SubscriptionPatch::default()
        };
        account.apply_billing_patch(&patch, Utc::now());

        assert!(account.billing_subscription_ref.is_none());
    }

    #[test]
    fn customer_ref_is_set_once() {
        let mut account = test_account();
        let first: CustomerRef = "cus_first".parse().unwrap();
        let second: CustomerRef = "cus_second".parse().unwrap();

        let patch = SubscriptionPatch {
            customer_ref: Some(first.clone()),
            ..SubscriptionPatch::default()
        };
        let linked = account.apply_billing_patch(&patch, Utc::now());
        assert_eq!(linked, Some(first.clone()));

        let patch = SubscriptionPatch {
            customer_ref: Some(second),
            ..SubscriptionPatch::default()
        };
        let linked = account.apply_billing_patch(&patch, Utc::now());
        assert_eq!(linked, None);
        assert_eq!(account.billing_customer_ref, Some(first));
    }

    #[test]
    fn allowance_serde_shapes() {
        let unlimited = serde_json::to_value(SessionAllowance::Unlimited).unwrap();
        assert_eq!(unlimited, serde_json::json!("unlimited"));

        let capped = serde_json::to_value(SessionAllowance::Remaining(2)).unwrap();
        assert_eq!(capped, serde_json::json!(2));

        let parsed: SessionAllowance = serde_json::from_value(unlimited).unwrap();
        assert_eq!(parsed, SessionAllowance::Unlimited);
        let parsed: SessionAllowance = serde_json::from_value(capped).unwrap();
        assert_eq!(parsed, SessionAllowance::Remaining(2));
    }

    #[test]
    fn allowance_permits_start() {
        assert!(SessionAllowance::Unlimited.permits_start());
        assert!(SessionAllowance::Remaining(1).permits_start());
        assert!(!SessionAllowance::Remaining(0).permits_start());
    }
}
