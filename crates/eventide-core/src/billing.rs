//! Billing events from the payment processor.
//!
//! Deliveries arrive as signed JSON envelopes (`type` discriminant, payload
//! under `data.object`). This module parses them into a closed tagged union
//! and reduces each recognized event to a [`SubscriptionPatch`], a full
//! overwrite of the fields the event knows, so replaying a delivery is
//! idempotent. Ordering is not enforced: the last event processed wins.
//!
//! Events are ephemeral. They are parsed, applied, and discarded; nothing
//! here is persisted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::account::{RefPatch, SubscriptionPatch, SubscriptionStatus, Tier};
use crate::{CustomerRef, SubscriptionRef, UserId};

/// A recognized billing event with everything needed to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// A hosted checkout finished. The only event carrying a direct user
    /// identity; establishes the customer link.
    CheckoutCompleted {
        /// The application user id stamped into checkout metadata.
        user_hint: UserId,
        /// Customer record the processor created or reused.
        customer: CustomerRef,
        /// Subscription opened by the checkout, when reported.
        subscription: Option<SubscriptionRef>,
    },

    /// A subscription record came into existence.
    SubscriptionCreated {
        /// Customer the subscription belongs to.
        customer: CustomerRef,
        /// The new subscription.
        subscription: SubscriptionRef,
        /// Processor-reported lifecycle status.
        status: SubscriptionStatus,
    },

    /// A subscription changed. Primary path for upgrades, downgrades, and
    /// trial transitions.
    SubscriptionUpdated {
        /// Customer the subscription belongs to.
        customer: CustomerRef,
        /// The changed subscription.
        subscription: SubscriptionRef,
        /// Processor-reported lifecycle status.
        status: SubscriptionStatus,
    },

    /// A subscription ended.
    SubscriptionDeleted {
        /// Customer whose subscription ended.
        customer: CustomerRef,
    },

    /// An invoice was paid. Re-affirms premium even if a stray earlier
    /// event had degraded it.
    InvoicePaid {
        /// Customer the invoice was billed to.
        customer: CustomerRef,
        /// Subscription the invoice covers.
        subscription: SubscriptionRef,
    },

    /// An invoice payment failed. Premium access is revoked immediately;
    /// there is no grace period.
    InvoicePaymentFailed {
        /// Customer the invoice was billed to.
        customer: CustomerRef,
        /// Subscription the invoice covers.
        subscription: SubscriptionRef,
    },
}

/// Outcome of parsing a delivery body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A recognized event to act on.
    Recognized(BillingEvent),

    /// A delivery that is acknowledged but deliberately not acted on.
    Ignored {
        /// The envelope's `type` discriminant.
        event_type: String,
        /// Why the event is skipped.
        reason: IgnoreReason,
    },
}

/// Why an acknowledged delivery is not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The `type` discriminant is outside the handled vocabulary. Expected
    /// for processor additions; acknowledged for forward compatibility.
    UnknownType,

    /// A field the handler needs is absent or unusable.
    MissingField(&'static str),

    /// An invoice event without a subscription reference (one-off charges
    /// do not affect entitlement).
    NoSubscription,
}

/// How the processor locates the account an event targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Direct user identity, from checkout metadata.
    ByUserHint(UserId),

    /// Reverse lookup of the account holding this customer ref.
    ByCustomerRef(CustomerRef),
}

/// Errors from parsing a delivery body.
#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    /// The body is not a valid event envelope.
    #[error("malformed event envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    #[serde(default)]
    object: Value,
}

fn str_field<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    object.get(field).and_then(Value::as_str)
}

fn customer_field(object: &Value) -> Result<CustomerRef, IgnoreReason> {
    str_field(object, "customer")
        .and_then(|raw| raw.parse().ok())
        .ok_or(IgnoreReason::MissingField("customer"))
}

fn subscription_id_field(object: &Value) -> Result<SubscriptionRef, IgnoreReason> {
    str_field(object, "id")
        .and_then(|raw| raw.parse().ok())
        .ok_or(IgnoreReason::MissingField("id"))
}

/// Parse a raw delivery body into a [`ParsedEvent`].
///
/// Recognized types with unusable payloads (missing customer, missing
/// checkout identity) come back as `Ignored` rather than errors: the
/// delivery is still acknowledged so the processor does not redeliver a
/// payload this service can never use.
///
/// # Errors
///
/// Returns an error only when the body is not a valid event envelope at
/// all.
pub fn parse_event(body: &[u8]) -> Result<ParsedEvent, EventParseError> {
    let envelope: EventEnvelope = serde_json::from_slice(body)?;
    let object = &envelope.data.object;

    let outcome = match envelope.event_type.as_str() {
        "checkout.session.completed" => parse_checkout_completed(object),
        "customer.subscription.created" => {
            parse_subscription_change(object).map(|(customer, subscription, status)| {
                BillingEvent::SubscriptionCreated {
                    customer,
                    subscription,
                    status,
                }
            })
        }
        "customer.subscription.updated" => {
            parse_subscription_change(object).map(|(customer, subscription, status)| {
                BillingEvent::SubscriptionUpdated {
                    customer,
                    subscription,
                    status,
                }
            })
        }
        "customer.subscription.deleted" => {
            customer_field(object).map(|customer| BillingEvent::SubscriptionDeleted { customer })
        }
        "invoice.payment_succeeded" => parse_invoice(object, false),
        "invoice.payment_failed" => parse_invoice(object, true),
        _ => Err(IgnoreReason::UnknownType),
    };

    Ok(match outcome {
        Ok(event) => ParsedEvent::Recognized(event),
        Err(reason) => ParsedEvent::Ignored {
            event_type: envelope.event_type,
            reason,
        },
    })
}

fn parse_checkout_completed(object: &Value) -> Result<BillingEvent, IgnoreReason> {
    let user_hint = object
        .get("metadata")
        .and_then(|metadata| str_field(metadata, "user_id"))
        .and_then(|raw| raw.parse().ok())
        .ok_or(IgnoreReason::MissingField("metadata.user_id"))?;
    let customer = customer_field(object)?;
    let subscription = str_field(object, "subscription").and_then(|raw| raw.parse().ok());

    Ok(BillingEvent::CheckoutCompleted {
        user_hint,
        customer,
        subscription,
    })
}

fn parse_subscription_change(
    object: &Value,
) -> Result<(CustomerRef, SubscriptionRef, SubscriptionStatus), IgnoreReason> {
    let customer = customer_field(object)?;
    let subscription = subscription_id_field(object)?;
    let status = str_field(object, "status")
        .map(SubscriptionStatus::from_processor)
        .ok_or(IgnoreReason::MissingField("status"))?;
    Ok((customer, subscription, status))
}

fn parse_invoice(object: &Value, failed: bool) -> Result<BillingEvent, IgnoreReason> {
    let customer = customer_field(object)?;
    let subscription = str_field(object, "subscription")
        .and_then(|raw| raw.parse().ok())
        .ok_or(IgnoreReason::NoSubscription)?;

    Ok(if failed {
        BillingEvent::InvoicePaymentFailed {
            customer,
            subscription,
        }
    } else {
        BillingEvent::InvoicePaid {
            customer,
            subscription,
        }
    })
}

impl BillingEvent {
    /// The processor vocabulary name of this event, for logging.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::CheckoutCompleted { .. } => "checkout.session.completed",
            Self::SubscriptionCreated { .. } => "customer.subscription.created",
            Self::SubscriptionUpdated { .. } => "customer.subscription.updated",
            Self::SubscriptionDeleted { .. } => "customer.subscription.deleted",
            Self::InvoicePaid { .. } => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed { .. } => "invoice.payment_failed",
        }
    }

    /// How the target account is located for this event.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        match self {
            Self::CheckoutCompleted { user_hint, .. } => Resolution::ByUserHint(user_hint.clone()),
            Self::SubscriptionCreated { customer, .. }
            | Self::SubscriptionUpdated { customer, .. }
            | Self::SubscriptionDeleted { customer }
            | Self::InvoicePaid { customer, .. }
            | Self::InvoicePaymentFailed { customer, .. } => {
                Resolution::ByCustomerRef(customer.clone())
            }
        }
    }

    /// Reduce this event to the account patch it implies.
    ///
    /// Each patch is a full overwrite of the fields the event knows, never a
    /// delta, so the reduction is idempotent under redelivery.
    #[must_use]
    pub fn to_patch(&self, now: DateTime<Utc>) -> SubscriptionPatch {
        match self {
            Self::CheckoutCompleted {
                customer,
                subscription,
                ..
            } => SubscriptionPatch {
                tier: Some(Tier::Premium),
                status: Some(SubscriptionStatus::Active),
                customer_ref: Some(customer.clone()),
                subscription_ref: subscription
                    .as_ref()
                    .map_or(RefPatch::Keep, |sub| RefPatch::Set(sub.clone())),
                last_payment_at: None,
            },
            Self::SubscriptionCreated {
                subscription,
                status,
                ..
            } => SubscriptionPatch {
                // Created subscriptions entitle premium only once active;
                // a trialing state arrives later as an update.
                tier: Some(if *status == SubscriptionStatus::Active {
                    Tier::Premium
                } else {
                    Tier::Free
                }),
                status: Some(*status),
                subscription_ref: RefPatch::Set(subscription.clone()),
                ..SubscriptionPatch::default()
            },
            Self::SubscriptionUpdated {
                subscription,
                status,
                ..
            } => SubscriptionPatch {
                tier: Some(Tier::for_status(*status)),
                status: Some(*status),
                subscription_ref: RefPatch::Set(subscription.clone()),
                ..SubscriptionPatch::default()
            },
            Self::SubscriptionDeleted { .. } => SubscriptionPatch {
                tier: Some(Tier::Free),
                status: Some(SubscriptionStatus::Cancelled),
                subscription_ref: RefPatch::Clear,
                ..SubscriptionPatch::default()
            },
            Self::InvoicePaid { .. } => SubscriptionPatch {
                tier: Some(Tier::Premium),
                status: Some(SubscriptionStatus::Active),
                last_payment_at: Some(now),
                ..SubscriptionPatch::default()
            },
            Self::InvoicePaymentFailed { .. } => SubscriptionPatch {
                tier: Some(Tier::Free),
                status: Some(SubscriptionStatus::PastDue),
                ..SubscriptionPatch::default()
            },
        }
    }
}
