//! Stripe webhook integration tests.

mod common;

use common::{sign_webhook, sign_webhook_at, TestHarness, TEST_WEBHOOK_SECRET};
use serde_json::json;

use eventide_core::{SubscriptionStatus, Tier, UserId};
use eventide_store::Store;

fn secured_harness() -> TestHarness {
    TestHarness::with_config(|config| {
        config.stripe_webhook_secret = Some(TEST_WEBHOOK_SECRET.into());
    })
}

fn checkout_completed_body(user_id: &UserId) -> String {
    json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "customer": "cus_123",
            "subscription": "sub_456",
            "metadata": { "user_id": user_id.to_string() }
        }}
    })
    .to_string()
}

fn subscription_event_body(event_type: &str, status: &str) -> String {
    json!({
        "type": event_type,
        "data": { "object": {
            "id": "sub_456",
            "customer": "cus_123",
            "status": status
        }}
    })
    .to_string()
}

async fn deliver(harness: &TestHarness, body: &str) {
    harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook(TEST_WEBHOOK_SECRET, body))
        .text(body.to_string())
        .await
        .assert_status_ok();
}

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn webhook_is_rejected_when_no_secret_is_configured() {
    let harness = TestHarness::new();
    let body = checkout_completed_body(&harness.test_user_id);

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook(TEST_WEBHOOK_SECRET, &body))
        .text(body)
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let harness = secured_harness();

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text(checkout_completed_body(&harness.test_user_id))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn webhook_with_wrong_secret_is_rejected() {
    let harness = secured_harness();
    let body = checkout_completed_body(&harness.test_user_id);

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook("whsec_wrong", &body))
        .text(body)
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn webhook_with_tampered_body_is_rejected() {
    let harness = secured_harness();
    let body = checkout_completed_body(&harness.test_user_id);
    let tampered = body.replace("cus_123", "cus_evil");

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook(TEST_WEBHOOK_SECRET, &body))
        .text(tampered)
        .await;

    response.assert_status_bad_request();

    // Nothing was applied
    assert!(harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn webhook_with_stale_timestamp_is_rejected() {
    let harness = secured_harness();
    let body = checkout_completed_body(&harness.test_user_id);
    let stale = chrono::Utc::now().timestamp() - 3600;

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header(
            "stripe-signature",
            sign_webhook_at(TEST_WEBHOOK_SECRET, &body, stale),
        )
        .text(body)
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn malformed_body_with_valid_signature_is_rejected() {
    let harness = secured_harness();
    let body = "not json at all";

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook(TEST_WEBHOOK_SECRET, body))
        .text(body.to_string())
        .await;

    response.assert_status_bad_request();
}

// ============================================================================
// Event application
// ============================================================================

#[tokio::test]
async fn checkout_completed_links_customer_and_grants_premium() {
    let harness = secured_harness();

    deliver(&harness, &checkout_completed_body(&harness.test_user_id)).await;

    let account = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(account.subscription_tier, Tier::Premium);
    assert_eq!(account.subscription_status, SubscriptionStatus::Active);
    assert_eq!(account.billing_customer_ref, Some("cus_123".parse().unwrap()));
    assert_eq!(
        account.billing_subscription_ref,
        Some("sub_456".parse().unwrap())
    );

    // Later customer-keyed events resolve to this account
    let resolved = harness
        .store
        .find_account_by_customer(&"cus_123".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(resolved.user_id, harness.test_user_id);
}

#[tokio::test]
async fn webhook_replay_is_idempotent() {
    let harness = secured_harness();
    let body = checkout_completed_body(&harness.test_user_id);

    deliver(&harness, &body).await;
    let first = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();

    deliver(&harness, &body).await;
    let second = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();

    assert_eq!(first.subscription_tier, second.subscription_tier);
    assert_eq!(first.subscription_status, second.subscription_status);
    assert_eq!(first.billing_customer_ref, second.billing_customer_ref);
    assert_eq!(
        first.billing_subscription_ref,
        second.billing_subscription_ref
    );
}

#[tokio::test]
async fn trial_update_keeps_premium_access() {
    let harness = secured_harness();
    deliver(&harness, &checkout_completed_body(&harness.test_user_id)).await;

    deliver(
        &harness,
        &subscription_event_body("customer.subscription.updated", "trialing"),
    )
    .await;

    let account = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(account.subscription_tier, Tier::Premium);
    assert_eq!(account.subscription_status, SubscriptionStatus::Trialing);
}

#[tokio::test]
async fn payment_failure_downgrades_immediately() {
    let harness = secured_harness();
    deliver(&harness, &checkout_completed_body(&harness.test_user_id)).await;

    let body = json!({
        "type": "invoice.payment_failed",
        "data": { "object": {
            "customer": "cus_123",
            "subscription": "sub_456"
        }}
    })
    .to_string();
    deliver(&harness, &body).await;

    let account = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(account.subscription_tier, Tier::Free);
    assert_eq!(account.subscription_status, SubscriptionStatus::PastDue);
}

#[tokio::test]
async fn deletion_clears_subscription_but_keeps_customer_link() {
    let harness = secured_harness();
    deliver(&harness, &checkout_completed_body(&harness.test_user_id)).await;

    let body = json!({
        "type": "customer.subscription.deleted",
        "data": { "object": { "customer": "cus_123" } }
    })
    .to_string();
    deliver(&harness, &body).await;

    let account = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(account.subscription_tier, Tier::Free);
    assert_eq!(account.subscription_status, SubscriptionStatus::Cancelled);
    assert!(account.billing_subscription_ref.is_none());
    assert_eq!(account.billing_customer_ref, Some("cus_123".parse().unwrap()));
}

#[tokio::test]
async fn late_payment_confirmation_restores_premium() {
    let harness = secured_harness();
    deliver(&harness, &checkout_completed_body(&harness.test_user_id)).await;

    // A failure arrives, then the succeeded invoice lands afterwards; the
    // last processed event wins.
    let failed = json!({
        "type": "invoice.payment_failed",
        "data": { "object": { "customer": "cus_123", "subscription": "sub_456" } }
    })
    .to_string();
    deliver(&harness, &failed).await;

    let paid = json!({
        "type": "invoice.payment_succeeded",
        "data": { "object": { "customer": "cus_123", "subscription": "sub_456" } }
    })
    .to_string();
    deliver(&harness, &paid).await;

    let account = harness
        .store
        .get_account(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(account.subscription_tier, Tier::Premium);
    assert_eq!(account.subscription_status, SubscriptionStatus::Active);
    assert!(account.last_payment_at.is_some());
}

// ============================================================================
// Acknowledged non-events
// ============================================================================

#[tokio::test]
async fn unknown_event_type_is_acknowledged() {
    let harness = secured_harness();
    let body = json!({
        "type": "customer.tax_id.created",
        "data": { "object": {} }
    })
    .to_string();

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook(TEST_WEBHOOK_SECRET, &body))
        .text(body)
        .await;

    response.assert_status_ok();
    let parsed: serde_json::Value = response.json();
    assert_eq!(parsed["received"], true);
}

#[tokio::test]
async fn event_for_unlinked_customer_is_acknowledged() {
    let harness = secured_harness();
    let body = subscription_event_body("customer.subscription.updated", "active");

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign_webhook(TEST_WEBHOOK_SECRET, &body))
        .text(body)
        .await;

    response.assert_status_ok();
    let parsed: serde_json::Value = response.json();
    assert_eq!(parsed["received"], true);
}
