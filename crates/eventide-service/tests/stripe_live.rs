//! Live Stripe integration tests.
//!
//! These run against Stripe's test mode and need real test credentials in
//! `.secrets/stripe.json` or `STRIPE_API_KEY`/`STRIPE_PRICE_ID`. No real
//! charges are made.
//!
//! Run with: `cargo test --test stripe_live -- --ignored --nocapture`

use eventide_core::UserId;
use eventide_service::StripeClient;

struct LiveConfig {
    api_key: String,
    price_id: Option<String>,
}

impl LiveConfig {
    fn load() -> Option<Self> {
        if let Ok(api_key) = std::env::var("STRIPE_API_KEY") {
            return Some(Self {
                api_key,
                price_id: std::env::var("STRIPE_PRICE_ID").ok(),
            });
        }

        for path in [".secrets/stripe.json", "../.secrets/stripe.json"] {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if let Ok(secrets) = serde_json::from_str::<serde_json::Value>(&contents) {
                    if let Some(api_key) = secrets.get("api_key").and_then(|v| v.as_str()) {
                        return Some(Self {
                            api_key: api_key.to_string(),
                            price_id: secrets
                                .get("price_id")
                                .and_then(|v| v.as_str())
                                .map(String::from),
                        });
                    }
                }
            }
        }

        None
    }
}

#[tokio::test]
#[ignore = "requires Stripe test credentials"]
async fn live_customer_round_trip() {
    let config = LiveConfig::load().expect("Stripe credentials not found");
    let client = StripeClient::new(&config.api_key).expect("failed to build client");

    let user_id = UserId::generate();
    let email = format!("live-{user_id}@example.com");

    let created = client
        .create_customer(user_id.as_str(), &email)
        .await
        .expect("failed to create customer");
    assert!(created.id.starts_with("cus_"));

    let found = client
        .find_customer_by_email(&email)
        .await
        .expect("lookup failed")
        .expect("customer not found by email");
    assert_eq!(found.id, created.id);
}

#[tokio::test]
#[ignore = "requires Stripe test credentials"]
async fn live_checkout_session_has_hosted_url() {
    let config = LiveConfig::load().expect("Stripe credentials not found");
    let price_id = config.price_id.as_deref().expect("price_id not configured");
    let client = StripeClient::new(&config.api_key).expect("failed to build client");

    let user_id = UserId::generate();
    let email = format!("live-{user_id}@example.com");
    let customer = client
        .create_customer(user_id.as_str(), &email)
        .await
        .expect("failed to create customer");

    let session = client
        .create_subscription_checkout(
            &customer.id,
            user_id.as_str(),
            price_id,
            "http://localhost:3000/billing/success?session_id={CHECKOUT_SESSION_ID}",
            "http://localhost:3000/billing/cancelled",
        )
        .await
        .expect("failed to create checkout session");

    assert!(session.id.starts_with("cs_"));
    let url = session.url.expect("checkout session has no URL");
    assert!(url.contains("checkout.stripe.com"));

    println!("Complete the checkout manually with test card 4242 4242 4242 4242:");
    println!("{url}");
}
