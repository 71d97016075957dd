//! Application state.

use std::sync::Arc;

use eventide_store::RocksStore;

use crate::auth::SessionWatch;
use crate::config::ServiceConfig;
use crate::insights::InsightsClient;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for subscriptions (optional).
    pub stripe: Option<Arc<StripeClient>>,

    /// Grok client for generative insights (optional).
    pub insights: Option<Arc<InsightsClient>>,

    /// Broadcast of the most recent authenticated session.
    pub session_watch: SessionWatch,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        // Create Stripe client if configured
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            let built = match config.stripe_api_url.as_ref() {
                Some(url) => StripeClient::with_base_url(key, url),
                None => StripeClient::new(key),
            };
            match built {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - checkout and portal will not be available");
        }

        // Create Grok client if configured
        let insights = config.grok_api_key.as_ref().and_then(|key| {
            let built = match config.grok_api_url.as_ref() {
                Some(url) => InsightsClient::with_base_url(key, &config.grok_model, url),
                None => InsightsClient::new(key, &config.grok_model),
            };
            match built {
                Ok(client) => {
                    tracing::info!(model = %config.grok_model, "Grok integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Grok client");
                    None
                }
            }
        });

        if insights.is_none() {
            tracing::warn!("Grok not configured - insights will fall back to canned responses");
        }

        Self {
            store,
            config,
            stripe,
            insights,
            session_watch: SessionWatch::new(),
        }
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }

    /// Check if Grok is configured.
    #[must_use]
    pub fn has_insights(&self) -> bool {
        self.insights.is_some()
    }
}
