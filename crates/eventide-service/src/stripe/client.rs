//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use super::types::{CheckoutSession, Customer, PortalSession, StripeErrorResponse, StripeList};
use crate::error::ApiError;

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Http(e) => {
                tracing::warn!(error = %e, "Stripe request failed");
                Self::ExternalService("payment processor unreachable".into())
            }
            StripeError::Api {
                error_type,
                message,
                code,
            } => {
                tracing::warn!(
                    error_type = %error_type,
                    code = ?code,
                    message = %message,
                    "Stripe API rejected the request"
                );
                Self::ExternalService(format!("payment processor error: {message}"))
            }
            StripeError::Configuration(msg) => {
                tracing::error!(error = %msg, "Stripe client misconfigured");
                Self::NotConfigured("Stripe")
            }
        }
    }
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client against the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// Create a client against a non-default base URL (used in tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Look up a customer by email, returning the first match.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    pub async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, StripeError> {
        let response = self
            .client
            .get(format!("{}/customers", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;

        let list: StripeList<Customer> = self.handle_response(response).await?;
        Ok(list.data.into_iter().next())
    }

    /// Create a new customer carrying our user id as metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    pub async fn create_customer(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<Customer, StripeError> {
        let params = [
            ("email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Stamp an existing customer with our user id as metadata.
    ///
    /// Used when checkout resolves a customer that predates this account,
    /// so later webhook deliveries can recover the owning user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    pub async fn set_customer_user_id(
        &self,
        customer_id: &str,
        user_id: &str,
    ) -> Result<Customer, StripeError> {
        let params = [("metadata[user_id]", user_id.to_string())];

        let response = self
            .client
            .post(format!("{}/customers/{}", self.base_url, customer_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a subscription-mode Checkout session for the premium plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    pub async fn create_subscription_checkout(
        &self,
        customer_id: &str,
        user_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let params = [
            ("mode", "subscription".to_string()),
            ("customer", customer_id.to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("client_reference_id", user_id.to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[user_id]", user_id.to_string()),
            ("subscription_data[metadata][user_id]", user_id.to_string()),
        ];

        tracing::debug!(
            user_id = %user_id,
            customer_id = %customer_id,
            price_id = %price_id,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a customer-portal session for self-service management.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/billing_portal/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = StripeClient::with_base_url("sk_test_xxx", "http://localhost:9999/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn default_base_url_is_stripe() {
        let client = StripeClient::new("sk_test_xxx").unwrap();
        assert_eq!(client.base_url, StripeClient::BASE_URL);
    }
}
