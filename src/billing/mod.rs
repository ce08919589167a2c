//! Payments: Stripe checkout, billing portal and webhooks

pub mod stripe;
pub mod webhook;

pub use stripe::StripeClient;
pub use webhook::{handle_event, sign_payload, verify_signature, WebhookEvent, WebhookOutcome};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::BillingPeriod;

/// Metadata key carrying our user id on Stripe objects
pub const USER_ID_METADATA: &str = "supabase_user_id";

/// Everything needed to start a checkout
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub user_id: String,
    pub period: BillingPeriod,
    pub success_url: String,
    pub cancel_url: String,
}

/// Subscription fields read back from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub id: String,
    pub status: String,
    /// Unix seconds
    pub current_period_end: Option<i64>,
}

/// Payment provider operations used by the billing routes and webhook
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer and return its id
    async fn create_customer(
        &self,
        user_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<String>;

    /// Create a checkout session and return its redirect URL
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<String>;

    /// Create a billing-portal session and return its redirect URL
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo>;
}
