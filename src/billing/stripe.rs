//! Stripe REST client (form-encoded API)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{BillingProvider, CheckoutSessionRequest, SubscriptionInfo, USER_ID_METADATA};
use crate::config::StripeConfig;
use crate::error::{Error, Result};

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    id: String,
    status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<Value>,
}

/// Checkout session form fields, in Stripe's bracket notation
pub fn checkout_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mode = if request.period.is_one_time() {
        "payment"
    } else {
        "subscription"
    };

    let mut form: Vec<(String, String)> = vec![
        ("customer".into(), request.customer_id.clone()),
        ("payment_method_types[0]".into(), "card".into()),
        ("line_items[0][price]".into(), request.price_id.clone()),
        ("line_items[0][quantity]".into(), "1".into()),
        ("mode".into(), mode.into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("allow_promotion_codes".into(), "true".into()),
        (format!("metadata[{}]", USER_ID_METADATA), request.user_id.clone()),
        ("metadata[plan_type]".into(), request.period.as_str().into()),
    ];

    if !request.period.is_one_time() {
        form.push((
            format!("subscription_data[metadata][{}]", USER_ID_METADATA),
            request.user_id.clone(),
        ));
    }

    form
}

/// Message from a Stripe error body, if present
fn stripe_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Stripe API client for the configured mode
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        let secret_key = config.keys().secret_key.clone();
        if secret_key.is_empty() {
            return Err(Error::Config(format!(
                "STRIPE_SECRET_KEY_{} is not set",
                config.mode.name().to_uppercase()
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| Error::Billing(format!("Stripe request failed: {}", e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = stripe_error_message(&body)
            .unwrap_or_else(|| format!("Stripe returned {}", status));
        tracing::warn!(%status, %message, "Stripe API error");
        Err(Error::Billing(message))
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        let request = self
            .client
            .post(format!("{}/{}", self.api_base, path))
            .form(form);
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Billing(format!("Unexpected Stripe response: {}", e)))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(
        &self,
        user_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        let mut form = vec![(format!("metadata[{}]", USER_ID_METADATA), user_id.to_string())];
        if let Some(email) = email {
            form.push(("email".into(), email.to_string()));
        }
        if let Some(name) = name {
            form.push(("name".into(), name.to_string()));
        }

        let customer: IdResponse = self.post_form("customers", &form).await?;
        Ok(customer.id)
    }

    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<String> {
        let session: UrlResponse = self
            .post_form("checkout/sessions", &checkout_form(request))
            .await?;
        session
            .url
            .ok_or_else(|| Error::Billing("Checkout session has no URL".to_string()))
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let session: UrlResponse = self.post_form("billing_portal/sessions", &form).await?;
        session
            .url
            .ok_or_else(|| Error::Billing("Portal session has no URL".to_string()))
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo> {
        let request = self
            .client
            .get(format!("{}/subscriptions/{}", self.api_base, subscription_id));
        let response = self.send(request).await?;
        let sub: SubscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Billing(format!("Unexpected Stripe response: {}", e)))?;

        // Newer API versions moved the period end onto subscription items
        let period_end = sub.current_period_end.or_else(|| {
            sub.items
                .as_ref()
                .and_then(|items| items.pointer("/data/0/current_period_end"))
                .and_then(Value::as_i64)
        });

        Ok(SubscriptionInfo {
            id: sub.id,
            status: sub.status,
            current_period_end: period_end,
        })
    }
}
