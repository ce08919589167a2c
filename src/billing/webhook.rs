//! Stripe webhook verification and event handling
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>[,v1=<hex>]`.
//! The signed payload is `"{t}.{raw body}"`, HMAC-SHA256 with the endpoint
//! secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use super::{BillingProvider, USER_ID_METADATA};
use crate::error::{Error, Result};
use crate::storage::{StudyStore, SubscriptionUpdate};
use crate::types::{Profile, SubscriptionStatus};

type HmacSha256 = Hmac<Sha256>;

/// A parsed webhook event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Profile billing state was written
    Applied {
        user_id: String,
        status: SubscriptionStatus,
    },
    /// Recognised event that changed nothing
    Skipped(String),
    /// Event type we do not handle
    Unhandled,
}

fn mac_for(secret: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(format!("bad secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Build a `Stripe-Signature` header value for a payload
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let t = timestamp.to_string();
    let mac = mac_for(secret, &t, payload)?;
    Ok(format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes())))
}

/// Check a `Stripe-Signature` header against the raw body
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<()> {
    if secret.is_empty() {
        return Err(Error::Signature("webhook secret is not configured".into()));
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value.trim()),
            Some(("v1", value)) => signatures.push(value.trim()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| Error::Signature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(Error::Signature("missing v1 signature".into()));
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| Error::Signature("malformed timestamp".into()))?;
    if now.abs_diff(signed_at) > tolerance_secs {
        return Err(Error::Signature("timestamp outside tolerance".into()));
    }

    let mac = mac_for(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(Error::Signature("no matching signature".into()))
    }
}

/// A string field, or the `id` of an expanded object
fn id_field(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn metadata_user_id(object: &Value) -> Option<String> {
    let metadata = object.get("metadata")?;
    [USER_ID_METADATA, "user_id"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Subscription period end, on the object or its first item
fn period_end(object: &Value) -> Option<i64> {
    object
        .get("current_period_end")
        .and_then(Value::as_i64)
        .or_else(|| {
            object
                .pointer("/items/data/0/current_period_end")
                .and_then(Value::as_i64)
        })
}

/// Subscription id on an invoice (classic field or the newer parent details)
fn invoice_subscription(invoice: &Value) -> Option<String> {
    id_field(invoice, "subscription").or_else(|| {
        invoice
            .pointer("/parent/subscription_details/subscription")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Find the profile an event refers to: metadata user id first, then customer
fn resolve_profile(store: &StudyStore, object: &Value) -> Result<Option<Profile>> {
    if let Some(user_id) = metadata_user_id(object) {
        if let Some(profile) = store.get_profile(&user_id)? {
            return Ok(Some(profile));
        }
    }
    match id_field(object, "customer") {
        Some(customer) => store.find_profile_by_customer(&customer),
        None => Ok(None),
    }
}

fn skip_lifetime(profile: &Profile) -> WebhookOutcome {
    tracing::info!(user_id = %profile.id, "ignoring subscription event for lifetime profile");
    WebhookOutcome::Skipped("lifetime profile".into())
}

fn apply(store: &StudyStore, profile: &Profile, update: SubscriptionUpdate) -> Result<WebhookOutcome> {
    // Lifetime access is never downgraded by subscription traffic
    if profile.subscription_status == SubscriptionStatus::Lifetime
        && update.status != SubscriptionStatus::Lifetime
    {
        return Ok(skip_lifetime(profile));
    }

    store.update_subscription(&profile.id, &update)?;
    tracing::info!(user_id = %profile.id, status = %update.status, "billing state updated");
    Ok(WebhookOutcome::Applied {
        user_id: profile.id.clone(),
        status: update.status,
    })
}

fn require_billing(billing: Option<&dyn BillingProvider>) -> Result<&dyn BillingProvider> {
    billing.ok_or_else(|| Error::Config("Stripe is not configured".to_string()))
}

/// Apply a verified event to profile billing state.
/// `billing` is only needed to look up subscriptions.
pub async fn handle_event(
    store: &StudyStore,
    billing: Option<&dyn BillingProvider>,
    event: &WebhookEvent,
) -> Result<WebhookOutcome> {
    let object = &event.data.object;

    let handled = matches!(
        event.event_type.as_str(),
        "checkout.session.completed"
            | "customer.subscription.updated"
            | "customer.subscription.deleted"
            | "invoice.paid"
            | "invoice.payment_failed"
    );
    if !handled {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "unhandled webhook event");
        return Ok(WebhookOutcome::Unhandled);
    }

    let Some(profile) = resolve_profile(store, object)? else {
        tracing::warn!(event_id = %event.id, event_type = %event.event_type, "no user found for billing event");
        return Ok(WebhookOutcome::Skipped("unknown user".into()));
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let plan_type = object.pointer("/metadata/plan_type").and_then(Value::as_str);
            let mode = object.get("mode").and_then(Value::as_str);

            if plan_type == Some("lifetime") || mode == Some("payment") {
                return apply(
                    store,
                    &profile,
                    SubscriptionUpdate {
                        status: SubscriptionStatus::Lifetime,
                        subscription_id: Some(None),
                        current_period_end: Some(None),
                    },
                );
            }

            let Some(subscription_id) = id_field(object, "subscription") else {
                tracing::warn!(event_id = %event.id, "checkout session has no subscription");
                return Ok(WebhookOutcome::Skipped("no subscription".into()));
            };
            if profile.subscription_status == SubscriptionStatus::Lifetime {
                return Ok(skip_lifetime(&profile));
            }

            let subscription = require_billing(billing)?
                .retrieve_subscription(&subscription_id)
                .await?;
            apply(
                store,
                &profile,
                SubscriptionUpdate {
                    status: SubscriptionStatus::Active,
                    subscription_id: Some(Some(subscription.id)),
                    current_period_end: Some(subscription.current_period_end.and_then(to_datetime)),
                },
            )
        }

        "customer.subscription.updated" => {
            let status = object
                .get("status")
                .and_then(Value::as_str)
                .map(SubscriptionStatus::from_stripe)
                .unwrap_or_default();
            apply(
                store,
                &profile,
                SubscriptionUpdate {
                    status,
                    subscription_id: None,
                    current_period_end: Some(period_end(object).and_then(to_datetime)),
                },
            )
        }

        "customer.subscription.deleted" => apply(
            store,
            &profile,
            SubscriptionUpdate {
                status: SubscriptionStatus::Free,
                subscription_id: Some(None),
                current_period_end: Some(None),
            },
        ),

        "invoice.paid" => {
            let Some(subscription_id) = invoice_subscription(object) else {
                return Ok(WebhookOutcome::Skipped("invoice without subscription".into()));
            };
            if profile.subscription_status == SubscriptionStatus::Lifetime {
                return Ok(skip_lifetime(&profile));
            }

            let subscription = require_billing(billing)?
                .retrieve_subscription(&subscription_id)
                .await?;
            apply(
                store,
                &profile,
                SubscriptionUpdate {
                    status: SubscriptionStatus::Active,
                    subscription_id: None,
                    current_period_end: Some(subscription.current_period_end.and_then(to_datetime)),
                },
            )
        }

        "invoice.payment_failed" => apply(
            store,
            &profile,
            SubscriptionUpdate {
                status: SubscriptionStatus::PastDue,
                subscription_id: None,
                current_period_end: None,
            },
        ),

        _ => Ok(WebhookOutcome::Unhandled),
    }
}
