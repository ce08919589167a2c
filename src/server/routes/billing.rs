//! Stripe checkout, billing portal and webhook routes

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::billing::{handle_event, verify_signature, CheckoutSessionRequest, WebhookEvent};
use crate::error::{Error, Result};
use crate::server::{AppState, CurrentUser};
use crate::types::{BillingPeriod, CheckoutRequest, SessionUrlResponse, SubscriptionStatus};

const SIGNATURE_HEADER: &str = "stripe-signature";

pub async fn handle_checkout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Bytes,
) -> Result<Json<SessionUrlResponse>> {
    let request: CheckoutRequest = if body.is_empty() {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| Error::bad_request("Invalid JSON body"))?
    };

    let period: BillingPeriod = match request.period.as_deref() {
        None => BillingPeriod::default(),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::bad_request("Invalid billing period"))?,
    };

    let billing = state.billing()?;
    let profile = state
        .store
        .get_profile(&user.id)?
        .ok_or_else(|| Error::not_found("Profile"))?;

    let customer_id = match profile.stripe_customer_id {
        Some(id) => id,
        None => {
            let id = billing
                .create_customer(&user.id, user.email.as_deref(), profile.full_name.as_deref())
                .await?;
            state.store.set_stripe_customer(&user.id, &id)?;
            tracing::info!(user_id = %user.id, customer_id = %id, "created Stripe customer");
            id
        }
    };

    let price_id = state.config.stripe.price_id(period)?.to_string();
    let app_url = state.config.server.app_url.trim_end_matches('/');
    let url = billing
        .create_checkout_session(&CheckoutSessionRequest {
            customer_id,
            price_id,
            user_id: user.id.clone(),
            period,
            success_url: format!("{}/dashboard/billing?success=true", app_url),
            cancel_url: format!("{}/dashboard/billing?canceled=true", app_url),
        })
        .await?;

    tracing::info!(user_id = %user.id, period = period.as_str(), "checkout session created");
    Ok(Json(SessionUrlResponse { url }))
}

pub async fn handle_portal(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<SessionUrlResponse>> {
    let profile = state
        .store
        .get_profile(&user.id)?
        .ok_or_else(|| Error::not_found("Profile"))?;

    let Some(customer_id) = profile.stripe_customer_id.as_deref() else {
        return Err(Error::bad_request(
            "No billing account found. Please subscribe first.",
        ));
    };
    if profile.subscription_status == SubscriptionStatus::Lifetime {
        return Err(Error::bad_request(
            "Lifetime plans have no subscription to manage.",
        ));
    }

    let return_url = format!(
        "{}/dashboard/billing",
        state.config.server.app_url.trim_end_matches('/')
    );
    let url = state
        .billing()?
        .create_portal_session(customer_id, &return_url)
        .await?;
    Ok(Json(SessionUrlResponse { url }))
}

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "No signature" }))).into_response();
    };

    let stripe = &state.config.stripe;
    let now = chrono::Utc::now().timestamp();
    if let Err(e) = verify_signature(
        &body,
        signature,
        &stripe.keys().webhook_secret,
        stripe.webhook_tolerance_secs,
        now,
    ) {
        tracing::warn!(error = %e, "webhook signature rejected");
        return e.into_response();
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook payload");
            return Error::bad_request("Invalid webhook payload").into_response();
        }
    };

    match handle_event(&state.store, state.billing.as_deref(), &event).await {
        Ok(outcome) => {
            tracing::debug!(event_id = %event.id, ?outcome, "webhook handled");
            Json(json!({ "received": true })).into_response()
        }
        Err(e) => {
            tracing::error!(event_id = %event.id, event_type = %event.event_type, error = %e, "webhook handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Webhook handler failed" })),
            )
                .into_response()
        }
    }
}
