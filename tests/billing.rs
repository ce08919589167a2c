//! Integration tests for checkout, billing portal and the Stripe webhook

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use cognify::billing::sign_payload;
use cognify::storage::SubscriptionUpdate;
use cognify::{Profile, SubscriptionStatus};
use common::{test_app, test_app_without_billing, TestApp, ALICE, PERIOD_END, WEBHOOK_SECRET};

const ALICE_ID: &str = "user-alice";

fn profile(app: &TestApp) -> Profile {
    app.state
        .store
        .get_profile(ALICE_ID)
        .expect("Failed to read profile")
        .expect("Profile missing")
}

/// Create Alice's profile the way the first authenticated request does
fn with_alice(app: &TestApp) {
    app.state
        .store
        .ensure_profile(ALICE_ID, Some("alice@example.com"))
        .expect("Failed to create profile");
}

fn event(event_type: &str, object: Value) -> Value {
    json!({
        "id": format!("evt_{}", event_type.replace('.', "_")),
        "type": event_type,
        "data": { "object": object },
    })
}

async fn post_webhook(app: &TestApp, payload: &Value, signature: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::post("/api/stripe/webhook").header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    app.send(builder.body(Body::from(payload.to_string())).unwrap())
        .await
}

async fn signed_webhook(app: &TestApp, payload: &Value) -> (StatusCode, Value) {
    let signature = sign_payload(
        payload.to_string().as_bytes(),
        WEBHOOK_SECRET,
        Utc::now().timestamp(),
    )
    .unwrap();
    post_webhook(app, payload, Some(signature)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Checkout & portal
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_checkout_creates_customer_once() {
    let app = test_app();

    let (status, body) = app
        .post_json("/api/stripe/checkout", Some(ALICE), json!({ "period": "yearly" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://checkout.stripe.test/session");
    assert_eq!(profile(&app).stripe_customer_id.as_deref(), Some("cus_user-alice"));

    let (status, _) = app
        .post_json("/api/stripe/checkout", Some(ALICE), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.billing.calls(),
        vec![
            "create_customer:user-alice",
            "checkout:cus_user-alice:price_yearly:yearly",
            "checkout:cus_user-alice:price_monthly:monthly",
        ]
    );
}

#[tokio::test]
async fn test_checkout_validation() {
    let app = test_app();

    let (status, body) = app
        .post_json("/api/stripe/checkout", Some(ALICE), json!({ "period": "weekly" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid billing period");

    let (status, _) = app
        .post_json("/api/stripe/checkout", None, json!({ "period": "monthly" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_portal_requires_customer() {
    let app = test_app();

    let (status, body) = app.post_json("/api/stripe/portal", Some(ALICE), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No billing account found. Please subscribe first.");

    app.state
        .store
        .set_stripe_customer(ALICE_ID, "cus_alice")
        .unwrap();
    let (status, body) = app.post_json("/api/stripe/portal", Some(ALICE), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://billing.stripe.test/portal");
    assert_eq!(
        app.billing.calls(),
        vec!["portal:cus_alice:http://app.test/dashboard/billing"]
    );
}

#[tokio::test]
async fn test_lifetime_profile_has_no_portal() {
    let app = test_app();
    with_alice(&app);
    app.state.store.set_stripe_customer(ALICE_ID, "cus_alice").unwrap();
    app.state
        .store
        .update_subscription(
            ALICE_ID,
            &SubscriptionUpdate {
                status: SubscriptionStatus::Lifetime,
                subscription_id: Some(None),
                current_period_end: Some(None),
            },
        )
        .unwrap();

    let (status, _) = app.post_json("/api/stripe/portal", Some(ALICE), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.billing.calls().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_webhook_requires_signature() {
    let app = test_app();
    with_alice(&app);
    let payload = event(
        "customer.subscription.deleted",
        json!({ "metadata": { "supabase_user_id": ALICE_ID } }),
    );

    let (status, body) = post_webhook(&app, &payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No signature");
}

#[tokio::test]
async fn test_invalid_signature_changes_nothing() {
    let app = test_app();
    with_alice(&app);
    let payload = event(
        "checkout.session.completed",
        json!({ "mode": "payment", "metadata": { "supabase_user_id": ALICE_ID, "plan_type": "lifetime" } }),
    );

    let forged = sign_payload(payload.to_string().as_bytes(), "whsec_wrong", Utc::now().timestamp()).unwrap();
    let (status, body) = post_webhook(&app, &payload, Some(forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid signature");

    let stale = sign_payload(
        payload.to_string().as_bytes(),
        WEBHOOK_SECRET,
        Utc::now().timestamp() - 3600,
    )
    .unwrap();
    let (status, _) = post_webhook(&app, &payload, Some(stale)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(profile(&app).subscription_status, SubscriptionStatus::Free);
}

#[tokio::test]
async fn test_lifetime_checkout() {
    let app = test_app();
    with_alice(&app);

    let payload = event(
        "checkout.session.completed",
        json!({
            "mode": "payment",
            "customer": "cus_alice",
            "metadata": { "supabase_user_id": ALICE_ID, "plan_type": "lifetime" }
        }),
    );
    let (status, body) = signed_webhook(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let profile = profile(&app);
    assert_eq!(profile.subscription_status, SubscriptionStatus::Lifetime);
    assert!(profile.current_period_end.is_none());
    assert!(profile.subscription_id.is_none());
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_subscription_lifecycle() {
    let app = test_app();
    with_alice(&app);
    app.state.store.set_stripe_customer(ALICE_ID, "cus_alice").unwrap();

    // Checkout starts the subscription
    let payload = event(
        "checkout.session.completed",
        json!({
            "mode": "subscription",
            "subscription": "sub_1",
            "customer": "cus_alice",
            "metadata": { "supabase_user_id": ALICE_ID, "plan_type": "monthly" }
        }),
    );
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);
    let current = profile(&app);
    assert_eq!(current.subscription_status, SubscriptionStatus::Active);
    assert_eq!(current.subscription_id.as_deref(), Some("sub_1"));
    assert_eq!(current.current_period_end, DateTime::from_timestamp(PERIOD_END, 0));
    assert_eq!(app.billing.calls(), vec!["retrieve:sub_1"]);

    // Later events find the user by customer id
    let payload = event(
        "invoice.payment_failed",
        json!({ "customer": "cus_alice", "subscription": "sub_1" }),
    );
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);
    assert_eq!(profile(&app).subscription_status, SubscriptionStatus::PastDue);

    let payload = event(
        "invoice.paid",
        json!({ "customer": "cus_alice", "subscription": "sub_1" }),
    );
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);
    assert_eq!(profile(&app).subscription_status, SubscriptionStatus::Active);

    let payload = event(
        "customer.subscription.updated",
        json!({
            "id": "sub_1",
            "customer": "cus_alice",
            "status": "past_due",
            "current_period_end": PERIOD_END + 86_400
        }),
    );
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);
    let current = profile(&app);
    assert_eq!(current.subscription_status, SubscriptionStatus::PastDue);
    assert_eq!(
        current.current_period_end,
        DateTime::from_timestamp(PERIOD_END + 86_400, 0)
    );

    let payload = event(
        "customer.subscription.deleted",
        json!({ "id": "sub_1", "customer": "cus_alice", "status": "canceled" }),
    );
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);
    let current = profile(&app);
    assert_eq!(current.subscription_status, SubscriptionStatus::Free);
    assert!(current.subscription_id.is_none());
    assert!(current.current_period_end.is_none());
}

#[tokio::test]
async fn test_lifetime_is_never_downgraded() {
    let app = test_app();
    with_alice(&app);
    app.state.store.set_stripe_customer(ALICE_ID, "cus_alice").unwrap();

    let lifetime = event(
        "checkout.session.completed",
        json!({ "mode": "payment", "metadata": { "supabase_user_id": ALICE_ID, "plan_type": "lifetime" } }),
    );
    signed_webhook(&app, &lifetime).await;

    for payload in [
        event("customer.subscription.deleted", json!({ "customer": "cus_alice" })),
        event("invoice.payment_failed", json!({ "customer": "cus_alice" })),
        event("invoice.paid", json!({ "customer": "cus_alice", "subscription": "sub_old" })),
        event(
            "customer.subscription.updated",
            json!({ "customer": "cus_alice", "status": "active", "current_period_end": PERIOD_END }),
        ),
    ] {
        let (status, _) = signed_webhook(&app, &payload).await;
        assert_eq!(status, StatusCode::OK);
    }

    let current = profile(&app);
    assert_eq!(current.subscription_status, SubscriptionStatus::Lifetime);
    assert!(current.current_period_end.is_none());
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_events_and_users_are_acknowledged() {
    let app = test_app();
    with_alice(&app);

    let (status, body) = signed_webhook(&app, &event("charge.refunded", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let payload = event(
        "customer.subscription.deleted",
        json!({ "customer": "cus_nobody", "metadata": { "supabase_user_id": "user-ghost" } }),
    );
    let (status, _) = signed_webhook(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile(&app).subscription_status, SubscriptionStatus::Free);
}

#[tokio::test]
async fn test_webhook_acknowledged_without_billing_provider() {
    let app = test_app_without_billing();
    with_alice(&app);
    app.state.store.set_stripe_customer(ALICE_ID, "cus_alice").unwrap();

    let (status, body) = signed_webhook(&app, &event("charge.refunded", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let payload = event(
        "customer.subscription.deleted",
        json!({ "customer": "cus_nobody" }),
    );
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);

    let payload = event("invoice.payment_failed", json!({ "customer": "cus_alice" }));
    assert_eq!(signed_webhook(&app, &payload).await.0, StatusCode::OK);
    assert_eq!(profile(&app).subscription_status, SubscriptionStatus::PastDue);

    // Checkout still reports the missing configuration
    let (status, body) = app
        .post_json("/api/stripe/checkout", Some(ALICE), json!({}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Configuration error: Stripe is not configured");
}
