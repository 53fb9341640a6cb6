//! Reconcile endpoint behavior: precondition ordering, status codes, the
//! response envelope, and no-mutation guarantees on the failure paths.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use rentfold_api::routes::create_router;
use rentfold_shared::{SubscriptionStatus, UserRole};

use support::{
    billing_record, test_state, FakeProvider, InMemoryStore, StaticSessionResolver,
};

struct Fixture {
    router: Router,
    store: Arc<InMemoryStore>,
    landlord_id: Uuid,
}

/// Landlord session "t-landlord" with a record in `status`, plus a tenant
/// session "t-tenant" for role checks.
fn fixture(status: SubscriptionStatus, subscription: Option<&str>) -> Fixture {
    let landlord = support::session(UserRole::Landlord, false);
    let landlord_id = landlord.user_id;

    let resolver = StaticSessionResolver::default()
        .with_session("t-landlord", landlord)
        .with_session("t-tenant", support::session(UserRole::Tenant, false));

    let store = Arc::new(InMemoryStore::with_record(billing_record(
        landlord_id,
        status,
        subscription,
    )));
    let provider = Arc::new(FakeProvider::new(status));

    let router = create_router(test_state(Arc::new(resolver), store.clone(), provider));

    Fixture {
        router,
        store,
        landlord_id,
    }
}

async fn post_reconcile(
    router: &Router,
    token: Option<&str>,
    action: &str,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/billing/reconcile")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let body = serde_json::json!({ "action": action }).to_string();
    let response = router
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn missing_session_is_unauthorized() {
    let f = fixture(SubscriptionStatus::Trialing, Some("sub_123"));

    let (status, body) = post_reconcile(&f.router, None, "force-sync").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn non_landlord_role_is_unauthorized() {
    let f = fixture(SubscriptionStatus::Trialing, Some("sub_123"));

    let (status, body) = post_reconcile(&f.router, Some("t-tenant"), "force-sync").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn unknown_action_is_rejected_without_mutation() {
    let f = fixture(SubscriptionStatus::Trialing, Some("sub_123"));
    let before = f.store.get(f.landlord_id).unwrap();

    let (status, body) = post_reconcile(&f.router, Some("t-landlord"), "bogus-action").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unknown action");
    assert_eq!(f.store.get(f.landlord_id).unwrap(), before);
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let landlord = support::session(UserRole::Landlord, false);
    let resolver = StaticSessionResolver::default().with_session("t-landlord", landlord);
    let store = Arc::new(InMemoryStore::default());
    let provider = Arc::new(FakeProvider::new(SubscriptionStatus::Trialing));
    let router = create_router(test_state(Arc::new(resolver), store, provider));

    let (status, body) = post_reconcile(&router, Some("t-landlord"), "force-sync").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Billing profile not found");
}

#[tokio::test]
async fn never_subscribed_landlord_is_not_found() {
    let f = fixture(SubscriptionStatus::Trialing, None);
    let before = f.store.get(f.landlord_id).unwrap();

    let (status, body) = post_reconcile(&f.router, Some("t-landlord"), "set-active").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No subscription found");
    assert_eq!(f.store.get(f.landlord_id).unwrap(), before);
}

#[tokio::test]
async fn end_trial_with_payment_activates_the_record() {
    let f = fixture(SubscriptionStatus::Trialing, Some("sub_123"));

    let (status, body) =
        post_reconcile(&f.router, Some("t-landlord"), "end-trial-with-payment").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["previous_status"], "trialing");
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(
        f.store.get(f.landlord_id).unwrap().status,
        SubscriptionStatus::Active
    );
}

#[tokio::test]
async fn invalid_transition_is_a_bad_request() {
    let f = fixture(SubscriptionStatus::Canceled, Some("sub_123"));

    let (status, body) = post_reconcile(&f.router, Some("t-landlord"), "set-active").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid status transition: canceled -> active"
    );
    assert_eq!(
        f.store.get(f.landlord_id).unwrap().status,
        SubscriptionStatus::Canceled
    );
}

#[tokio::test]
async fn force_sync_is_idempotent() {
    let f = fixture(SubscriptionStatus::Active, Some("sub_123"));

    let (first_status, first) = post_reconcile(&f.router, Some("t-landlord"), "force-sync").await;
    let (second_status, second) = post_reconcile(&f.router, Some("t-landlord"), "force-sync").await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["data"]["record"]["status"], "active");
    assert_eq!(
        first["data"]["record"]["status"],
        second["data"]["record"]["status"]
    );
    assert_eq!(
        first["data"]["record"]["trial_ends_at"],
        second["data"]["record"]["trial_ends_at"]
    );
    assert_eq!(
        first["data"]["record"]["past_due_since"],
        second["data"]["record"]["past_due_since"]
    );
}

#[tokio::test]
async fn subscription_read_returns_the_record() {
    let f = fixture(SubscriptionStatus::Trialing, Some("sub_123"));

    let response = f
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/billing/subscription")
                .header(header::AUTHORIZATION, "Bearer t-landlord")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "trialing");
    assert_eq!(json["data"]["stripe_subscription_id"], "sub_123");
}
