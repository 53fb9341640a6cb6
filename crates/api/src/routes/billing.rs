//! Billing routes
//!
//! The reconcile endpoint applies one named billing action against the
//! calling landlord's billing record. Preconditions are checked in order:
//! session + landlord role (401), billing record exists (404), record has an
//! external subscription (404), action parses (400). Anything the reconciler
//! throws past that is caught by the error boundary and surfaced as a
//! generic 500.

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use rentfold_billing::{ReconcileAction, ReconcileOutcome};
use rentfold_shared::BillingRecord;

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Request body for the reconcile endpoint
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub action: String,
}

/// Success envelope for the reconcile endpoint
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub data: ReconcileOutcome,
}

/// Success envelope for the subscription read endpoint
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub data: BillingRecord,
}

/// Resolve the caller and require the landlord role.
async fn require_landlord(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let session = state
        .sessions
        .resolve(headers)
        .await
        .ok_or(ApiError::Unauthorized)?;

    if !session.role.is_landlord() {
        tracing::warn!(
            user_id = %session.user_id,
            role = %session.role,
            "Non-landlord attempted billing action"
        );
        return Err(ApiError::Unauthorized);
    }

    Ok(session)
}

/// Apply a named billing action for the calling landlord
pub async fn reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReconcileRequest>,
) -> ApiResult<Json<ReconcileResponse>> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    let session = require_landlord(&state, &headers).await?;

    let action = ReconcileAction::parse(&req.action).ok_or_else(|| {
        tracing::warn!(
            user_id = %session.user_id,
            action = %req.action,
            "Unknown reconcile action"
        );
        ApiError::UnknownAction
    })?;

    let outcome = billing.reconciler.apply(session.user_id, action).await?;

    Ok(Json(ReconcileResponse {
        success: true,
        data: outcome,
    }))
}

/// Get the calling landlord's billing record
pub async fn get_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SubscriptionResponse>> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    let session = require_landlord(&state, &headers).await?;

    let record = billing
        .store
        .find(session.user_id)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    Ok(Json(SubscriptionResponse {
        success: true,
        data: record,
    }))
}
