//! Billing event audit log
//!
//! Append-only record of every reconcile action applied to a landlord's
//! billing profile. Answers "why is this subscription in this state?" and
//! gives drift investigations a trail to walk.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use rentfold_shared::SubscriptionStatus;

use crate::action::ReconcileAction;
use crate::error::BillingResult;

/// A persisted billing event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingEvent {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub action: String,
    pub previous_status: SubscriptionStatus,
    pub new_status: SubscriptionStatus,
    pub stripe_subscription_id: Option<String>,
    pub detail: serde_json::Value,
    pub created_at: OffsetDateTime,
}

/// Service for logging and querying billing events
pub struct BillingEventLogger {
    pool: PgPool,
}

impl BillingEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an applied reconcile action.
    pub async fn log_action(
        &self,
        landlord_id: Uuid,
        action: ReconcileAction,
        previous_status: SubscriptionStatus,
        new_status: SubscriptionStatus,
        stripe_subscription_id: Option<&str>,
        detail: serde_json::Value,
    ) -> BillingResult<Uuid> {
        let event_id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO billing_events (
                landlord_id,
                action,
                previous_status,
                new_status,
                stripe_subscription_id,
                detail
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(landlord_id)
        .bind(action.as_str())
        .bind(previous_status)
        .bind(new_status)
        .bind(stripe_subscription_id)
        .bind(&detail)
        .fetch_one(&self.pool)
        .await?;

        Ok(event_id.0)
    }

    /// Get recent events for a landlord, newest first.
    pub async fn recent_for_landlord(
        &self,
        landlord_id: Uuid,
        limit: i64,
    ) -> BillingResult<Vec<BillingEvent>> {
        let events: Vec<BillingEvent> = sqlx::query_as(
            r#"
            SELECT id, landlord_id, action, previous_status, new_status,
                   stripe_subscription_id, detail, created_at
            FROM billing_events
            WHERE landlord_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(landlord_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
