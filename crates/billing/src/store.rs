//! Billing record persistence
//!
//! Read/write access to landlord billing profiles, keyed by landlord
//! identifier. Writes are single-statement updates: a handler either commits
//! all the fields it touches or none of them.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use rentfold_shared::{BillingRecord, SubscriptionStatus};

use crate::error::{BillingError, BillingResult};

/// A partial update to a billing record
///
/// Outer `None` leaves the column untouched; `Some(None)` clears a nullable
/// column. When `expected_status` is set, the write only succeeds if the
/// persisted status still equals it (optimistic concurrency); `force-sync`
/// leaves it unset to overwrite unconditionally.
#[derive(Debug, Clone, Default)]
pub struct BillingPatch {
    pub status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<Option<OffsetDateTime>>,
    pub past_due_since: Option<Option<OffsetDateTime>>,
    pub expected_status: Option<SubscriptionStatus>,
}

/// Persistence operations for landlord billing records
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Look up the billing record for a landlord.
    async fn find(&self, landlord_id: Uuid) -> BillingResult<Option<BillingRecord>>;

    /// Apply a patch atomically, returning the updated record.
    async fn update(&self, landlord_id: Uuid, patch: BillingPatch) -> BillingResult<BillingRecord>;
}

/// Postgres-backed billing store
pub struct SqlxBillingStore {
    pool: PgPool,
}

impl SqlxBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a billing profile row for a landlord. Used at subscription
    /// provisioning time and by integration tests; the reconciler itself
    /// never creates rows.
    pub async fn create_profile(
        &self,
        landlord_id: Uuid,
        stripe_customer_id: Option<&str>,
        stripe_subscription_id: Option<&str>,
        trial_ends_at: Option<OffsetDateTime>,
    ) -> BillingResult<BillingRecord> {
        let record: BillingRecord = sqlx::query_as(
            r#"
            INSERT INTO landlord_billing_profiles (
                landlord_id,
                stripe_customer_id,
                stripe_subscription_id,
                status,
                trial_ends_at
            )
            VALUES ($1, $2, $3, 'trialing', $4)
            RETURNING landlord_id, stripe_customer_id, stripe_subscription_id,
                      status, trial_ends_at, past_due_since, created_at, updated_at
            "#,
        )
        .bind(landlord_id)
        .bind(stripe_customer_id)
        .bind(stripe_subscription_id)
        .bind(trial_ends_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            landlord_id = %landlord_id,
            subscription_id = ?record.stripe_subscription_id,
            "Created billing profile"
        );

        Ok(record)
    }
}

#[async_trait]
impl BillingStore for SqlxBillingStore {
    async fn find(&self, landlord_id: Uuid) -> BillingResult<Option<BillingRecord>> {
        let record: Option<BillingRecord> = sqlx::query_as(
            r#"
            SELECT landlord_id, stripe_customer_id, stripe_subscription_id,
                   status, trial_ends_at, past_due_since, created_at, updated_at
            FROM landlord_billing_profiles
            WHERE landlord_id = $1
            "#,
        )
        .bind(landlord_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update(&self, landlord_id: Uuid, patch: BillingPatch) -> BillingResult<BillingRecord> {
        let updated: Option<BillingRecord> = sqlx::query_as(
            r#"
            UPDATE landlord_billing_profiles
            SET status = COALESCE($2, status),
                trial_ends_at = CASE WHEN $3 THEN $4 ELSE trial_ends_at END,
                past_due_since = CASE WHEN $5 THEN $6 ELSE past_due_since END,
                updated_at = NOW()
            WHERE landlord_id = $1
              AND ($7::varchar IS NULL OR status = $7)
            RETURNING landlord_id, stripe_customer_id, stripe_subscription_id,
                      status, trial_ends_at, past_due_since, created_at, updated_at
            "#,
        )
        .bind(landlord_id)
        .bind(patch.status)
        .bind(patch.trial_ends_at.is_some())
        .bind(patch.trial_ends_at.flatten())
        .bind(patch.past_due_since.is_some())
        .bind(patch.past_due_since.flatten())
        .bind(patch.expected_status.map(|s| s.as_str().to_string()))
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(record) => Ok(record),
            None => {
                // No row matched: either the profile is gone or the status
                // moved underneath us since the handler read it.
                let exists = self.find(landlord_id).await?;
                match exists {
                    Some(current) => Err(BillingError::ConcurrentModification(format!(
                        "billing record for {} is now '{}'",
                        landlord_id, current.status
                    ))),
                    None => Err(BillingError::ProfileNotFound(landlord_id.to_string())),
                }
            }
        }
    }
}
